//! End-to-end tests driving the host against a scripted controller over an
//! in-memory duplex stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use bluewire::hci::consts::{
    LeOwnAddressType, LeScanType, ScanningFilterPolicy, Status,
};
use bluewire::hci::commands::ExtendedScanConfig;
use bluewire::hci::{Error, Hci};

/// The controller end of the wire.
struct Controller {
    io: DuplexStream,
}

impl Controller {
    async fn expect_command(&mut self, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        self.io.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected, "unexpected command packet on the wire");
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.io.write_all(bytes).await.unwrap();
    }
}

fn setup() -> (Arc<Hci>, Controller) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let (host_io, controller_io) = duplex(1024);
    (Arc::new(Hci::new(host_io)), Controller { io: controller_io })
}

/// Lets the event loop task drain its control queue on the single-threaded
/// test runtime before the test proceeds.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

const RESET_COMMAND: &[u8] = &[0x01, 0x03, 0x0C, 0x00];
const RESET_COMPLETE: &[u8] = &[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00];

#[tokio::test]
async fn reset_round_trip() {
    let (hci, mut controller) = setup();
    let (result, _) = tokio::join!(hci.reset(), async {
        controller.expect_command(RESET_COMMAND).await;
        controller.send(RESET_COMPLETE).await;
    });
    result.unwrap();

    // no lingering pending slot: the next command goes straight out
    let (result, _) = tokio::join!(hci.read_bd_addr(), async {
        controller.expect_command(&[0x01, 0x09, 0x10, 0x00]).await;
        controller
            .send(&[0x04, 0x0E, 0x0A, 0x01, 0x09, 0x10, 0x00, 1, 2, 3, 4, 5, 6])
            .await;
    });
    assert_eq!(result.unwrap().to_string(), "06:05:04:03:02:01");
}

#[tokio::test]
async fn busy_rejection() {
    let (hci, mut controller) = setup();
    let pending = tokio::spawn({
        let hci = hci.clone();
        async move { hci.reset().await }
    });
    // once the packet shows up on the wire the slot is occupied
    controller.expect_command(RESET_COMMAND).await;

    let err = hci.read_bd_addr().await.unwrap_err();
    assert!(matches!(err, Error::Busy));

    // the first call still resolves
    controller.send(RESET_COMPLETE).await;
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_advertising_data_rejected_locally() {
    let (hci, _controller) = setup();
    let err = hci.le_set_advertising_data(&[0u8; 32]).await.unwrap_err();
    assert!(matches!(err, Error::AdvertisingDataTooLong));
}

#[tokio::test]
async fn controller_error_surfaced() {
    let (hci, mut controller) = setup();
    let (result, _) = tokio::join!(hci.le_set_advertising_data(&[0x02, 0x01, 0x06]), async {
        let mut expected = vec![0x01, 0x08, 0x20, 0x20, 0x03, 0x02, 0x01, 0x06];
        expected.extend_from_slice(&[0; 28]);
        controller.expect_command(&expected).await;
        controller
            .send(&[0x04, 0x0E, 0x04, 0x01, 0x08, 0x20, 0x12])
            .await;
    });
    match result.unwrap_err() {
        Error::Controller { status, .. } => {
            assert_eq!(status, Status::InvalidHciCommandParameters)
        }
        err => panic!("expected controller error, got {err:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_then_recovery() {
    let (hci, mut controller) = setup();
    // nothing answers; the paused clock fast-forwards past the deadline
    let err = hci.le_read_buffer_size().await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    let (result, _) = tokio::join!(hci.reset(), async {
        controller.expect_command(&[0x01, 0x02, 0x20, 0x00]).await;
        controller.expect_command(RESET_COMMAND).await;
        controller.send(RESET_COMPLETE).await;
    });
    result.unwrap();
}

#[tokio::test]
async fn late_completion_after_timeout_is_discarded() {
    let (hci, mut controller) = setup();
    tokio::time::pause();
    let err = hci.le_read_buffer_size().await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    tokio::time::resume();

    controller.expect_command(&[0x01, 0x02, 0x20, 0x00]).await;
    // the answer arrives after the caller gave up
    controller
        .send(&[0x04, 0x0E, 0x07, 0x01, 0x02, 0x20, 0x00, 0xFB, 0x00, 0x08])
        .await;
    settle().await;

    // and must not resolve the next, unrelated call
    let (result, _) = tokio::join!(hci.reset(), async {
        controller.expect_command(RESET_COMMAND).await;
        controller.send(RESET_COMPLETE).await;
    });
    result.unwrap();
}

#[tokio::test]
async fn mismatched_opcode_does_not_resolve() {
    let (hci, mut controller) = setup();
    let (result, _) = tokio::join!(hci.reset(), async {
        controller.expect_command(RESET_COMMAND).await;
        // completion for a command nobody issued
        controller
            .send(&[0x04, 0x0E, 0x04, 0x01, 0x08, 0x20, 0x00])
            .await;
        controller.send(RESET_COMPLETE).await;
    });
    result.unwrap();
}

#[tokio::test]
async fn advertising_report_fan_out() {
    let (hci, mut controller) = setup();
    let mut reports = hci.le_advertising_reports().unwrap();
    settle().await;

    // one LE meta event carrying three reports
    let mut event = vec![0x04, 0x3E, 0x20, 0x02, 0x03];
    for i in 1u8..=3 {
        event.extend_from_slice(&[0x00, 0x00, i, 0, 0, 0, 0, 0, 0x00]);
        event.push(0xC4 + i);
    }
    controller.send(&event).await;

    for i in 1u8..=3 {
        let report = reports.recv().await.unwrap();
        assert_eq!(report.address.raw()[0], i);
    }
    assert!(reports.try_recv().is_err());
}

#[tokio::test]
async fn completion_for_other_handle_is_ignored() {
    let (hci, mut controller) = setup();
    let (result, _) = tokio::join!(hci.le_read_channel_map(0x000A), async {
        controller
            .expect_command(&[0x01, 0x15, 0x20, 0x02, 0x0A, 0x00])
            .await;
        // stale answer for connection 0x000B, e.g. from an abandoned call
        controller
            .send(&[0x04, 0x0E, 0x0B, 0x01, 0x15, 0x20, 0x00, 0x0B, 0x00, 0, 0, 0, 0, 0])
            .await;
        controller
            .send(&[
                0x04, 0x0E, 0x0B, 0x01, 0x15, 0x20, 0x00, 0x0A, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
                0x1F,
            ])
            .await;
    });
    let map = result.unwrap();
    assert_eq!(map.handle, 0x000A);
    assert!(map.is_used(36));
    assert!(!map.is_used(37));
}

#[tokio::test]
async fn extended_scan_parameters_grouped_order() {
    let (hci, mut controller) = setup();
    let one_m = ExtendedScanConfig {
        kind: LeScanType::Active,
        interval: Duration::from_millis(60),
        window: Duration::from_millis(30),
    };
    let coded = ExtendedScanConfig {
        kind: LeScanType::Passive,
        interval: Duration::from_millis(120),
        window: Duration::from_millis(60),
    };
    let (result, _) = tokio::join!(
        hci.le_set_extended_scan_parameters(
            LeOwnAddressType::Public,
            ScanningFilterPolicy::BasicUnfiltered,
            Some(&one_m),
            Some(&coded),
        ),
        async {
            // all scan types, then all intervals, then all windows,
            // 1M before Coded
            controller
                .expect_command(&[
                    0x01, 0x41, 0x20, 0x0D, 0x00, 0x00, 0x05, 0x01, 0x00, 0x60, 0x00, 0xC0,
                    0x00, 0x30, 0x00, 0x60, 0x00,
                ])
                .await;
            controller
                .send(&[0x04, 0x0E, 0x04, 0x01, 0x41, 0x20, 0x00])
                .await;
        }
    );
    result.unwrap();
}

#[tokio::test]
async fn legacy_advertising_parameters_layout() {
    let (hci, mut controller) = setup();
    let params = bluewire::hci::commands::AdvertisingParameters::default();
    let (result, _) = tokio::join!(hci.le_set_advertising_parameters(&params), async {
        controller
            .expect_command(&[
                0x01, 0x06, 0x20, 0x0F, 0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x07, 0x00,
            ])
            .await;
        controller
            .send(&[0x04, 0x0E, 0x04, 0x01, 0x06, 0x20, 0x00])
            .await;
    });
    result.unwrap();
}

#[tokio::test]
async fn disconnection_event_routed() {
    let (hci, mut controller) = setup();
    let mut disconnections = hci.disconnection_events().unwrap();
    settle().await;

    controller
        .send(&[0x04, 0x05, 0x04, 0x00, 0x40, 0x00, 0x13])
        .await;
    let event = disconnections.recv().await.unwrap();
    assert_eq!(event.status, Status::Success);
    assert_eq!(event.handle, 0x0040);
    assert_eq!(event.reason, Status::RemoteUserTerminatedConnection);
}

#[tokio::test]
async fn reset_drops_subscriptions() {
    let (hci, mut controller) = setup();
    let mut reports = hci.le_advertising_reports().unwrap();
    settle().await;

    let (result, _) = tokio::join!(hci.reset(), async {
        controller.expect_command(RESET_COMMAND).await;
        controller.send(RESET_COMPLETE).await;
    });
    result.unwrap();

    // the subscription died with the reset; subscribers must re-register
    assert!(reports.recv().await.is_none());
}

#[tokio::test]
async fn extended_advertising_report_fan_out() {
    let (hci, mut controller) = setup();
    let mut reports = hci.le_extended_advertising_reports().unwrap();
    settle().await;

    let mut payload = vec![0x0D, 0x02];
    for i in 1u8..=2 {
        payload.extend_from_slice(&[0x13, 0x00]); // connectable scannable legacy
        payload.push(0x00);
        payload.extend_from_slice(&[i, 0, 0, 0, 0, 0]);
        payload.extend_from_slice(&[0x01, 0x00, 0xFF, 0x7F]);
        payload.push((0xC4u8).wrapping_add(i));
        payload.extend_from_slice(&[0x00, 0x00]); // no periodic interval
        payload.push(0x00);
        payload.extend_from_slice(&[0; 6]);
        payload.extend_from_slice(&[0x01, 0xFF]); // one data byte
    }
    let mut event = vec![0x04, 0x3E, payload.len() as u8];
    event.extend_from_slice(&payload);
    controller.send(&event).await;

    for i in 1u8..=2 {
        let report = reports.recv().await.unwrap();
        assert_eq!(report.address.raw()[0], i);
        assert_eq!(report.rssi, Some((0xC4u8.wrapping_add(i)) as i8));
        assert_eq!(&report.data[..], &[0xFF]);
    }
    assert!(reports.try_recv().is_err());
}

#[tokio::test]
async fn transport_close_fails_pending_command() {
    let (hci, controller) = setup();
    let (result, _) = tokio::join!(hci.reset(), async move {
        drop(controller);
    });
    // whether the loop notices on the read or the write side first depends
    // on select order; both surface as a transport-level failure
    assert!(matches!(
        result.unwrap_err(),
        Error::TransportClosed | Error::Io(_)
    ));
}
