use std::time::Duration;

use bytes::Bytes;
use num_enum::TryFromPrimitive;
use tracing::{trace, warn};

use crate::hci::buffer::ReceiveBuffer;
use crate::hci::consts::{
    Address, AddressKind, ChannelSelectionAlgorithm, LeFeatureMask, LePhy, Role, Status,
};
use crate::hci::event_loop::State;
use crate::hci::events::FromEvent;
use crate::hci::Error;
use crate::utils::DispatchExt;

/// LE meta sub-event codes ([Vol 4] Part E, Section 7.7.65).
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum LeEventCode {
    ConnectionComplete = 0x01,
    AdvertisingReport = 0x02,
    ConnectionUpdateComplete = 0x03,
    ReadRemoteFeaturesComplete = 0x04,
    LongTermKeyRequest = 0x05,
    EnhancedConnectionComplete = 0x0A,
    PhyUpdateComplete = 0x0C,
    ExtendedAdvertisingReport = 0x0D,
    ChannelSelectionAlgorithm = 0x14,
}

/// `LE_Connection_Complete` / `LE_Enhanced_Connection_Complete`
/// ([Vol 4] Part E, Sections 7.7.65.1 and 7.7.65.10), unified. The
/// resolvable-private-address fields are only present in the enhanced
/// variant and only meaningful when address resolution was in use.
#[derive(Debug, Clone)]
pub struct LeConnection {
    pub status: Status,
    pub handle: u16,
    pub role: Role,
    pub peer_address_kind: AddressKind,
    pub peer_address: Address,
    pub local_rpa: Option<Address>,
    pub peer_rpa: Option<Address>,
    pub interval: Duration,
    pub latency: u16,
    pub supervision_timeout: Duration,
    /// Central clock accuracy field, raw (0x00 = 500 ppm .. 0x07 = 20 ppm).
    pub clock_accuracy: u8,
}

impl LeConnection {
    fn unpack(buf: &mut ReceiveBuffer, enhanced: bool) -> Result<Self, Error> {
        let status = buf.u8().map(Status::from)?;
        let handle = buf.u16()? & 0x0FFF;
        let role = Role::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?;
        let peer_address_kind =
            AddressKind::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?;
        let peer_address = Address::unpack(buf)?;
        let (local_rpa, peer_rpa) = if enhanced {
            let local = Address::unpack(buf)?;
            let peer = Address::unpack(buf)?;
            (
                (!local.is_zero()).then_some(local),
                (!peer.is_zero()).then_some(peer),
            )
        } else {
            (None, None)
        };
        Ok(Self {
            status,
            handle,
            role,
            peer_address_kind,
            peer_address,
            local_rpa,
            peer_rpa,
            interval: Duration::from_micros(u64::from(buf.u16()?) * 1250),
            latency: buf.u16()?,
            supervision_timeout: Duration::from_millis(u64::from(buf.u16()?) * 10),
            clock_accuracy: buf.u8()?,
        })
    }
}

/// Report type of a legacy advertising report.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum LeAdvertisingReportType {
    AdvInd = 0x00,
    AdvDirectInd = 0x01,
    AdvScanInd = 0x02,
    AdvNonconnInd = 0x03,
    ScanRsp = 0x04,
}

/// One report out of an `LE_Advertising_Report` event
/// ([Vol 4] Part E, Section 7.7.65.2).
#[derive(Debug, Clone)]
pub struct LeAdvertisingReport {
    pub event_type: LeAdvertisingReportType,
    pub address_kind: AddressKind,
    pub address: Address,
    pub data: Bytes,
    /// `None` when the controller reported 127 (not available).
    pub rssi: Option<i8>,
}

impl FromEvent for LeAdvertisingReport {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        let event_type = LeAdvertisingReportType::try_from(buf.u8()?)
            .map_err(|_| Error::InvalidPayloadSize)?;
        let address_kind =
            AddressKind::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?;
        let address = Address::unpack(buf)?;
        let len = buf.u8()? as usize;
        let data = Bytes::copy_from_slice(buf.slice(len)?);
        let rssi = buf.i8()?;
        Ok(Self {
            event_type,
            address_kind,
            address,
            data,
            rssi: (rssi != 127).then_some(rssi),
        })
    }
}

bitflags::bitflags! {
    /// Event-type bits of an extended advertising report.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ExtendedReportFlags: u16 {
        const CONNECTABLE = 1 << 0;
        const SCANNABLE = 1 << 1;
        const DIRECTED = 1 << 2;
        const SCAN_RESPONSE = 1 << 3;
        const LEGACY = 1 << 4;
    }
}

/// Completeness of the data in an extended advertising report.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ReportDataStatus {
    Complete = 0x00,
    Incomplete = 0x01,
    Truncated = 0x02,
}

/// One report out of an `LE_Extended_Advertising_Report` event
/// ([Vol 4] Part E, Section 7.7.65.13).
#[derive(Debug, Clone)]
pub struct LeExtendedAdvertisingReport {
    pub flags: ExtendedReportFlags,
    pub data_status: ReportDataStatus,
    pub address_kind: AddressKind,
    pub address: Address,
    pub primary_phy: LePhy,
    pub secondary_phy: Option<LePhy>,
    /// Advertising SID; `None` when the controller reported 0xFF.
    pub sid: Option<u8>,
    pub tx_power: Option<i8>,
    pub rssi: Option<i8>,
    pub periodic_advertising_interval: Option<Duration>,
    /// Raw directed-address type; 0xFE marks an unresolved resolvable
    /// private address. Only meaningful when the DIRECTED flag is set.
    pub direct_address_kind: u8,
    pub direct_address: Address,
    pub data: Bytes,
}

impl FromEvent for LeExtendedAdvertisingReport {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        let event_type = buf.u16()?;
        let flags = ExtendedReportFlags::from_bits_truncate(event_type);
        let data_status = ReportDataStatus::try_from((event_type >> 5 & 0b11) as u8)
            .map_err(|_| Error::InvalidPayloadSize)?;
        let address_kind =
            AddressKind::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?;
        let address = Address::unpack(buf)?;
        let primary_phy = LePhy::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?;
        let secondary_phy = match buf.u8()? {
            0x00 => None,
            phy => Some(LePhy::try_from(phy).map_err(|_| Error::InvalidPayloadSize)?),
        };
        let sid = buf.u8()?;
        let tx_power = buf.i8()?;
        let rssi = buf.i8()?;
        let periodic = buf.u16()?;
        let direct_address_kind = buf.u8()?;
        let direct_address = Address::unpack(buf)?;
        let len = buf.u8()? as usize;
        let data = Bytes::copy_from_slice(buf.slice(len)?);
        Ok(Self {
            flags,
            data_status,
            address_kind,
            address,
            primary_phy,
            secondary_phy,
            sid: (sid != 0xFF).then_some(sid),
            tx_power: (tx_power != 127).then_some(tx_power),
            rssi: (rssi != 127).then_some(rssi),
            periodic_advertising_interval: (periodic != 0)
                .then(|| Duration::from_micros(u64::from(periodic) * 1250)),
            direct_address_kind,
            direct_address,
            data,
        })
    }
}

/// `LE_Connection_Update_Complete` ([Vol 4] Part E, Section 7.7.65.3).
#[derive(Debug, Clone)]
pub struct LeConnectionUpdate {
    pub status: Status,
    pub handle: u16,
    pub interval: Duration,
    pub latency: u16,
    pub supervision_timeout: Duration,
}

impl FromEvent for LeConnectionUpdate {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            status: buf.u8().map(Status::from)?,
            handle: buf.u16()? & 0x0FFF,
            interval: Duration::from_micros(u64::from(buf.u16()?) * 1250),
            latency: buf.u16()?,
            supervision_timeout: Duration::from_millis(u64::from(buf.u16()?) * 10),
        })
    }
}

/// `LE_Read_Remote_Features_Complete` ([Vol 4] Part E, Section 7.7.65.4).
#[derive(Debug, Clone)]
pub struct LeRemoteFeatures {
    pub status: Status,
    pub handle: u16,
    pub features: LeFeatureMask,
}

impl FromEvent for LeRemoteFeatures {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            status: buf.u8().map(Status::from)?,
            handle: buf.u16()? & 0x0FFF,
            features: LeFeatureMask::unpack(buf)?,
        })
    }
}

/// `LE_Long_Term_Key_Request` ([Vol 4] Part E, Section 7.7.65.5). The host
/// answers with `le_long_term_key_request_reply` or the negative reply.
#[derive(Debug, Clone)]
pub struct LeLongTermKeyRequest {
    pub handle: u16,
    pub random: u64,
    pub ediv: u16,
}

impl FromEvent for LeLongTermKeyRequest {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            random: buf.u64()?,
            ediv: buf.u16()?,
        })
    }
}

/// `LE_PHY_Update_Complete` ([Vol 4] Part E, Section 7.7.65.12).
#[derive(Debug, Clone)]
pub struct LePhyUpdate {
    pub status: Status,
    pub handle: u16,
    pub tx_phy: LePhy,
    pub rx_phy: LePhy,
}

impl FromEvent for LePhyUpdate {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            status: buf.u8().map(Status::from)?,
            handle: buf.u16()? & 0x0FFF,
            tx_phy: LePhy::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?,
            rx_phy: LePhy::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?,
        })
    }
}

/// `LE_Channel_Selection_Algorithm` ([Vol 4] Part E, Section 7.7.65.20).
#[derive(Debug, Clone)]
pub struct LeChannelSelection {
    pub handle: u16,
    pub algorithm: ChannelSelectionAlgorithm,
}

impl FromEvent for LeChannelSelection {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            algorithm: ChannelSelectionAlgorithm::try_from(buf.u8()?)
                .map_err(|_| Error::InvalidPayloadSize)?,
        })
    }
}

impl State {
    /// Decodes an LE meta event and fans it out ([Vol 4] Part E,
    /// Section 7.7.65). Advertising-report events emit one notification per
    /// report, in controller order.
    pub(crate) fn process_le_event(&mut self, mut payload: ReceiveBuffer) -> Result<(), Error> {
        let code = payload.u8()?;
        let Ok(code) = LeEventCode::try_from(code) else {
            warn!("Unhandled LE meta event: 0x{:02X}", code);
            return Ok(());
        };
        trace!("LE meta event: {:?}", code);
        match code {
            LeEventCode::ConnectionComplete => {
                let event = LeConnection::unpack(&mut payload, false)?;
                payload.finish()?;
                self.subscribers.le_connection.dispatch(event);
            }
            LeEventCode::EnhancedConnectionComplete => {
                let event = LeConnection::unpack(&mut payload, true)?;
                payload.finish()?;
                self.subscribers.le_connection.dispatch(event);
            }
            LeEventCode::AdvertisingReport => {
                let count = payload.u8()? as usize;
                for _ in 0..count {
                    let report = LeAdvertisingReport::unpack(&mut payload)?;
                    self.subscribers.le_advertising_report.dispatch(report);
                }
                payload.finish()?;
            }
            LeEventCode::ExtendedAdvertisingReport => {
                let count = payload.u8()? as usize;
                for _ in 0..count {
                    let report = LeExtendedAdvertisingReport::unpack(&mut payload)?;
                    self.subscribers.le_extended_advertising_report.dispatch(report);
                }
                payload.finish()?;
            }
            LeEventCode::ConnectionUpdateComplete => {
                let event = LeConnectionUpdate::unpack(&mut payload)?;
                payload.finish()?;
                self.subscribers.le_connection_update.dispatch(event);
            }
            LeEventCode::ReadRemoteFeaturesComplete => {
                let event = LeRemoteFeatures::unpack(&mut payload)?;
                payload.finish()?;
                self.subscribers.le_remote_features.dispatch(event);
            }
            LeEventCode::LongTermKeyRequest => {
                let event = LeLongTermKeyRequest::unpack(&mut payload)?;
                payload.finish()?;
                self.subscribers.le_long_term_key_request.dispatch(event);
            }
            LeEventCode::PhyUpdateComplete => {
                let event = LePhyUpdate::unpack(&mut payload)?;
                payload.finish()?;
                self.subscribers.le_phy_update.dispatch(event);
            }
            LeEventCode::ChannelSelectionAlgorithm => {
                let event = LeChannelSelection::unpack(&mut payload)?;
                payload.finish()?;
                self.subscribers.le_channel_selection.dispatch(event);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_report_decoding() {
        let mut buf = ReceiveBuffer::from_payload(&[
            0x00, // ADV_IND
            0x01, // random address
            0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // address
            0x02, 0x01, 0x06, // data
            0xC4, // -60 dBm
        ]);
        let report = LeAdvertisingReport::unpack(&mut buf).unwrap();
        assert_eq!(report.event_type, LeAdvertisingReportType::AdvInd);
        assert_eq!(report.address_kind, AddressKind::Random);
        assert_eq!(report.address.to_string(), "01:02:03:04:05:06");
        assert_eq!(&report.data[..], &[0x01, 0x06]);
        assert_eq!(report.rssi, Some(-60));
        assert!(buf.finish().is_ok());
    }

    #[test]
    fn rssi_127_is_unavailable() {
        let mut buf = ReceiveBuffer::from_payload(&[
            0x04, 0x00, 1, 2, 3, 4, 5, 6, 0x00, 0x7F,
        ]);
        let report = LeAdvertisingReport::unpack(&mut buf).unwrap();
        assert_eq!(report.event_type, LeAdvertisingReportType::ScanRsp);
        assert_eq!(report.rssi, None);
    }

    #[test]
    fn extended_report_sentinels() {
        let mut buf = ReceiveBuffer::from_payload(&[
            0x13, 0x00, // connectable | scannable | legacy
            0x00, // public
            1, 2, 3, 4, 5, 6, // address
            0x01, // primary phy 1M
            0x00, // no secondary phy
            0xFF, // no SID
            0x7F, // no TX power
            0x7F, // no RSSI
            0x00, 0x00, // no periodic interval
            0x00, // direct address kind
            0, 0, 0, 0, 0, 0, // direct address
            0x01, 0xFF, // data
        ]);
        let report = LeExtendedAdvertisingReport::unpack(&mut buf).unwrap();
        assert!(report.flags.contains(ExtendedReportFlags::LEGACY));
        assert_eq!(report.data_status, ReportDataStatus::Complete);
        assert_eq!(report.secondary_phy, None);
        assert_eq!(report.sid, None);
        assert_eq!(report.tx_power, None);
        assert_eq!(report.rssi, None);
        assert_eq!(report.periodic_advertising_interval, None);
        assert_eq!(&report.data[..], &[0xFF]);
        assert!(buf.finish().is_ok());
    }

    #[test]
    fn enhanced_connection_complete_rpa_fields() {
        let mut payload = Vec::new();
        payload.push(0x00); // status
        payload.extend_from_slice(&[0x40, 0x00]); // handle
        payload.push(0x01); // peripheral
        payload.push(0x00); // public peer
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        payload.extend_from_slice(&[0; 6]); // no local RPA
        payload.extend_from_slice(&[9, 9, 9, 9, 9, 9]); // peer RPA
        payload.extend_from_slice(&[0x06, 0x00]); // 7.5 ms
        payload.extend_from_slice(&[0x00, 0x00]);
        payload.extend_from_slice(&[0x48, 0x00]); // 720 ms
        payload.push(0x01);
        let mut buf = ReceiveBuffer::from_payload(&payload);
        let event = LeConnection::unpack(&mut buf, true).unwrap();
        assert_eq!(event.handle, 0x0040);
        assert_eq!(event.role, Role::Peripheral);
        assert_eq!(event.local_rpa, None);
        assert!(event.peer_rpa.is_some());
        assert_eq!(event.interval, Duration::from_micros(7500));
        assert_eq!(event.supervision_timeout, Duration::from_millis(720));
        assert!(buf.finish().is_ok());
    }
}
