mod acl;
mod buffer;
mod event_loop;
mod packet;
mod snoop;

pub mod commands;
pub mod consts;
pub mod events;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::spawn;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver as MpscReceiver, UnboundedSender as MpscSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use acl::{AclDataPacket, BoundaryFlag, BroadcastFlag};
pub use buffer::{ReceiveBuffer, SendBuffer};
pub use commands::{Opcode, OpcodeGroup};
pub use packet::PacketType;

use crate::ensure;
use crate::hci::consts::Status;
use crate::hci::event_loop::{event_loop, EventLoopCommand, PendingCommand, PendingSlot};
use crate::hci::events::{FromEvent, Subscriber};
use crate::transport::Transport;

/// Default deadline for a command to receive its completion event.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

/// Handle to a controller. Cloning is not supported; share it behind an
/// [`Arc`] the way multiple protocol layers usually do.
pub struct Hci {
    writer: MpscSender<SendBuffer>,
    ctl: MpscSender<EventLoopCommand>,
    pending: PendingSlot,
    next_id: AtomicU64,
    event_loop: JoinHandle<()>,
}

impl Hci {
    /// Takes ownership of the transport and spawns the event loop on the
    /// current tokio runtime.
    pub fn new<T: Transport>(transport: T) -> Self {
        let pending = PendingSlot::default();
        let (writer, write_queue) = unbounded_channel();
        let (ctl, ctl_queue) = unbounded_channel();
        let event_loop = spawn(event_loop(transport, pending.clone(), write_queue, ctl_queue));
        Hci {
            writer,
            ctl,
            pending,
            next_id: AtomicU64::new(0),
            event_loop,
        }
    }

    pub async fn call<T: FromEvent>(&self, cmd: Opcode) -> Result<T, Error> {
        self.call_with_args(cmd, |_| {}).await
    }

    pub async fn call_with_args<T: FromEvent>(
        &self,
        cmd: Opcode,
        packer: impl FnOnce(&mut SendBuffer),
    ) -> Result<T, Error> {
        self.submit(cmd, None, COMMAND_TIMEOUT, packer).await
    }

    /// Like [`call_with_args`](Self::call_with_args) for commands whose
    /// return parameters echo a connection handle: completions carrying a
    /// different handle are discarded instead of resolving this call, so a
    /// late reply to an abandoned command for another connection can never
    /// be mistaken for this one.
    pub async fn call_for_handle<T: FromEvent>(
        &self,
        cmd: Opcode,
        handle: u16,
        packer: impl FnOnce(&mut SendBuffer),
    ) -> Result<T, Error> {
        self.submit(cmd, Some(handle), COMMAND_TIMEOUT, packer).await
    }

    /// [`call_with_args`](Self::call_with_args) with a caller-chosen
    /// deadline instead of [`COMMAND_TIMEOUT`].
    pub async fn call_with_deadline<T: FromEvent>(
        &self,
        cmd: Opcode,
        deadline: Duration,
        packer: impl FnOnce(&mut SendBuffer),
    ) -> Result<T, Error> {
        self.submit(cmd, None, deadline, packer).await
    }

    async fn submit<T: FromEvent>(
        &self,
        cmd: Opcode,
        handle: Option<u16>,
        deadline: Duration,
        packer: impl FnOnce(&mut SendBuffer),
    ) -> Result<T, Error> {
        let mut buf = SendBuffer::default();
        buf.put_u8(PacketType::Command);
        buf.put_u16(cmd);
        // the length byte is backpatched once the payload is known
        buf.put_u8(0u8);
        packer(&mut buf);
        let payload_len = u8::try_from(buf.len() - 4).map_err(|_| Error::PayloadTooLarge)?;
        buf.set_u8(3, payload_len);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = {
            let mut slot = self.pending.lock();
            ensure!(slot.is_none(), Error::Busy);
            let (tx, rx) = oneshot::channel();
            *slot = Some(PendingCommand {
                id,
                opcode: cmd,
                handle,
                tx,
            });
            rx
        };
        // clears the slot when this call is abandoned or times out, so a
        // late completion cannot resolve a future command
        let mut guard = PendingGuard {
            pending: &self.pending,
            id,
            armed: true,
        };

        self.writer.send(buf).map_err(|_| Error::TransportClosed)?;

        let mut resp = match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => {
                // the loop always takes the slot before resolving
                guard.armed = false;
                result?
            }
            Ok(Err(_)) => return Err(Error::TransportClosed),
            Err(_) => return Err(Error::Timeout),
        };

        let status = resp.u8().map(Status::from)?;
        match status {
            Status::Success => {
                let result = T::unpack(&mut resp)?;
                resp.finish()?;
                Ok(result)
            }
            status => Err(Error::Controller {
                opcode: cmd,
                status,
            }),
        }
    }

    /// Queues one ACL data packet for transmission.
    pub fn send_acl_data(&self, packet: &AclDataPacket) -> Result<(), Error> {
        let mut buf = SendBuffer::default();
        packet.write_to(&mut buf)?;
        self.writer.send(buf).map_err(|_| Error::TransportClosed)
    }

    fn subscribe<E>(
        &self,
        wrap: impl FnOnce(MpscSender<E>) -> Subscriber,
    ) -> Result<MpscReceiver<E>, Error> {
        let (tx, rx) = unbounded_channel();
        self.ctl
            .send(EventLoopCommand::Register(wrap(tx)))
            .map_err(|_| Error::TransportClosed)?;
        Ok(rx)
    }

    /// Disconnection notifications, with the reason decoded from the
    /// controller error table.
    pub fn disconnection_events(&self) -> Result<MpscReceiver<events::Disconnection>, Error> {
        self.subscribe(Subscriber::Disconnection)
    }

    pub fn encryption_change_events(&self) -> Result<MpscReceiver<events::EncryptionChange>, Error> {
        self.subscribe(Subscriber::EncryptionChange)
    }

    /// Connection establishment, legacy and enhanced unified.
    pub fn le_connection_events(&self) -> Result<MpscReceiver<events::LeConnection>, Error> {
        self.subscribe(Subscriber::LeConnection)
    }

    /// One notification per received legacy advertising report.
    pub fn le_advertising_reports(&self) -> Result<MpscReceiver<events::LeAdvertisingReport>, Error> {
        self.subscribe(Subscriber::LeAdvertisingReport)
    }

    /// One notification per received extended advertising report.
    pub fn le_extended_advertising_reports(
        &self,
    ) -> Result<MpscReceiver<events::LeExtendedAdvertisingReport>, Error> {
        self.subscribe(Subscriber::LeExtendedAdvertisingReport)
    }

    pub fn le_connection_update_events(
        &self,
    ) -> Result<MpscReceiver<events::LeConnectionUpdate>, Error> {
        self.subscribe(Subscriber::LeConnectionUpdate)
    }

    pub fn le_remote_features_events(&self) -> Result<MpscReceiver<events::LeRemoteFeatures>, Error> {
        self.subscribe(Subscriber::LeRemoteFeatures)
    }

    pub fn le_channel_selection_events(
        &self,
    ) -> Result<MpscReceiver<events::LeChannelSelection>, Error> {
        self.subscribe(Subscriber::LeChannelSelection)
    }

    /// Long-term-key requests from the peer; answer with
    /// [`le_long_term_key_request_reply`](Self::le_long_term_key_request_reply)
    /// or the negative reply.
    pub fn le_long_term_key_requests(
        &self,
    ) -> Result<MpscReceiver<events::LeLongTermKeyRequest>, Error> {
        self.subscribe(Subscriber::LeLongTermKeyRequest)
    }

    pub fn le_phy_update_events(&self) -> Result<MpscReceiver<events::LePhyUpdate>, Error> {
        self.subscribe(Subscriber::LePhyUpdate)
    }

    /// Inbound ACL data stream; reassembly above the ACL layer is the
    /// subscriber's business.
    pub fn acl_data(&self) -> Result<MpscReceiver<AclDataPacket>, Error> {
        self.subscribe(Subscriber::AclData)
    }

    /// Asks the event loop to terminate. The pending command (if any)
    /// resolves with [`Error::TransportClosed`].
    pub fn shutdown(&self) {
        let _ = self.ctl.send(EventLoopCommand::Shutdown);
    }
}

impl Drop for Hci {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingSlot,
    id: u64,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.pending.lock();
            if slot.as_ref().is_some_and(|cmd| cmd.id == self.id) {
                *slot = None;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("transport closed")]
    TransportClosed,
    #[error("another command is already pending")]
    Busy,
    #[error("command timed out")]
    Timeout,
    #[error("payload exceeds maximum command size (255)")]
    PayloadTooLarge,
    #[error("advertising data exceeds 31 bytes")]
    AdvertisingDataTooLong,
    #[error("packet payload has an invalid size")]
    InvalidPayloadSize,
    #[error("unknown HCI event code: 0x{0:02X}")]
    UnknownEventCode(u8),
    #[error("unknown packet type indicator: 0x{0:02X}")]
    UnknownPacketType(u8),
    #[error("unexpected command response for {0:?}")]
    UnexpectedCommandResponse(Opcode),
    #[error("controller error for {opcode:?}: {status}")]
    Controller { opcode: Opcode, status: Status },
}
