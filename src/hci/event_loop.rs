use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver as MpscReceiver;
use tokio::sync::oneshot::Sender as OneshotSender;
use tracing::{debug, error, trace, warn};

use crate::ensure;
use crate::hci::acl::AclDataPacket;
use crate::hci::buffer::{ReceiveBuffer, SendBuffer};
use crate::hci::consts::EventCode;
use crate::hci::events::{Disconnection, EncryptionChange, FromEvent, Subscriber, Subscribers};
use crate::hci::packet::{HciPacket, PacketAssembler, PacketType};
use crate::hci::snoop::{Direction, LogWriter};
use crate::hci::{Error, Opcode};
use crate::transport::Transport;

/// The single outstanding command ([Vol 4] Part E, Section 4.4: the host
/// shall not send a new command before the previous one completed).
pub(crate) struct PendingCommand {
    pub id: u64,
    pub opcode: Opcode,
    /// When set, completions whose return parameters carry a different
    /// connection handle are discarded instead of resolving this command.
    pub handle: Option<u16>,
    pub tx: OneshotSender<Result<ReceiveBuffer, Error>>,
}

pub(crate) type PendingSlot = Arc<Mutex<Option<PendingCommand>>>;

pub(crate) enum EventLoopCommand {
    Register(Subscriber),
    Shutdown,
}

pub(crate) async fn event_loop<T: Transport>(
    transport: T,
    pending: PendingSlot,
    mut write_queue: MpscReceiver<SendBuffer>,
    mut ctl_queue: MpscReceiver<EventLoopCommand>,
) {
    let (mut reader, mut writer) = tokio::io::split(transport);
    let mut assembler = PacketAssembler::default();
    let mut state = State::new(pending);
    let log = LogWriter::new();

    let failure = 'run: loop {
        tokio::select! {
            result = reader.read_buf(assembler.buffer()) => {
                match result {
                    Ok(0) => break 'run None,
                    Ok(_) => loop {
                        match assembler.pop() {
                            Ok(Some(packet)) => {
                                log.write(Direction::Received, packet.kind, &packet.data);
                                state.process_packet(packet)
                                    .unwrap_or_else(|err| warn!("Error processing packet: {:?}", err));
                            }
                            Ok(None) => break,
                            Err(err) => {
                                // no framing mark to resync on, give up
                                error!("HCI stream desynchronized: {}", err);
                                break 'run Some(err);
                            }
                        }
                    },
                    Err(err) => break 'run Some(Error::Io(err)),
                }
            },
            packet = write_queue.recv() => {
                let Some(packet) = packet else { break 'run None };
                if let Some(kind) = packet.data().first().copied()
                    .and_then(|tag| PacketType::try_from(tag).ok()) {
                    log.write(Direction::Sent, kind, &packet.data()[1..]);
                    if kind == PacketType::AclData {
                        state.acl_in_flight = state.acl_in_flight.saturating_add(1);
                    }
                }
                if let Err(err) = writer.write_all(packet.data()).await {
                    break 'run Some(Error::Io(err));
                }
            },
            cmd = ctl_queue.recv() => {
                match cmd {
                    Some(EventLoopCommand::Register(subscriber)) => state.subscribers.add(subscriber),
                    Some(EventLoopCommand::Shutdown) | None => break 'run None,
                }
            }
        }
    };
    state.fail_pending(failure);
    debug!("HCI event loop terminated");
}

pub(crate) struct State {
    pending: PendingSlot,
    pub(crate) subscribers: Subscribers,
    /// `Num_HCI_Command_Packets` credit reported by the controller.
    /// Informational while the pending slot serializes commands anyway.
    cmd_credits: u8,
    acl_in_flight: u32,
}

impl State {
    fn new(pending: PendingSlot) -> Self {
        Self {
            pending,
            subscribers: Subscribers::default(),
            cmd_credits: 1,
            acl_in_flight: 0,
        }
    }

    fn process_packet(&mut self, packet: HciPacket) -> Result<(), Error> {
        match packet.kind {
            PacketType::Event => self.process_hci_event(Event::parse(&packet.data)?),
            PacketType::AclData => {
                let packet = AclDataPacket::from_bytes(packet.data)?;
                if !self.subscribers.dispatch_acl(packet) {
                    trace!("ACL data discarded: no subscriber");
                }
                Ok(())
            }
            PacketType::Command => {
                warn!("Controller sent a command packet, discarding");
                Ok(())
            }
        }
    }

    fn process_hci_event(&mut self, mut event: Event) -> Result<(), Error> {
        trace!("Received HCI event: {:?}", event.code);
        match event.code {
            EventCode::CommandComplete | EventCode::CommandStatus => {
                // ([Vol 4] Part E, Sections 7.7.14 and 7.7.15). A status
                // event leads with the status byte; rotating it to the rear
                // yields the command-complete shape.
                if event.code == EventCode::CommandStatus {
                    event.data.get_mut().rotate_left(1);
                }
                self.cmd_credits = event.data.u8()?;
                let opcode = event.data.u16().map(Opcode::from)?;
                if opcode == Opcode::NONE {
                    // pure credit update
                    return Ok(());
                }
                self.complete_command(opcode, event.data)
            }
            EventCode::NumberOfCompletedPackets => {
                // ([Vol 4] Part E, Section 7.7.19). Consumed as a counter;
                // ACL flow control proper is the business of the layer above.
                let count = event.data.u8()? as usize;
                let handles: SmallVec<[u16; 4]> =
                    (0..count).map(|_| event.data.u16()).collect::<Result<_, _>>()?;
                for handle in handles {
                    let completed = event.data.u16()?;
                    trace!("Flushed {} packets for handle {}", completed, handle);
                    self.acl_in_flight = self.acl_in_flight.saturating_sub(u32::from(completed));
                }
                event.data.finish()
            }
            EventCode::DisconnectionComplete => {
                // ([Vol 4] Part E, Section 7.7.5).
                let evt = Disconnection::unpack(&mut event.data)?;
                event.data.finish()?;
                debug!("Disconnection: handle {} reason {}", evt.handle, evt.reason);
                self.subscribers.dispatch_disconnection(evt);
                Ok(())
            }
            EventCode::EncryptionChange => {
                // ([Vol 4] Part E, Section 7.7.8).
                let evt = EncryptionChange::unpack(&mut event.data)?;
                event.data.finish()?;
                self.subscribers.dispatch_encryption_change(evt);
                Ok(())
            }
            EventCode::LeMeta => self.process_le_event(event.data),
            EventCode::HardwareError => {
                let code = event.data.u8()?;
                error!("Controller hardware error: 0x{:02X}", code);
                Ok(())
            }
            code => {
                warn!("Unhandled HCI event: {:?}", code);
                Ok(())
            }
        }
    }

    fn complete_command(&mut self, opcode: Opcode, params: ReceiveBuffer) -> Result<(), Error> {
        let completion = {
            let mut slot = self.pending.lock();
            match slot.take() {
                Some(cmd) if cmd.opcode == opcode => {
                    if let Some(expected) = cmd.handle {
                        // the handle follows the status byte of the return
                        // parameters for every handle-echoing command
                        let embedded = params.peek_u16(1).map(|h| h & 0x0FFF);
                        if embedded.is_some_and(|h| h != expected & 0x0FFF) {
                            trace!(
                                "Discarding completion for {:?}: handle {:04X?} != {:04X}",
                                opcode, embedded, expected
                            );
                            *slot = Some(cmd);
                            return Ok(());
                        }
                    }
                    cmd
                }
                Some(cmd) => {
                    *slot = Some(cmd);
                    return Err(Error::UnexpectedCommandResponse(opcode));
                }
                None => return Err(Error::UnexpectedCommandResponse(opcode)),
            }
        };
        let succeeded = params.peek_u8(0) == Some(0x00);
        completion
            .tx
            .send(Ok(params))
            .unwrap_or_else(|_| debug!("Command caller went away"));
        if opcode == Opcode::RESET && succeeded {
            // all handles and controller state are void now; force
            // subscribers to re-register
            debug!("Reset complete, dropping subscriptions");
            self.subscribers.clear();
            self.acl_in_flight = 0;
        }
        Ok(())
    }

    fn fail_pending(&mut self, failure: Option<Error>) {
        if let Some(cmd) = self.pending.lock().take() {
            let _ = cmd.tx.send(Err(failure.unwrap_or(Error::TransportClosed)));
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub code: EventCode,
    pub data: ReceiveBuffer,
}

impl Event {
    /// HCI event packet ([Vol 4] Part E, Section 5.4.4).
    fn parse(data: &[u8]) -> Result<Self, Error> {
        data.split_first_chunk()
            .ok_or(Error::InvalidPayloadSize)
            .and_then(|([code, len], payload)| {
                let code =
                    EventCode::try_from(*code).map_err(|_| Error::UnknownEventCode(*code))?;
                ensure!(*len as usize == payload.len(), Error::InvalidPayloadSize);
                Ok(Self {
                    code,
                    data: ReceiveBuffer::from_payload(payload),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_parse_checks_length() {
        assert!(matches!(
            Event::parse(&[0x0E, 0x04, 0x01]),
            Err(Error::InvalidPayloadSize)
        ));
        let event = Event::parse(&[0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]).unwrap();
        assert_eq!(event.code, EventCode::CommandComplete);
        assert_eq!(event.data.remaining(), 4);
    }

    #[test]
    fn event_parse_rejects_unknown_code() {
        assert!(matches!(
            Event::parse(&[0x77, 0x00]),
            Err(Error::UnknownEventCode(0x77))
        ));
    }
}
