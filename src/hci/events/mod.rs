mod le;

use tokio::sync::mpsc::UnboundedSender as MpscSender;

pub use le::*;

use crate::hci::acl::AclDataPacket;
use crate::hci::buffer::ReceiveBuffer;
use crate::hci::consts::Status;
use crate::hci::Error;
use crate::utils::DispatchExt;

/// Decoding of return parameters and event payloads.
pub trait FromEvent: Sized {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error>;
}

impl FromEvent for () {
    fn unpack(_: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(())
    }
}

impl FromEvent for u8 {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u8()
    }
}

impl FromEvent for i8 {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.i8()
    }
}

impl FromEvent for u16 {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u16()
    }
}

impl FromEvent for u64 {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u64()
    }
}

impl<const N: usize> FromEvent for [u8; N] {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.bytes()
    }
}

/// Return-parameter shape of per-connection commands that echo the handle
/// and nothing else.
pub(crate) struct EchoedHandle(#[allow(dead_code)] pub u16);

impl FromEvent for EchoedHandle {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u16().map(|handle| Self(handle & 0x0FFF))
    }
}

/// `Disconnection_Complete` ([Vol 4] Part E, Section 7.7.5).
#[derive(Debug, Clone)]
pub struct Disconnection {
    pub status: Status,
    pub handle: u16,
    pub reason: Status,
}

impl FromEvent for Disconnection {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            status: buf.u8().map(Status::from)?,
            handle: buf.u16()? & 0x0FFF,
            reason: buf.u8().map(Status::from)?,
        })
    }
}

/// `Encryption_Change` ([Vol 4] Part E, Section 7.7.8).
#[derive(Debug, Clone)]
pub struct EncryptionChange {
    pub status: Status,
    pub handle: u16,
    pub enabled: bool,
}

impl FromEvent for EncryptionChange {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            status: buf.u8().map(Status::from)?,
            handle: buf.u16()? & 0x0FFF,
            enabled: buf.u8()? != 0,
        })
    }
}

/// One registration request, carried from the `Hci` handle to the event
/// loop. Each variant is a subscription to one event family.
pub(crate) enum Subscriber {
    Disconnection(MpscSender<Disconnection>),
    EncryptionChange(MpscSender<EncryptionChange>),
    LeConnection(MpscSender<LeConnection>),
    LeAdvertisingReport(MpscSender<LeAdvertisingReport>),
    LeExtendedAdvertisingReport(MpscSender<LeExtendedAdvertisingReport>),
    LeConnectionUpdate(MpscSender<LeConnectionUpdate>),
    LeRemoteFeatures(MpscSender<LeRemoteFeatures>),
    LeChannelSelection(MpscSender<LeChannelSelection>),
    LeLongTermKeyRequest(MpscSender<LeLongTermKeyRequest>),
    LePhyUpdate(MpscSender<LePhyUpdate>),
    AclData(MpscSender<AclDataPacket>),
}

/// Per-family subscriber lists. Dead receivers are pruned on dispatch.
#[derive(Default)]
pub(crate) struct Subscribers {
    pub disconnection: Vec<MpscSender<Disconnection>>,
    pub encryption_change: Vec<MpscSender<EncryptionChange>>,
    pub le_connection: Vec<MpscSender<LeConnection>>,
    pub le_advertising_report: Vec<MpscSender<LeAdvertisingReport>>,
    pub le_extended_advertising_report: Vec<MpscSender<LeExtendedAdvertisingReport>>,
    pub le_connection_update: Vec<MpscSender<LeConnectionUpdate>>,
    pub le_remote_features: Vec<MpscSender<LeRemoteFeatures>>,
    pub le_channel_selection: Vec<MpscSender<LeChannelSelection>>,
    pub le_long_term_key_request: Vec<MpscSender<LeLongTermKeyRequest>>,
    pub le_phy_update: Vec<MpscSender<LePhyUpdate>>,
    pub acl_data: Vec<MpscSender<AclDataPacket>>,
}

impl Subscribers {
    pub fn add(&mut self, subscriber: Subscriber) {
        match subscriber {
            Subscriber::Disconnection(tx) => self.disconnection.push(tx),
            Subscriber::EncryptionChange(tx) => self.encryption_change.push(tx),
            Subscriber::LeConnection(tx) => self.le_connection.push(tx),
            Subscriber::LeAdvertisingReport(tx) => self.le_advertising_report.push(tx),
            Subscriber::LeExtendedAdvertisingReport(tx) => {
                self.le_extended_advertising_report.push(tx)
            }
            Subscriber::LeConnectionUpdate(tx) => self.le_connection_update.push(tx),
            Subscriber::LeRemoteFeatures(tx) => self.le_remote_features.push(tx),
            Subscriber::LeChannelSelection(tx) => self.le_channel_selection.push(tx),
            Subscriber::LeLongTermKeyRequest(tx) => self.le_long_term_key_request.push(tx),
            Subscriber::LePhyUpdate(tx) => self.le_phy_update.push(tx),
            Subscriber::AclData(tx) => self.acl_data.push(tx),
        }
    }

    /// Drops every subscription. Used when a `Reset` completes: handles and
    /// controller-side state the subscribers depend on are gone.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn dispatch_disconnection(&mut self, event: Disconnection) -> bool {
        self.disconnection.dispatch(event)
    }

    pub fn dispatch_encryption_change(&mut self, event: EncryptionChange) -> bool {
        self.encryption_change.dispatch(event)
    }

    pub fn dispatch_acl(&mut self, packet: AclDataPacket) -> bool {
        self.acl_data.dispatch(packet)
    }
}
