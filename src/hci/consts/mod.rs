mod le;

use std::fmt::{Debug, Display, Formatter};

use enum_iterator::Sequence;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

pub use le::*;

use crate::hci::buffer::ReceiveBuffer;
use crate::hci::events::FromEvent;
use crate::hci::Error;

/// HCI event codes ([Vol 4] Part E, Section 7.7), restricted to the events
/// an LE host sees.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, TryFromPrimitive, Sequence)]
#[repr(u8)]
pub enum EventCode {
    DisconnectionComplete = 0x05,
    EncryptionChange = 0x08,
    ReadRemoteVersionInformationComplete = 0x0C,
    CommandComplete = 0x0E,
    CommandStatus = 0x0F,
    HardwareError = 0x10,
    NumberOfCompletedPackets = 0x13,
    DataBufferOverflow = 0x1A,
    EncryptionKeyRefreshComplete = 0x30,
    LeMeta = 0x3E,
    AuthenticatedPayloadTimeoutExpired = 0x57,
    Vendor = 0xFF,
}

impl EventCode {
    // ([Vol 4] Part E, Section 7.3.1). Unmaskable events map to zero.
    pub fn to_mask_bits(self) -> u64 {
        match self {
            EventCode::DisconnectionComplete => 1 << 4,
            EventCode::EncryptionChange => 1 << 7,
            EventCode::ReadRemoteVersionInformationComplete => 1 << 11,
            EventCode::HardwareError => 1 << 15,
            EventCode::DataBufferOverflow => 1 << 25,
            EventCode::EncryptionKeyRefreshComplete => 1 << 47,
            EventCode::LeMeta => 1 << 61,
            _ => 0,
        }
    }
}

/// Event mask for `Set_Event_Mask` ([Vol 4] Part E, Section 7.3.1).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EventMask(u64);

impl EventMask {
    /// Returns an all-zero mask that disables every maskable event.
    #[inline(always)]
    pub const fn none() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        enum_iterator::all::<EventCode>().fold(EventMask::none(), |mask, e| mask.with(e, true))
    }

    // Enables or disables the specified event.
    #[inline(always)]
    pub fn with(mut self, c: EventCode, enable: bool) -> Self {
        let mask = c.to_mask_bits();
        if enable {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
        self
    }

    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Controller status codes ([Vol 1] Part F, Section 1.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    UnknownHciCommand = 0x01,
    UnknownConnectionIdentifier = 0x02,
    HardwareFailure = 0x03,
    PageTimeout = 0x04,
    AuthenticationFailure = 0x05,
    PinOrKeyMissing = 0x06,
    MemoryCapacityExceeded = 0x07,
    ConnectionTimeout = 0x08,
    ConnectionLimitExceeded = 0x09,
    SynchronousConnectionLimitExceeded = 0x0A,
    ConnectionAlreadyExists = 0x0B,
    CommandDisallowed = 0x0C,
    ConnectionRejectedDueToLimitedResources = 0x0D,
    ConnectionRejectedDueToSecurityReasons = 0x0E,
    ConnectionRejectedDueToUnacceptableBdAddr = 0x0F,
    ConnectionAcceptTimeoutExceeded = 0x10,
    UnsupportedFeatureOrParameterValue = 0x11,
    InvalidHciCommandParameters = 0x12,
    RemoteUserTerminatedConnection = 0x13,
    RemoteDeviceTerminatedConnectionDueToLowResources = 0x14,
    RemoteDeviceTerminatedConnectionDueToPowerOff = 0x15,
    ConnectionTerminatedByLocalHost = 0x16,
    RepeatedAttempts = 0x17,
    PairingNotAllowed = 0x18,
    UnknownLmpPdu = 0x19,
    UnsupportedRemoteFeature = 0x1A,
    ScoOffsetRejected = 0x1B,
    ScoIntervalRejected = 0x1C,
    ScoAirModeRejected = 0x1D,
    InvalidLlParameters = 0x1E,
    // ([Vol 4] Part E, Section 1.2): unknown codes decode as unspecified.
    #[num_enum(default)]
    UnspecifiedError = 0x1F,
    UnsupportedLlParameterValue = 0x20,
    RoleChangeNotAllowed = 0x21,
    LlResponseTimeout = 0x22,
    LlProcedureCollision = 0x23,
    LmpPduNotAllowed = 0x24,
    EncryptionModeNotAcceptable = 0x25,
    LinkKeyCannotBeChanged = 0x26,
    RequestedQosNotSupported = 0x27,
    InstantPassed = 0x28,
    PairingWithUnitKeyNotSupported = 0x29,
    DifferentTransactionCollision = 0x2A,
    QosUnacceptableParameter = 0x2C,
    QosRejected = 0x2D,
    ChannelClassificationNotSupported = 0x2E,
    InsufficientSecurity = 0x2F,
    ParameterOutOfMandatoryRange = 0x30,
    RoleSwitchPending = 0x32,
    ReservedSlotViolation = 0x34,
    RoleSwitchFailed = 0x35,
    ExtendedInquiryResponseTooLarge = 0x36,
    SecureSimplePairingNotSupportedByHost = 0x37,
    HostBusyPairing = 0x38,
    ConnectionRejectedDueToNoSuitableChannelFound = 0x39,
    ControllerBusy = 0x3A,
    UnacceptableConnectionParameters = 0x3B,
    AdvertisingTimeout = 0x3C,
    ConnectionTerminatedDueToMicFailure = 0x3D,
    ConnectionFailedToBeEstablished = 0x3E,
    CoarseClockAdjustmentRejected = 0x40,
    Type0SubmapNotDefined = 0x41,
    UnknownAdvertisingIdentifier = 0x42,
    LimitReached = 0x43,
    OperationCancelledByHost = 0x44,
    PacketTooLong = 0x45,
}

impl Status {
    /// Returns whether status is `Success`.
    #[inline(always)]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl std::error::Error for Status {}

/// Bluetooth Core Specification versions ([Assigned Numbers] Section 2.1).
#[derive(Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd, FromPrimitive, IntoPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum CoreVersion {
    V1_0 = 0x00,
    V1_1 = 0x01,
    V1_2 = 0x02,
    V2_0 = 0x03,
    V2_1 = 0x04,
    V3_0 = 0x05,
    V4_0 = 0x06,
    V4_1 = 0x07,
    V4_2 = 0x08,
    V5_0 = 0x09,
    V5_1 = 0x0A,
    V5_2 = 0x0B,
    V5_3 = 0x0C,
    V5_4 = 0x0D,
    #[default]
    Unknown = 0xFF,
}

impl Debug for CoreVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match *self {
            Self::V1_0 => "v1.0b",
            Self::V1_1 => "v1.1",
            Self::V1_2 => "v1.2",
            Self::V2_0 => "v2.0+EDR",
            Self::V2_1 => "v2.1+EDR",
            Self::V3_0 => "v3.0+HS",
            Self::V4_0 => "v4.0",
            Self::V4_1 => "v4.1",
            Self::V4_2 => "v4.2",
            Self::V5_0 => "v5.0",
            Self::V5_1 => "v5.1",
            Self::V5_2 => "v5.2",
            Self::V5_3 => "v5.3",
            Self::V5_4 => "v5.4",
            Self::Unknown => "<unknown version>",
        })
    }
}

/// Company identifier ([Assigned Numbers] Section 7.1).
#[derive(Debug, Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct CompanyId(pub u16);

/// 48-bit device address, least-significant byte first on the wire.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Address([u8; 6]);

impl Address {
    pub const ZERO: Address = Address([0; 6]);

    pub const fn raw(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl From<[u8; 6]> for Address {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromEvent for Address {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.bytes().map(Self::from)
    }
}

/// Address type tag accompanying an address in commands and reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AddressKind {
    Public = 0x00,
    Random = 0x01,
    PublicIdentity = 0x02,
    RandomIdentity = 0x03,
    Anonymous = 0xFF,
}

/// Role assigned by the controller at connection time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Role {
    Central = 0x00,
    Peripheral = 0x01,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!(Status::from(0x12), Status::InvalidHciCommandParameters);
        assert_eq!(Status::from(0x0C), Status::CommandDisallowed);
        assert_eq!(u8::from(Status::RemoteUserTerminatedConnection), 0x13);
    }

    #[test]
    fn unknown_status_decodes_as_unspecified() {
        assert_eq!(Status::from(0xE7), Status::UnspecifiedError);
    }

    #[test]
    fn event_mask_covers_le_meta() {
        assert_ne!(EventMask::all().bits() & 1 << 61, 0);
        assert_eq!(EventMask::none().with(EventCode::LeMeta, true).bits(), 1 << 61);
    }

    #[test]
    fn address_display_is_msb_first() {
        let addr = Address::from([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(addr.to_string(), "06:05:04:03:02:01");
    }
}
