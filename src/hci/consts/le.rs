use std::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::hci::buffer::ReceiveBuffer;
use crate::hci::events::FromEvent;
use crate::hci::Error;

/// Advertising type for legacy advertising ([Vol 4] Part E, Section 7.8.5).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LeAdvertisingType {
    #[default]
    Undirected = 0x00,
    DirectedHighDuty = 0x01,
    Scannable = 0x02,
    NonConnectable = 0x03,
    DirectedLowDuty = 0x04,
}

/// Own address source for advertising, scanning, and initiating.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LeOwnAddressType {
    #[default]
    Public = 0x00,
    Random = 0x01,
    PublicWithPrivacyFallback = 0x02,
    RandomWithPrivacyFallback = 0x03,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LePeerAddressType {
    #[default]
    Public = 0x00,
    Random = 0x01,
}

bitflags::bitflags! {
    /// Primary advertising channels ([Vol 4] Part E, Section 7.8.5).
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LeAdvertisingChannelMap: u8 {
        const CH37 = 1 << 0;
        const CH38 = 1 << 1;
        const CH39 = 1 << 2;
    }
}

impl Default for LeAdvertisingChannelMap {
    fn default() -> Self {
        Self::all()
    }
}

/// PHY value as carried in read-outs and reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LePhy {
    Le1M = 0x01,
    Le2M = 0x02,
    LeCoded = 0x03,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LePrimaryAdvertisingPhy {
    #[default]
    Le1M = 0x01,
    LeCoded = 0x03,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LeSecondaryAdvertisingPhy {
    #[default]
    Le1M = 0x01,
    Le2M = 0x02,
    LeCoded = 0x03,
}

bitflags::bitflags! {
    /// PHY selection bitmask for `Set_Default_PHY` / `Set_PHY` and the
    /// initiating PHYs of `Extended_Create_Connection`.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LePhyMask: u8 {
        const LE_1M = 1 << 0;
        const LE_2M = 1 << 1;
        const LE_CODED = 1 << 2;
    }

    /// Scanning PHY bitmask; scanning happens on 1M and/or Coded only.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LeScanningPhys: u8 {
        const LE_1M = 1 << 0;
        const LE_CODED = 1 << 2;
    }
}

/// Coded PHY preference for `Set_PHY`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u16)]
pub enum LeCodedPhyOptions {
    #[default]
    NoPreference = 0x0000,
    S2 = 0x0001,
    S8 = 0x0002,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LeScanType {
    #[default]
    Passive = 0x00,
    Active = 0x01,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum LeScanFilterDuplicates {
    #[default]
    Disabled = 0x00,
    Enabled = 0x01,
    ResetEachPeriod = 0x02,
}

/// Fragment operation for extended advertising / scan response data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum AdvertisingDataOperation {
    Intermediate = 0x00,
    First = 0x01,
    Last = 0x02,
    Complete = 0x03,
    Unchanged = 0x04,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum AdvertisingFilterPolicy {
    #[default]
    Unfiltered = 0x00,
    FilterScanRequests = 0x01,
    FilterConnectionRequests = 0x02,
    FilterAll = 0x03,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum ScanningFilterPolicy {
    #[default]
    BasicUnfiltered = 0x00,
    BasicFiltered = 0x01,
    ExtendedUnfiltered = 0x02,
    ExtendedFiltered = 0x03,
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum InitiatorFilterPolicy {
    #[default]
    PeerAddress = 0x00,
    FilterAcceptList = 0x01,
}

bitflags::bitflags! {
    /// Advertising event properties for extended advertising
    /// ([Vol 4] Part E, Section 7.8.53).
    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    pub struct AdvertisingEventProperties: u16 {
        const CONNECTABLE = 1 << 0;
        const SCANNABLE = 1 << 1;
        const DIRECTED = 1 << 2;
        const HIGH_DUTY_CYCLE = 1 << 3;
        const LEGACY = 1 << 4;
        const ANONYMOUS = 1 << 5;
        const INCLUDE_TX_POWER = 1 << 6;
    }
}

/// Channel selection algorithm announced at connection time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ChannelSelectionAlgorithm {
    Algorithm1 = 0x00,
    Algorithm2 = 0x01,
}

/// Host-assigned identifier scoping an extended advertising set.
/// Valid handles are 0x00..=0xEF.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AdvertisingHandle(pub u8);

impl AdvertisingHandle {
    pub const MAX: AdvertisingHandle = AdvertisingHandle(0xEF);
}

impl From<AdvertisingHandle> for u8 {
    fn from(handle: AdvertisingHandle) -> u8 {
        handle.0
    }
}

/// TX power sentinel: the host has no preference.
pub const TX_POWER_NO_PREFERENCE: i8 = 0x7F;
/// TX power sentinel: the minimum power the controller supports.
pub const TX_POWER_MINIMUM: i8 = 0x7E;

bitflags::bitflags! {
    /// LE event mask bits ([Vol 4] Part E, Section 7.8.1); bit n enables
    /// the LE meta sub-event with code n + 1.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LeEventMask: u64 {
        const CONNECTION_COMPLETE = 1 << 0;
        const ADVERTISING_REPORT = 1 << 1;
        const CONNECTION_UPDATE_COMPLETE = 1 << 2;
        const READ_REMOTE_FEATURES_COMPLETE = 1 << 3;
        const LONG_TERM_KEY_REQUEST = 1 << 4;
        const REMOTE_CONNECTION_PARAMETER_REQUEST = 1 << 5;
        const DATA_LENGTH_CHANGE = 1 << 6;
        const ENHANCED_CONNECTION_COMPLETE = 1 << 9;
        const DIRECTED_ADVERTISING_REPORT = 1 << 10;
        const PHY_UPDATE_COMPLETE = 1 << 11;
        const EXTENDED_ADVERTISING_REPORT = 1 << 12;
        const SCAN_TIMEOUT = 1 << 16;
        const ADVERTISING_SET_TERMINATED = 1 << 17;
        const SCAN_REQUEST_RECEIVED = 1 << 18;
        const CHANNEL_SELECTION_ALGORITHM = 1 << 19;
    }
}

impl Default for LeEventMask {
    /// Enables every sub-event this crate routes.
    fn default() -> Self {
        Self::CONNECTION_COMPLETE
            | Self::ADVERTISING_REPORT
            | Self::CONNECTION_UPDATE_COMPLETE
            | Self::READ_REMOTE_FEATURES_COMPLETE
            | Self::LONG_TERM_KEY_REQUEST
            | Self::ENHANCED_CONNECTION_COMPLETE
            | Self::PHY_UPDATE_COMPLETE
            | Self::EXTENDED_ADVERTISING_REPORT
            | Self::CHANNEL_SELECTION_ALGORITHM
    }
}

bitflags::bitflags! {
    /// LE controller feature bits ([Vol 6] Part B, Section 4.6).
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LeFeatureMask: u64 {
        const ENCRYPTION = 1 << 0;
        const CONNECTION_PARAMETERS_REQUEST = 1 << 1;
        const EXTENDED_REJECT_INDICATION = 1 << 2;
        const PERIPHERAL_FEATURE_EXCHANGE = 1 << 3;
        const PING = 1 << 4;
        const DATA_LENGTH_EXTENSION = 1 << 5;
        const PRIVACY = 1 << 6;
        const EXTENDED_SCANNING_FILTER_POLICIES = 1 << 7;
        const LE_2M_PHY = 1 << 8;
        const CODED_PHY = 1 << 11;
        const EXTENDED_ADVERTISING = 1 << 12;
        const PERIODIC_ADVERTISING = 1 << 13;
        const CHANNEL_SELECTION_ALGORITHM_2 = 1 << 14;
    }
}

impl FromEvent for LeFeatureMask {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u64().map(Self::from_bits_retain)
    }
}

/// LMP feature bits of the BR/EDR-side `Read_Local_Supported_Features`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LmpFeatureMask(pub u64);

impl LmpFeatureMask {
    pub const fn bit(&self, n: u32) -> bool {
        self.0 & 1 << n != 0
    }
}

impl FromEvent for LmpFeatureMask {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u64().map(Self)
    }
}

/// One Link Layer state as named by the supported-states table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LeState {
    NonConnectableAdvertising,
    ScannableAdvertising,
    ConnectableAdvertising,
    HighDutyCycleDirectedAdvertising,
    LowDutyCycleDirectedAdvertising,
    PassiveScanning,
    ActiveScanning,
    Initiating,
    Central,
    Peripheral,
}

/// Decoded `LE_Read_Supported_States` bitmask ([Vol 4] Part E,
/// Section 7.8.27). Bits 0..=41 each stand for a combination of one or two
/// states the Link Layer supports concurrently; bits 42..=63 are reserved.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LeSupportedStates(u64);

impl LeSupportedStates {
    const COMBINATIONS: [&'static [LeState]; 42] = {
        use LeState::*;
        [
            &[NonConnectableAdvertising],
            &[ScannableAdvertising],
            &[ConnectableAdvertising],
            &[HighDutyCycleDirectedAdvertising],
            &[PassiveScanning],
            &[ActiveScanning],
            &[Initiating],
            &[Peripheral],
            &[NonConnectableAdvertising, PassiveScanning],
            &[ScannableAdvertising, PassiveScanning],
            &[ConnectableAdvertising, PassiveScanning],
            &[HighDutyCycleDirectedAdvertising, PassiveScanning],
            &[NonConnectableAdvertising, ActiveScanning],
            &[ScannableAdvertising, ActiveScanning],
            &[ConnectableAdvertising, ActiveScanning],
            &[HighDutyCycleDirectedAdvertising, ActiveScanning],
            &[NonConnectableAdvertising, Initiating],
            &[ScannableAdvertising, Initiating],
            &[NonConnectableAdvertising, Central],
            &[ScannableAdvertising, Central],
            &[NonConnectableAdvertising, Peripheral],
            &[ScannableAdvertising, Peripheral],
            &[PassiveScanning, Initiating],
            &[ActiveScanning, Initiating],
            &[PassiveScanning, Central],
            &[ActiveScanning, Central],
            &[PassiveScanning, Peripheral],
            &[ActiveScanning, Peripheral],
            &[Initiating, Central],
            &[LowDutyCycleDirectedAdvertising],
            &[LowDutyCycleDirectedAdvertising, PassiveScanning],
            &[LowDutyCycleDirectedAdvertising, ActiveScanning],
            &[ConnectableAdvertising, Initiating],
            &[HighDutyCycleDirectedAdvertising, Initiating],
            &[LowDutyCycleDirectedAdvertising, Initiating],
            &[ConnectableAdvertising, Central],
            &[HighDutyCycleDirectedAdvertising, Central],
            &[LowDutyCycleDirectedAdvertising, Central],
            &[ConnectableAdvertising, Peripheral],
            &[HighDutyCycleDirectedAdvertising, Peripheral],
            &[LowDutyCycleDirectedAdvertising, Peripheral],
            &[Initiating, Peripheral],
        ]
    };

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Iterates over the supported state combinations.
    pub fn iter(&self) -> impl Iterator<Item = &'static [LeState]> + '_ {
        Self::COMBINATIONS
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & 1 << bit != 0)
            .map(|(_, combo)| *combo)
    }

    /// Returns whether the combination at `bit` is supported.
    pub const fn supports(&self, bit: u32) -> bool {
        bit < 42 && self.0 & 1 << bit != 0
    }
}

impl FromEvent for LeSupportedStates {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.u64().map(Self)
    }
}

// Interval and duration fields use fixed ticks; inputs are rounded to the
// nearest tick and clamped to the field width.

pub(crate) fn ticks_625us(duration: Duration) -> u16 {
    ((duration.as_micros() + 312) / 625).min(u16::MAX as u128) as u16
}

pub(crate) fn ticks_625us_u24(duration: Duration) -> u32 {
    ((duration.as_micros() + 312) / 625).min(0xFF_FFFF) as u32
}

pub(crate) fn ticks_1250us(duration: Duration) -> u16 {
    ((duration.as_micros() + 625) / 1250).min(u16::MAX as u128) as u16
}

pub(crate) fn ticks_10ms(duration: Duration) -> u16 {
    ((duration.as_millis() + 5) / 10).min(u16::MAX as u128) as u16
}

pub(crate) fn ticks_1280ms(duration: Duration) -> u16 {
    ((duration.as_millis() + 640) / 1280).min(u16::MAX as u128) as u16
}

pub(crate) fn whole_seconds(duration: Duration) -> u16 {
    duration.as_secs().min(u16::MAX as u64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversion_round_trips_on_625us_grid() {
        for ms in 20..=10240u64 {
            let ticks = ticks_625us(Duration::from_millis(ms)) as u64;
            // 0.625 ms per tick: ticks * 5 / 8 must round back to ms
            assert_eq!((ticks * 625 + 500) / 1000, ms);
        }
    }

    #[test]
    fn tick_conversion_boundaries() {
        assert_eq!(ticks_625us(Duration::from_millis(20)), 0x0020);
        assert_eq!(ticks_625us(Duration::from_millis(10240)), 0x4000);
        assert_eq!(ticks_10ms(Duration::from_millis(10240)), 1024);
        assert_eq!(ticks_1280ms(Duration::from_millis(1280)), 1);
        assert_eq!(ticks_1280ms(Duration::from_millis(1920)), 2);
    }

    #[test]
    fn connection_interval_ticks() {
        assert_eq!(ticks_1250us(Duration::from_micros(7500)), 6);
        assert_eq!(ticks_1250us(Duration::from_millis(4000)), 3200);
    }

    #[test]
    fn supported_states_decoding() {
        // bit 7: peripheral only; bit 28: initiating + central
        let states = LeSupportedStates(1 << 7 | 1 << 28);
        assert!(states.supports(7));
        assert!(states.supports(28));
        assert!(!states.supports(41));
        let combos: Vec<_> = states.iter().collect();
        assert_eq!(combos, vec![
            &[LeState::Peripheral][..],
            &[LeState::Initiating, LeState::Central][..],
        ]);
    }

    #[test]
    fn reserved_state_bits_are_ignored() {
        let states = LeSupportedStates(1 << 42 | 1 << 63);
        assert_eq!(states.iter().count(), 0);
        assert!(!states.supports(63));
    }

    #[test]
    fn default_channel_map_is_all_channels() {
        assert_eq!(LeAdvertisingChannelMap::default().bits(), 0b0000_0111);
    }
}
