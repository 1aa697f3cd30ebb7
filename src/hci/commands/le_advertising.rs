use std::time::Duration;

use crate::ensure;
use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{
    ticks_10ms, ticks_625us, ticks_625us_u24, Address, AdvertisingDataOperation,
    AdvertisingEventProperties, AdvertisingFilterPolicy, AdvertisingHandle,
    LeAdvertisingChannelMap, LeAdvertisingType, LeOwnAddressType, LePeerAddressType,
    LePrimaryAdvertisingPhy, LeSecondaryAdvertisingPhy, TX_POWER_NO_PREFERENCE,
};
use crate::hci::{Error, Hci, SendBuffer};

/// Parameters of `LE_Set_Advertising_Parameters`
/// ([Vol 4] Part E, Section 7.8.5). Intervals are rounded to 0.625 ms ticks.
#[derive(Debug, Clone)]
pub struct AdvertisingParameters {
    pub interval_min: Duration,
    pub interval_max: Duration,
    pub kind: LeAdvertisingType,
    pub own_address_type: LeOwnAddressType,
    pub peer_address_type: LePeerAddressType,
    pub peer_address: Address,
    pub channel_map: LeAdvertisingChannelMap,
    pub filter_policy: AdvertisingFilterPolicy,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            interval_min: Duration::from_millis(1280),
            interval_max: Duration::from_millis(1280),
            kind: LeAdvertisingType::default(),
            own_address_type: LeOwnAddressType::default(),
            peer_address_type: LePeerAddressType::default(),
            peer_address: Address::ZERO,
            channel_map: LeAdvertisingChannelMap::default(),
            filter_policy: AdvertisingFilterPolicy::default(),
        }
    }
}

/// Parameters of `LE_Set_Extended_Advertising_Parameters`
/// ([Vol 4] Part E, Section 7.8.53).
#[derive(Debug, Clone)]
pub struct ExtendedAdvertisingParameters {
    pub properties: AdvertisingEventProperties,
    /// Rounded to 0.625 ms ticks, three bytes wide.
    pub primary_interval_min: Duration,
    pub primary_interval_max: Duration,
    pub primary_channel_map: LeAdvertisingChannelMap,
    pub own_address_type: LeOwnAddressType,
    pub peer_address_type: LePeerAddressType,
    pub peer_address: Address,
    pub filter_policy: AdvertisingFilterPolicy,
    /// dBm; `None` encodes the 0x7F no-preference sentinel.
    pub tx_power: Option<i8>,
    pub primary_phy: LePrimaryAdvertisingPhy,
    pub secondary_max_skip: u8,
    pub secondary_phy: LeSecondaryAdvertisingPhy,
    pub sid: u8,
    pub scan_request_notification: bool,
}

impl Default for ExtendedAdvertisingParameters {
    fn default() -> Self {
        Self {
            properties: AdvertisingEventProperties::CONNECTABLE
                | AdvertisingEventProperties::SCANNABLE
                | AdvertisingEventProperties::LEGACY,
            primary_interval_min: Duration::from_millis(1280),
            primary_interval_max: Duration::from_millis(1280),
            primary_channel_map: LeAdvertisingChannelMap::default(),
            own_address_type: LeOwnAddressType::default(),
            peer_address_type: LePeerAddressType::default(),
            peer_address: Address::ZERO,
            filter_policy: AdvertisingFilterPolicy::default(),
            tx_power: None,
            primary_phy: LePrimaryAdvertisingPhy::default(),
            secondary_max_skip: 0,
            secondary_phy: LeSecondaryAdvertisingPhy::default(),
            sid: 0,
            scan_request_notification: false,
        }
    }
}

/// One advertising set of `LE_Set_Extended_Advertising_Enable`.
#[derive(Debug, Copy, Clone)]
pub struct AdvertisingSetEnable {
    pub handle: AdvertisingHandle,
    /// Rounded to 10 ms ticks; zero advertises until disabled.
    pub duration: Duration,
    /// Zero means no event limit.
    pub max_events: u8,
}

/// Legacy and extended advertising commands
/// ([Vol 4] Part E, Section 7.8).
impl Hci {
    /// ([Vol 4] Part E, Section 7.8.5).
    pub async fn le_set_advertising_parameters(
        &self,
        params: &AdvertisingParameters,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0006), |p| {
            p.put_u16(ticks_625us(params.interval_min))
                .put_u16(ticks_625us(params.interval_max))
                .put_u8(params.kind)
                .put_u8(params.own_address_type)
                .put_u8(params.peer_address_type)
                .put_slice(params.peer_address.as_ref())
                .put_u8(params.channel_map.bits())
                .put_u8(params.filter_policy)
                .end()
        })
        .await
    }

    /// Legacy advertising data, at most 31 significant bytes; the block is
    /// zero-padded on the wire ([Vol 4] Part E, Section 7.8.7).
    pub async fn le_set_advertising_data(&self, data: &[u8]) -> Result<(), Error> {
        ensure!(data.len() <= 31, Error::AdvertisingDataTooLong);
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0008), |p| {
            put_padded_data_block(p, data)
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.8).
    pub async fn le_set_scan_response_data(&self, data: &[u8]) -> Result<(), Error> {
        ensure!(data.len() <= 31, Error::AdvertisingDataTooLong);
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0009), |p| {
            put_padded_data_block(p, data)
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.9).
    pub async fn le_set_advertising_enable(&self, enable: bool) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x000A), |p| {
            p.put_u8(u8::from(enable)).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.52).
    pub async fn le_set_advertising_set_random_address(
        &self,
        handle: AdvertisingHandle,
        address: Address,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0035), |p| {
            p.put_u8(handle).put_slice(address.as_ref()).end()
        })
        .await
    }

    /// Returns the TX power the controller selected for the set
    /// ([Vol 4] Part E, Section 7.8.53).
    pub async fn le_set_extended_advertising_parameters(
        &self,
        handle: AdvertisingHandle,
        params: &ExtendedAdvertisingParameters,
    ) -> Result<i8, Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0036), |p| {
            p.put_u8(handle)
                .put_u16(params.properties.bits())
                .put_u24(ticks_625us_u24(params.primary_interval_min))
                .put_u24(ticks_625us_u24(params.primary_interval_max))
                .put_u8(params.primary_channel_map.bits())
                .put_u8(params.own_address_type)
                .put_u8(params.peer_address_type)
                .put_slice(params.peer_address.as_ref())
                .put_u8(params.filter_policy)
                .put_i8(params.tx_power.unwrap_or(TX_POWER_NO_PREFERENCE))
                .put_u8(params.primary_phy)
                .put_u8(params.secondary_max_skip)
                .put_u8(params.secondary_phy)
                .put_u8(params.sid)
                .put_u8(u8::from(params.scan_request_notification))
                .end()
        })
        .await
    }

    /// One fragment of extended advertising data. `fragment` grants the
    /// controller permission to fragment further over the air
    /// ([Vol 4] Part E, Section 7.8.54).
    pub async fn le_set_extended_advertising_data(
        &self,
        handle: AdvertisingHandle,
        operation: AdvertisingDataOperation,
        fragment: bool,
        data: &[u8],
    ) -> Result<(), Error> {
        ensure!(data.len() <= 251, Error::PayloadTooLarge);
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0037), |p| {
            put_extended_data_fragment(p, handle, operation, fragment, data)
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.55).
    pub async fn le_set_extended_scan_response_data(
        &self,
        handle: AdvertisingHandle,
        operation: AdvertisingDataOperation,
        fragment: bool,
        data: &[u8],
    ) -> Result<(), Error> {
        ensure!(data.len() <= 251, Error::PayloadTooLarge);
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0038), |p| {
            put_extended_data_fragment(p, handle, operation, fragment, data)
        })
        .await
    }

    /// Enables or disables a batch of advertising sets. The per-set fields
    /// are written as grouped arrays: all handles, then all durations,
    /// then all event limits ([Vol 4] Part E, Section 7.8.56).
    pub async fn le_set_extended_advertising_enable(
        &self,
        enable: bool,
        sets: &[AdvertisingSetEnable],
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0039), |p| {
            p.put_u8(u8::from(enable));
            p.put_u8(sets.len() as u8);
            for set in sets {
                p.put_u8(set.handle);
            }
            for set in sets {
                p.put_u16(ticks_10ms(set.duration));
            }
            for set in sets {
                p.put_u8(set.max_events);
            }
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.57).
    pub async fn le_read_maximum_advertising_data_length(&self) -> Result<u16, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x003A)).await
    }

    /// ([Vol 4] Part E, Section 7.8.58).
    pub async fn le_read_number_of_supported_advertising_sets(&self) -> Result<u8, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x003B)).await
    }

    /// ([Vol 4] Part E, Section 7.8.59).
    pub async fn le_remove_advertising_set(&self, handle: AdvertisingHandle) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x003C), |p| {
            p.put_u8(handle).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.60).
    pub async fn le_clear_advertising_sets(&self) -> Result<(), Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x003D)).await
    }
}

// Legacy data blocks are fixed 32 bytes: significant length + padding.
fn put_padded_data_block(p: &mut SendBuffer, data: &[u8]) {
    p.put_u8(data.len() as u8)
        .put_slice(data)
        .put_bytes(0, 31 - data.len());
}

fn put_extended_data_fragment(
    p: &mut SendBuffer,
    handle: AdvertisingHandle,
    operation: AdvertisingDataOperation,
    fragment: bool,
    data: &[u8],
) {
    p.put_u8(handle)
        .put_u8(operation)
        // 0x00 = controller may fragment, 0x01 = it shall not
        .put_u8(u8::from(!fragment))
        .put_u8(data.len() as u8)
        .put_slice(data);
}
