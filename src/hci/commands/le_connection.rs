use std::time::Duration;

use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{
    ticks_10ms, ticks_1250us, ticks_625us, Address, AddressKind, InitiatorFilterPolicy,
    LeOwnAddressType, LePhyMask,
};
use crate::hci::{Error, Hci, SendBuffer};

/// Connection timing shared by the create-connection and connection-update
/// commands. Intervals are rounded to 1.25 ms ticks, the supervision
/// timeout to 10 ms ticks, and CE lengths to 0.625 ms ticks.
#[derive(Debug, Clone)]
pub struct ConnectionInterval {
    pub interval_min: Duration,
    pub interval_max: Duration,
    /// Peripheral latency in connection events.
    pub latency: u16,
    pub supervision_timeout: Duration,
    pub ce_length_min: Duration,
    pub ce_length_max: Duration,
}

impl Default for ConnectionInterval {
    fn default() -> Self {
        Self {
            interval_min: Duration::from_micros(30_000),
            interval_max: Duration::from_micros(50_000),
            latency: 0,
            supervision_timeout: Duration::from_millis(4000),
            ce_length_min: Duration::ZERO,
            ce_length_max: Duration::ZERO,
        }
    }
}

impl ConnectionInterval {
    fn write_to(&self, p: &mut SendBuffer) {
        p.put_u16(ticks_1250us(self.interval_min))
            .put_u16(ticks_1250us(self.interval_max))
            .put_u16(self.latency)
            .put_u16(ticks_10ms(self.supervision_timeout))
            .put_u16(ticks_625us(self.ce_length_min))
            .put_u16(ticks_625us(self.ce_length_max));
    }
}

/// Parameters of `LE_Create_Connection`
/// ([Vol 4] Part E, Section 7.8.12).
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    pub scan_interval: Duration,
    pub scan_window: Duration,
    pub filter_policy: InitiatorFilterPolicy,
    /// Ignored when connecting from the filter accept list.
    pub peer_address_type: AddressKind,
    pub peer_address: Address,
    pub own_address_type: LeOwnAddressType,
    pub timing: ConnectionInterval,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(60),
            scan_window: Duration::from_millis(30),
            filter_policy: InitiatorFilterPolicy::default(),
            peer_address_type: AddressKind::Public,
            peer_address: Address::ZERO,
            own_address_type: LeOwnAddressType::default(),
            timing: ConnectionInterval::default(),
        }
    }
}

/// Per-PHY block of `LE_Extended_Create_Connection`.
#[derive(Debug, Clone, Default)]
pub struct PhyConnectionConfig {
    pub scan_interval: Duration,
    pub scan_window: Duration,
    pub timing: ConnectionInterval,
}

/// Connection establishment and maintenance
/// ([Vol 4] Part E, Section 7.8).
impl Hci {
    /// Starts initiating. Resolves when the controller accepts; the link
    /// (or failure) arrives as a connection event
    /// ([Vol 4] Part E, Section 7.8.12).
    pub async fn le_create_connection(&self, params: &ConnectionParameters) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x000D), |p| {
            p.put_u16(ticks_625us(params.scan_interval))
                .put_u16(ticks_625us(params.scan_window))
                .put_u8(params.filter_policy)
                .put_u8(params.peer_address_type)
                .put_slice(params.peer_address.as_ref())
                .put_u8(params.own_address_type);
            params.timing.write_to(p);
        })
        .await
    }

    /// Aborts a pending `le_create_connection`. The cancelled attempt still
    /// produces a connection event with status `UnknownConnectionIdentifier`
    /// ([Vol 4] Part E, Section 7.8.13).
    pub async fn le_create_connection_cancel(&self) -> Result<(), Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x000E)).await
    }

    /// Initiates on one or more PHYs. Per-PHY blocks are written as grouped
    /// arrays in ascending PHY order, 1M then 2M then Coded
    /// ([Vol 4] Part E, Section 7.8.66).
    pub async fn le_extended_create_connection(
        &self,
        filter_policy: InitiatorFilterPolicy,
        own_address_type: LeOwnAddressType,
        peer_address_type: AddressKind,
        peer_address: Address,
        one_m: Option<&PhyConnectionConfig>,
        two_m: Option<&PhyConnectionConfig>,
        coded: Option<&PhyConnectionConfig>,
    ) -> Result<(), Error> {
        let mut phys = LePhyMask::empty();
        if one_m.is_some() {
            phys |= LePhyMask::LE_1M;
        }
        if two_m.is_some() {
            phys |= LePhyMask::LE_2M;
        }
        if coded.is_some() {
            phys |= LePhyMask::LE_CODED;
        }
        let selected = [one_m, two_m, coded];
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0043), |p| {
            p.put_u8(filter_policy)
                .put_u8(own_address_type)
                .put_u8(peer_address_type)
                .put_slice(peer_address.as_ref())
                .put_u8(phys.bits());
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.scan_interval));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.scan_window));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_1250us(config.timing.interval_min));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_1250us(config.timing.interval_max));
            }
            for config in selected.iter().flatten() {
                p.put_u16(config.timing.latency);
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_10ms(config.timing.supervision_timeout));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.timing.ce_length_min));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.timing.ce_length_max));
            }
        })
        .await
    }

    /// Renegotiates connection timing. Resolves when the controller
    /// accepts; the outcome arrives as a connection-update event
    /// ([Vol 4] Part E, Section 7.8.18).
    pub async fn le_connection_update(
        &self,
        handle: u16,
        timing: &ConnectionInterval,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0013), |p| {
            p.put_u16(handle);
            timing.write_to(p);
        })
        .await
    }
}
