use std::time::Duration;

use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{
    ticks_10ms, ticks_1280ms, ticks_625us, LeOwnAddressType, LeScanFilterDuplicates, LeScanType,
    LeScanningPhys, ScanningFilterPolicy,
};
use crate::hci::{Error, Hci};

/// Parameters of `LE_Set_Scan_Parameters`
/// ([Vol 4] Part E, Section 7.8.10). Interval and window are rounded to
/// 0.625 ms ticks.
#[derive(Debug, Clone)]
pub struct ScanParameters {
    pub kind: LeScanType,
    pub interval: Duration,
    pub window: Duration,
    pub own_address_type: LeOwnAddressType,
    pub filter_policy: ScanningFilterPolicy,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            kind: LeScanType::default(),
            interval: Duration::from_millis(10),
            window: Duration::from_millis(10),
            own_address_type: LeOwnAddressType::default(),
            filter_policy: ScanningFilterPolicy::default(),
        }
    }
}

/// Per-PHY block of `LE_Set_Extended_Scan_Parameters`.
#[derive(Debug, Clone)]
pub struct ExtendedScanConfig {
    pub kind: LeScanType,
    pub interval: Duration,
    pub window: Duration,
}

/// Scanning commands ([Vol 4] Part E, Section 7.8).
impl Hci {
    /// ([Vol 4] Part E, Section 7.8.10).
    pub async fn le_set_scan_parameters(&self, params: &ScanParameters) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x000B), |p| {
            p.put_u8(params.kind)
                .put_u16(ticks_625us(params.interval))
                .put_u16(ticks_625us(params.window))
                .put_u8(params.own_address_type)
                .put_u8(params.filter_policy)
                .end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.11).
    pub async fn le_set_scan_enable(
        &self,
        enable: bool,
        filter_duplicates: bool,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x000C), |p| {
            p.put_u8(u8::from(enable))
                .put_u8(u8::from(filter_duplicates))
                .end()
        })
        .await
    }

    /// Configures scanning on the 1M and/or Coded PHY. The per-PHY blocks
    /// are written as grouped arrays in ascending PHY order: all scan
    /// types, then all intervals, then all windows
    /// ([Vol 4] Part E, Section 7.8.64).
    pub async fn le_set_extended_scan_parameters(
        &self,
        own_address_type: LeOwnAddressType,
        filter_policy: ScanningFilterPolicy,
        one_m: Option<&ExtendedScanConfig>,
        coded: Option<&ExtendedScanConfig>,
    ) -> Result<(), Error> {
        let mut phys = LeScanningPhys::empty();
        if one_m.is_some() {
            phys |= LeScanningPhys::LE_1M;
        }
        if coded.is_some() {
            phys |= LeScanningPhys::LE_CODED;
        }
        let selected = [one_m, coded];
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0041), |p| {
            p.put_u8(own_address_type)
                .put_u8(filter_policy)
                .put_u8(phys.bits());
            for config in selected.iter().flatten() {
                p.put_u8(config.kind);
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.interval));
            }
            for config in selected.iter().flatten() {
                p.put_u16(ticks_625us(config.window));
            }
        })
        .await
    }

    /// `duration` is rounded to 10 ms ticks, `period` to 1.28 s ticks;
    /// zero means unlimited ([Vol 4] Part E, Section 7.8.65).
    pub async fn le_set_extended_scan_enable(
        &self,
        enable: bool,
        filter_duplicates: LeScanFilterDuplicates,
        duration: Duration,
        period: Duration,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0042), |p| {
            p.put_u8(u8::from(enable))
                .put_u8(filter_duplicates)
                .put_u16(ticks_10ms(duration))
                .put_u16(ticks_1280ms(period))
                .end()
        })
        .await
    }
}
