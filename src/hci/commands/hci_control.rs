use num_enum::IntoPrimitive;

use crate::hci::buffer::ReceiveBuffer;
use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::EventMask;
use crate::hci::events::FromEvent;
use crate::hci::{Error, Hci};

/// Controller and baseband commands ([Vol 4] Part E, Section 7.3).
impl Hci {
    /// ([Vol 4] Part E, Section 7.3.1).
    pub async fn set_event_mask(&self, mask: EventMask) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::HciControl, 0x0001), |p| {
            p.put_u64(mask.bits()).end()
        })
        .await
    }

    /// Resets the controller's link manager, baseband, and link layer.
    /// Every connection handle and subscription is void afterwards; the
    /// host re-issues its event masks and buffer-size queries
    /// ([Vol 4] Part E, Section 7.3.2).
    pub async fn reset(&self) -> Result<(), Error> {
        self.call(Opcode::RESET).await
    }

    /// ([Vol 4] Part E, Section 7.3.35).
    pub async fn read_transmit_power_level(
        &self,
        handle: u16,
        kind: TxPowerLevelKind,
    ) -> Result<TransmitPowerLevel, Error> {
        self.call_for_handle(Opcode::new(OpcodeGroup::HciControl, 0x002D), handle, |p| {
            p.put_u16(handle).put_u8(kind).end()
        })
        .await
    }

    /// Announces LE support to the controller
    /// ([Vol 4] Part E, Section 7.3.79).
    pub async fn write_le_host_support(&self, enabled: bool) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::HciControl, 0x006D), |p| {
            // the simultaneous-LE byte is historical and always zero
            p.put_u8(u8::from(enabled)).put_u8(0u8).end()
        })
        .await
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum TxPowerLevelKind {
    Current = 0x00,
    Maximum = 0x01,
}

/// `HCI_Read_Transmit_Power_Level` return parameters.
#[derive(Debug, Copy, Clone)]
pub struct TransmitPowerLevel {
    pub handle: u16,
    /// dBm, -30..=20.
    pub level: i8,
}

impl FromEvent for TransmitPowerLevel {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            level: buf.i8()?,
        })
    }
}
