use crate::hci::buffer::ReceiveBuffer;
use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::events::FromEvent;
use crate::hci::{Error, Hci};

/// Status parameters commands ([Vol 4] Part E, Section 7.5).
impl Hci {
    /// ([Vol 4] Part E, Section 7.5.4).
    pub async fn read_rssi(&self, handle: u16) -> Result<Rssi, Error> {
        self.call_for_handle(Opcode::new(OpcodeGroup::StatusParams, 0x0005), handle, |p| {
            p.put_u16(handle).end()
        })
        .await
    }
}

/// `HCI_Read_RSSI` return parameters. On an LE link the value is an
/// absolute RSSI in dBm, 127 when unavailable.
#[derive(Debug, Copy, Clone)]
pub struct Rssi {
    pub handle: u16,
    pub rssi: i8,
}

impl FromEvent for Rssi {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            rssi: buf.i8()?,
        })
    }
}
