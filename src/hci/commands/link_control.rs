use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::Status;
use crate::hci::{Error, Hci};

/// Link control commands ([Vol 4] Part E, Section 7.1).
impl Hci {
    /// Terminates the connection. The call resolves when the controller
    /// accepts the command; the link is gone once the corresponding
    /// disconnection event arrives ([Vol 4] Part E, Section 7.1.6).
    pub async fn disconnect(&self, handle: u16, reason: Status) -> Result<(), Error> {
        assert!(matches!(
            reason,
            Status::AuthenticationFailure
                | Status::RemoteUserTerminatedConnection
                | Status::RemoteDeviceTerminatedConnectionDueToLowResources
                | Status::RemoteDeviceTerminatedConnectionDueToPowerOff
                | Status::UnsupportedRemoteFeature
                | Status::PairingWithUnitKeyNotSupported
                | Status::UnacceptableConnectionParameters
        ));
        self.call_with_args(Opcode::new(OpcodeGroup::LinkControl, 0x0006), |p| {
            p.put_u16(handle).put_u8(reason).end()
        })
        .await
    }
}
