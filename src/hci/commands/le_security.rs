use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::events::EchoedHandle;
use crate::hci::{Error, Hci};

/// Encryption plumbing ([Vol 4] Part E, Section 7.8). Key agreement and
/// pairing live above this crate; these commands only ferry opaque
/// cryptographic material between the host stack and the controller.
impl Hci {
    /// AES-128 encryption of one block in the controller
    /// ([Vol 4] Part E, Section 7.8.22).
    pub async fn le_encrypt(&self, key: [u8; 16], plaintext: [u8; 16]) -> Result<[u8; 16], Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0017), |p| {
            p.put_slice(&key).put_slice(&plaintext).end()
        })
        .await
    }

    /// Eight random bytes from the controller
    /// ([Vol 4] Part E, Section 7.8.23).
    pub async fn le_rand(&self) -> Result<u64, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0018)).await
    }

    /// Starts (or restarts) link encryption as the central. Resolves when
    /// the controller accepts; the result arrives as an encryption-change
    /// event ([Vol 4] Part E, Section 7.8.24).
    pub async fn le_enable_encryption(
        &self,
        handle: u16,
        random: u64,
        ediv: u16,
        ltk: [u8; 16],
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0019), |p| {
            p.put_u16(handle)
                .put_u64(random)
                .put_u16(ediv)
                .put_slice(&ltk)
                .end()
        })
        .await
    }

    /// Answers a long-term-key request ([Vol 4] Part E, Section 7.8.25).
    pub async fn le_long_term_key_request_reply(
        &self,
        handle: u16,
        ltk: [u8; 16],
    ) -> Result<(), Error> {
        self.call_for_handle::<EchoedHandle>(Opcode::new(OpcodeGroup::Le, 0x001A), handle, |p| {
            p.put_u16(handle).put_slice(&ltk).end()
        })
        .await
        .map(|_| ())
    }

    /// Declines a long-term-key request; the peer sees the encryption
    /// attempt fail ([Vol 4] Part E, Section 7.8.26).
    pub async fn le_long_term_key_request_negative_reply(
        &self,
        handle: u16,
    ) -> Result<(), Error> {
        self.call_for_handle::<EchoedHandle>(Opcode::new(OpcodeGroup::Le, 0x001B), handle, |p| {
            p.put_u16(handle).end()
        })
        .await
        .map(|_| ())
    }
}
