use std::time::Duration;

use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{whole_seconds, Address, AddressKind, LePeerAddressType};
use crate::hci::{Error, Hci};

/// Filter accept list and resolving list maintenance
/// ([Vol 4] Part E, Section 7.8).
impl Hci {
    /// ([Vol 4] Part E, Section 7.8.14).
    pub async fn le_read_filter_accept_list_size(&self) -> Result<u8, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x000F)).await
    }

    /// ([Vol 4] Part E, Section 7.8.15).
    pub async fn le_clear_filter_accept_list(&self) -> Result<(), Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0010)).await
    }

    /// `AddressKind::Anonymous` matches undirected anonymous advertisers
    /// ([Vol 4] Part E, Section 7.8.16).
    pub async fn le_add_device_to_filter_accept_list(
        &self,
        kind: AddressKind,
        address: Address,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0011), |p| {
            p.put_u8(kind).put_slice(address.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.17).
    pub async fn le_remove_device_from_filter_accept_list(
        &self,
        kind: AddressKind,
        address: Address,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0012), |p| {
            p.put_u8(kind).put_slice(address.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.38).
    pub async fn le_add_device_to_resolving_list(
        &self,
        kind: LePeerAddressType,
        identity: Address,
        peer_irk: [u8; 16],
        local_irk: [u8; 16],
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0027), |p| {
            p.put_u8(kind)
                .put_slice(identity.as_ref())
                .put_slice(&peer_irk)
                .put_slice(&local_irk)
                .end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.39).
    pub async fn le_remove_device_from_resolving_list(
        &self,
        kind: LePeerAddressType,
        identity: Address,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0028), |p| {
            p.put_u8(kind).put_slice(identity.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.40).
    pub async fn le_clear_resolving_list(&self) -> Result<(), Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0029)).await
    }

    /// ([Vol 4] Part E, Section 7.8.41).
    pub async fn le_read_resolving_list_size(&self) -> Result<u8, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x002A)).await
    }

    /// ([Vol 4] Part E, Section 7.8.42).
    pub async fn le_read_peer_resolvable_address(
        &self,
        kind: LePeerAddressType,
        identity: Address,
    ) -> Result<Address, Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x002B), |p| {
            p.put_u8(kind).put_slice(identity.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.43).
    pub async fn le_read_local_resolvable_address(
        &self,
        kind: LePeerAddressType,
        identity: Address,
    ) -> Result<Address, Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x002C), |p| {
            p.put_u8(kind).put_slice(identity.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.44).
    pub async fn le_set_address_resolution_enable(&self, enable: bool) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x002D), |p| {
            p.put_u8(u8::from(enable)).end()
        })
        .await
    }

    /// Rotation period for resolvable private addresses, in whole seconds
    /// ([Vol 4] Part E, Section 7.8.45).
    pub async fn le_set_resolvable_private_address_timeout(
        &self,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x002E), |p| {
            p.put_u16(whole_seconds(timeout)).end()
        })
        .await
    }
}
