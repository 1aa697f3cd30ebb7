use crate::hci::buffer::ReceiveBuffer;
use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{
    Address, LeCodedPhyOptions, LeEventMask, LeFeatureMask, LePhy, LePhyMask, LeSupportedStates,
};
use crate::hci::events::{EchoedHandle, FromEvent};
use crate::hci::{Error, Hci};

/// LE controller state, PHY, and data-length commands
/// ([Vol 4] Part E, Section 7.8).
impl Hci {
    /// ([Vol 4] Part E, Section 7.8.1).
    pub async fn le_set_event_mask(&self, mask: LeEventMask) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0001), |p| {
            p.put_u64(mask.bits()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.2).
    pub async fn le_read_buffer_size(&self) -> Result<LeBufferSize, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0002)).await
    }

    /// ([Vol 4] Part E, Section 7.8.3).
    pub async fn le_read_local_supported_features(&self) -> Result<LeFeatureMask, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0003)).await
    }

    /// Sets the static or resolvable random address used when the own
    /// address type selects it ([Vol 4] Part E, Section 7.8.4).
    pub async fn le_set_random_address(&self, address: Address) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0005), |p| {
            p.put_slice(address.as_ref()).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.6).
    pub async fn le_read_advertising_channel_tx_power(&self) -> Result<i8, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0007)).await
    }

    /// ([Vol 4] Part E, Section 7.8.27).
    pub async fn le_read_supported_states(&self) -> Result<LeSupportedStates, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x001C)).await
    }

    /// ([Vol 4] Part E, Section 7.8.19).
    pub async fn le_set_host_channel_classification(
        &self,
        channels: [u8; 5],
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0014), |p| {
            p.put_slice(&channels).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.20).
    pub async fn le_read_channel_map(&self, handle: u16) -> Result<LeChannelMap, Error> {
        self.call_for_handle(Opcode::new(OpcodeGroup::Le, 0x0015), handle, |p| {
            p.put_u16(handle).end()
        })
        .await
    }

    /// Suggests per-connection payload sizing to the controller
    /// ([Vol 4] Part E, Section 7.8.33).
    pub async fn le_set_data_length(
        &self,
        handle: u16,
        tx_octets: u16,
        tx_time: u16,
    ) -> Result<(), Error> {
        self.call_for_handle::<EchoedHandle>(Opcode::new(OpcodeGroup::Le, 0x0022), handle, |p| {
            p.put_u16(handle).put_u16(tx_octets).put_u16(tx_time).end()
        })
        .await
        .map(|_| ())
    }

    /// ([Vol 4] Part E, Section 7.8.34).
    pub async fn le_read_suggested_default_data_length(&self) -> Result<LeDataLength, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x0023)).await
    }

    /// ([Vol 4] Part E, Section 7.8.35).
    pub async fn le_write_suggested_default_data_length(
        &self,
        tx_octets: u16,
        tx_time: u16,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0024), |p| {
            p.put_u16(tx_octets).put_u16(tx_time).end()
        })
        .await
    }

    /// ([Vol 4] Part E, Section 7.8.46).
    pub async fn le_read_maximum_data_length(&self) -> Result<LeMaximumDataLength, Error> {
        self.call(Opcode::new(OpcodeGroup::Le, 0x002F)).await
    }

    /// ([Vol 4] Part E, Section 7.8.47).
    pub async fn le_read_phy(&self, handle: u16) -> Result<LePhyReadout, Error> {
        self.call_for_handle(Opcode::new(OpcodeGroup::Le, 0x0030), handle, |p| {
            p.put_u16(handle).end()
        })
        .await
    }

    /// Preferred PHYs for future connections; `None` leaves the choice to
    /// the controller ([Vol 4] Part E, Section 7.8.48).
    pub async fn le_set_default_phy(
        &self,
        tx: Option<LePhyMask>,
        rx: Option<LePhyMask>,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0031), |p| {
            p.put_u8(phy_preference_bits(tx, rx))
                .put_u8(tx.unwrap_or(LePhyMask::empty()).bits())
                .put_u8(rx.unwrap_or(LePhyMask::empty()).bits())
                .end()
        })
        .await
    }

    /// Requests a PHY change on a live connection. Resolves when the
    /// controller accepts; the outcome arrives as a PHY-update event
    /// ([Vol 4] Part E, Section 7.8.49).
    pub async fn le_set_phy(
        &self,
        handle: u16,
        tx: Option<LePhyMask>,
        rx: Option<LePhyMask>,
        options: LeCodedPhyOptions,
    ) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0032), |p| {
            p.put_u16(handle)
                .put_u8(phy_preference_bits(tx, rx))
                .put_u8(tx.unwrap_or(LePhyMask::empty()).bits())
                .put_u8(rx.unwrap_or(LePhyMask::empty()).bits())
                .put_u16(options)
                .end()
        })
        .await
    }

    /// Starts the remote feature exchange. Resolves when the controller
    /// accepts; the features arrive as a remote-features event
    /// ([Vol 4] Part E, Section 7.8.21).
    pub async fn le_read_remote_features(&self, handle: u16) -> Result<(), Error> {
        self.call_with_args(Opcode::new(OpcodeGroup::Le, 0x0016), |p| {
            p.put_u16(handle).end()
        })
        .await
    }
}

// All_PHYs field: bit 0 = no TX preference, bit 1 = no RX preference.
fn phy_preference_bits(tx: Option<LePhyMask>, rx: Option<LePhyMask>) -> u8 {
    u8::from(tx.is_none()) | u8::from(rx.is_none()) << 1
}

/// `LE_Read_Buffer_Size` return parameters. A zero packet length means the
/// controller shares the BR/EDR buffers reported by `Read_Buffer_Size`.
#[derive(Debug, Copy, Clone)]
pub struct LeBufferSize {
    pub le_data_packet_length: u16,
    pub total_num_le_data_packets: u8,
}

impl FromEvent for LeBufferSize {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            le_data_packet_length: buf.u16()?,
            total_num_le_data_packets: buf.u8()?,
        })
    }
}

/// `LE_Read_Channel_Map` return parameters: 37 data channel bits,
/// bit n = channel n, packed little-endian into five bytes.
#[derive(Debug, Copy, Clone)]
pub struct LeChannelMap {
    pub handle: u16,
    pub channels: [u8; 5],
}

impl LeChannelMap {
    pub fn is_used(&self, channel: u8) -> bool {
        channel < 37 && self.channels[usize::from(channel / 8)] & 1 << (channel % 8) != 0
    }
}

impl FromEvent for LeChannelMap {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            channels: buf.bytes()?,
        })
    }
}

/// Suggested default data length.
#[derive(Debug, Copy, Clone)]
pub struct LeDataLength {
    pub tx_octets: u16,
    pub tx_time: u16,
}

impl FromEvent for LeDataLength {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            tx_octets: buf.u16()?,
            tx_time: buf.u16()?,
        })
    }
}

/// `LE_Read_Maximum_Data_Length` return parameters.
#[derive(Debug, Copy, Clone)]
pub struct LeMaximumDataLength {
    pub max_tx_octets: u16,
    pub max_tx_time: u16,
    pub max_rx_octets: u16,
    pub max_rx_time: u16,
}

impl FromEvent for LeMaximumDataLength {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            max_tx_octets: buf.u16()?,
            max_tx_time: buf.u16()?,
            max_rx_octets: buf.u16()?,
            max_rx_time: buf.u16()?,
        })
    }
}

/// `LE_Read_PHY` return parameters.
#[derive(Debug, Copy, Clone)]
pub struct LePhyReadout {
    pub handle: u16,
    pub tx_phy: LePhy,
    pub rx_phy: LePhy,
}

impl FromEvent for LePhyReadout {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            handle: buf.u16()? & 0x0FFF,
            tx_phy: LePhy::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?,
            rx_phy: LePhy::try_from(buf.u8()?).map_err(|_| Error::InvalidPayloadSize)?,
        })
    }
}
