use crate::hci::buffer::ReceiveBuffer;
use crate::hci::commands::{Opcode, OpcodeGroup};
use crate::hci::consts::{Address, CompanyId, CoreVersion, LmpFeatureMask};
use crate::hci::events::FromEvent;
use crate::hci::{Error, Hci};

/// Informational parameters commands ([Vol 4] Part E, Section 7.4).
impl Hci {
    /// Returns the controller's version information
    /// ([Vol 4] Part E, Section 7.4.1).
    pub async fn read_local_version(&self) -> Result<LocalVersion, Error> {
        self.call(Opcode::new(OpcodeGroup::InfoParams, 0x0001)).await
    }

    /// Returns the controller's supported commands
    /// ([Vol 4] Part E, Section 7.4.2).
    pub async fn read_local_supported_commands(&self) -> Result<SupportedCommands, Error> {
        self.call(Opcode::new(OpcodeGroup::InfoParams, 0x0002)).await
    }

    /// ([Vol 4] Part E, Section 7.4.3).
    pub async fn read_local_supported_features(&self) -> Result<LmpFeatureMask, Error> {
        self.call(Opcode::new(OpcodeGroup::InfoParams, 0x0003)).await
    }

    /// Reads the maximum size of the data packets that the host can send to
    /// the controller ([Vol 4] Part E, Section 7.4.5).
    pub async fn read_buffer_size(&self) -> Result<BufferSizes, Error> {
        self.call(Opcode::new(OpcodeGroup::InfoParams, 0x0005)).await
    }

    /// ([Vol 4] Part E, Section 7.4.6).
    pub async fn read_bd_addr(&self) -> Result<Address, Error> {
        self.call(Opcode::new(OpcodeGroup::InfoParams, 0x0009)).await
    }
}

/// `HCI_Read_Buffer_Size` return parameters
/// ([Vol 4] Part E, Section 7.4.5).
#[derive(Clone, Copy, Debug)]
pub struct BufferSizes {
    pub acl_data_packet_length: u16,
    pub synchronous_data_packet_length: u8,
    pub total_num_acl_data_packets: u16,
    pub total_num_synchronous_data_packets: u16,
}

impl FromEvent for BufferSizes {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            acl_data_packet_length: buf.u16()?,
            synchronous_data_packet_length: buf.u8()?,
            total_num_acl_data_packets: buf.u16()?,
            total_num_synchronous_data_packets: buf.u16()?,
        })
    }
}

/// `HCI_Read_Local_Supported_Commands` return parameter
/// ([Vol 4] Part E, Section 7.4.2).
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
pub struct SupportedCommands([u8; 64]);

impl SupportedCommands {
    /// Tests the bit for one command as indexed by the supported-commands
    /// table ([Vol 4] Part E, Section 6.27).
    pub fn supports(&self, octet: usize, bit: u8) -> bool {
        debug_assert!(bit < 8);
        self.0.get(octet).is_some_and(|o| o & 1 << bit != 0)
    }
}

impl Default for SupportedCommands {
    #[inline(always)]
    fn default() -> Self {
        Self([0; 64])
    }
}

impl FromEvent for SupportedCommands {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        buf.bytes().map(Self)
    }
}

/// `HCI_Read_Local_Version_Information` return parameters
/// ([Vol 4] Part E, Section 7.4.1).
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalVersion {
    pub hci_version: CoreVersion,
    pub hci_subversion: u16,
    pub lmp_version: CoreVersion,
    pub company_id: CompanyId,
    pub lmp_subversion: u16,
}

impl FromEvent for LocalVersion {
    fn unpack(buf: &mut ReceiveBuffer) -> Result<Self, Error> {
        Ok(Self {
            hci_version: buf.u8().map(CoreVersion::from)?,
            hci_subversion: buf.u16()?,
            lmp_version: buf.u8().map(CoreVersion::from)?,
            company_id: buf.u16().map(CompanyId)?,
            lmp_subversion: buf.u16()?,
        })
    }
}
