use bytes::{Buf, Bytes};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ensure;
use crate::hci::buffer::SendBuffer;
use crate::hci::packet::PacketType;
use crate::hci::Error;

/// Packet boundary flag ([Vol 4] Part E, Section 5.4.2).
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BoundaryFlag {
    FirstNoFlush = 0b00,
    NextFragment = 0b01,
    FirstAutoFlush = 0b10,
    Complete = 0b11,
}

/// Broadcast flag ([Vol 4] Part E, Section 5.4.2).
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BroadcastFlag {
    PointToPoint = 0b00,
    Broadcast = 0b01,
}

/// One ACL data packet. The 12-bit connection handle shares its u16 with
/// the boundary and broadcast flags: `handle[0:12] | pb[12:14] | bc[14:16]`.
#[derive(Debug, Clone)]
pub struct AclDataPacket {
    pub handle: u16,
    pub pb: BoundaryFlag,
    pub bc: BroadcastFlag,
    pub data: Bytes,
}

impl AclDataPacket {
    pub(crate) fn write_to(&self, buf: &mut SendBuffer) -> Result<(), Error> {
        ensure!(self.data.len() <= u16::MAX as usize, Error::PayloadTooLarge);
        let header = (self.handle & 0x0FFF)
            | u16::from(u8::from(self.pb)) << 12
            | u16::from(u8::from(self.bc)) << 14;
        buf.put_u8(PacketType::AclData)
            .put_u16(header)
            .put_u16(self.data.len() as u16)
            .put_slice(&self.data);
        Ok(())
    }

    pub(crate) fn from_bytes(mut data: Bytes) -> Result<Self, Error> {
        ensure!(data.len() >= 4, Error::InvalidPayloadSize);
        let header = u16::from_le_bytes([data[0], data[1]]);
        let length = u16::from_le_bytes([data[2], data[3]]) as usize;
        data.advance(4);
        ensure!(data.len() == length, Error::InvalidPayloadSize);
        Ok(Self {
            handle: header & 0x0FFF,
            pb: BoundaryFlag::try_from((header >> 12 & 0b11) as u8)
                .map_err(|_| Error::InvalidPayloadSize)?,
            bc: BroadcastFlag::try_from((header >> 14 & 0b11) as u8)
                .map_err(|_| Error::InvalidPayloadSize)?,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bit_packing() {
        let packet = AclDataPacket {
            handle: 0x0ABC,
            pb: BoundaryFlag::FirstAutoFlush,
            bc: BroadcastFlag::PointToPoint,
            data: Bytes::from_static(&[0xDE, 0xAD]),
        };
        let mut buf = SendBuffer::default();
        packet.write_to(&mut buf).unwrap();
        assert_eq!(buf.data(), &[0x02, 0xBC, 0x2A, 0x02, 0x00, 0xDE, 0xAD]);
    }

    #[test]
    fn round_trip() {
        let packet = AclDataPacket {
            handle: 0x0040,
            pb: BoundaryFlag::NextFragment,
            bc: BroadcastFlag::Broadcast,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let mut buf = SendBuffer::default();
        packet.write_to(&mut buf).unwrap();
        let parsed = AclDataPacket::from_bytes(Bytes::copy_from_slice(&buf.data()[1..])).unwrap();
        assert_eq!(parsed.handle, 0x0040);
        assert_eq!(parsed.pb, BoundaryFlag::NextFragment);
        assert_eq!(parsed.bc, BroadcastFlag::Broadcast);
        assert_eq!(&parsed.data[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn length_mismatch_rejected() {
        let bytes = Bytes::from_static(&[0x40, 0x00, 0x05, 0x00, 0x01]);
        assert!(matches!(
            AclDataPacket::from_bytes(bytes),
            Err(Error::InvalidPayloadSize)
        ));
    }
}
