use bytes::{Buf, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::hci::Error;

/// Packet-type indicators of the UART transport layer ([Vol 4] Part A,
/// Section 2). The tag precedes every HCI packet because command, ACL, and
/// event traffic share one byte stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    AclData = 0x02,
    Event = 0x04,
}

/// One complete HCI packet with the type tag stripped.
#[derive(Debug, Clone)]
pub(crate) struct HciPacket {
    pub kind: PacketType,
    pub data: Bytes,
}

/// Buffers the inbound byte stream and pops complete packets.
///
/// Header sizes per type: event 2 bytes (code, len8), ACL 4 bytes (handle
/// and flags, len16), command 3 bytes (opcode, len8). HCI has no framing
/// mark, so an unrecognized tag means the stream is desynchronized beyond
/// repair and the transport must be closed.
#[derive(Default)]
pub(crate) struct PacketAssembler {
    buffer: BytesMut,
}

impl PacketAssembler {
    pub fn buffer(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    #[cfg(test)]
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn pop(&mut self) -> Result<Option<HciPacket>, Error> {
        let Some(&tag) = self.buffer.first() else {
            return Ok(None);
        };
        let kind = PacketType::try_from(tag).map_err(|_| Error::UnknownPacketType(tag))?;
        let header_len = match kind {
            PacketType::Command => 3,
            PacketType::AclData => 4,
            PacketType::Event => 2,
        };
        if self.buffer.len() < 1 + header_len {
            return Ok(None);
        }
        let payload_len = match kind {
            PacketType::Command => self.buffer[3] as usize,
            PacketType::AclData => u16::from_le_bytes([self.buffer[3], self.buffer[4]]) as usize,
            PacketType::Event => self.buffer[2] as usize,
        };
        let total = 1 + header_len + payload_len;
        if self.buffer.len() < total {
            return Ok(None);
        }
        let mut packet = self.buffer.split_to(total);
        packet.advance(1);
        Ok(Some(HciPacket {
            kind,
            data: packet.freeze(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_packet_single_feed() {
        let mut asm = PacketAssembler::default();
        asm.push(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
        let packet = asm.pop().unwrap().unwrap();
        assert_eq!(packet.kind, PacketType::Event);
        assert_eq!(&packet.data[..], &[0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
        assert!(asm.pop().unwrap().is_none());
    }

    #[test]
    fn event_packet_byte_by_byte() {
        let mut asm = PacketAssembler::default();
        for &b in &[0x04u8, 0x3E, 0x02, 0xAA, 0xBB] {
            assert!(asm.pop().unwrap().is_none());
            asm.push(&[b]);
        }
        let packet = asm.pop().unwrap().unwrap();
        assert_eq!(&packet.data[..], &[0x3E, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn acl_packet_length_u16() {
        let mut asm = PacketAssembler::default();
        asm.push(&[0x02, 0x0A, 0x00, 0x02, 0x00, 0x11, 0x22]);
        let packet = asm.pop().unwrap().unwrap();
        assert_eq!(packet.kind, PacketType::AclData);
        assert_eq!(&packet.data[..], &[0x0A, 0x00, 0x02, 0x00, 0x11, 0x22]);
    }

    #[test]
    fn two_packets_in_one_feed() {
        let mut asm = PacketAssembler::default();
        asm.push(&[0x04, 0x13, 0x01, 0x00, 0x04, 0x10, 0x01, 0x05]);
        assert_eq!(&asm.pop().unwrap().unwrap().data[..], &[0x13, 0x01, 0x00]);
        assert_eq!(&asm.pop().unwrap().unwrap().data[..], &[0x10, 0x01, 0x05]);
        assert!(asm.pop().unwrap().is_none());
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let mut asm = PacketAssembler::default();
        asm.push(&[0x07, 0x00]);
        assert!(matches!(asm.pop(), Err(Error::UnknownPacketType(0x07))));
    }
}
