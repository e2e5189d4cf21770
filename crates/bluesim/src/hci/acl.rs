//! HCI ACL data packets
//!
//! ACL traffic crosses the host boundary as typed packets, but travels
//! over the emulated radio as a serialized HCI ACL view inside a
//! link-layer ACL packet, so both a typed representation and the
//! little-endian wire codec live here.

use crate::error::PacketError;
use crate::hci::types::{BroadcastFlag, PacketBoundaryFlag};
use byteorder::{ByteOrder, LittleEndian};

/// An HCI ACL data packet (header fields plus payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciAclPacket {
    pub handle: u16,
    pub packet_boundary_flag: PacketBoundaryFlag,
    pub broadcast_flag: BroadcastFlag,
    pub payload: Vec<u8>,
}

impl HciAclPacket {
    pub fn new(
        handle: u16,
        packet_boundary_flag: PacketBoundaryFlag,
        broadcast_flag: BroadcastFlag,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            handle,
            packet_boundary_flag,
            broadcast_flag,
            payload,
        }
    }

    /// Serialize to the HCI ACL wire format: a 12-bit handle packed with
    /// the PB and BC flags, a 16-bit payload length, then the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let first = (self.handle & 0x0FFF)
            | (self.packet_boundary_flag.to_bits() << 12)
            | (self.broadcast_flag.to_bits() << 14);
        let mut bytes = Vec::with_capacity(4 + self.payload.len());
        bytes.extend_from_slice(&first.to_le_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse an HCI ACL packet from its wire format
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < 4 {
            return Err(PacketError::Truncated {
                needed: 4,
                got: data.len(),
            });
        }
        let first = LittleEndian::read_u16(&data[0..2]);
        let declared = LittleEndian::read_u16(&data[2..4]) as usize;
        let payload = &data[4..];
        if payload.len() != declared {
            return Err(PacketError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        Ok(Self {
            handle: first & 0x0FFF,
            packet_boundary_flag: PacketBoundaryFlag::from_bits(first >> 12),
            broadcast_flag: BroadcastFlag::from_bits(first >> 14),
            payload: payload.to_vec(),
        })
    }
}
