//! Core HCI types shared across the controller

use crate::hci::constants::*;
use std::fmt;

/// A 48-bit Bluetooth device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// The all-zero address, used as the broadcast destination on the
    /// emulated radio
    pub const EMPTY: BdAddr = BdAddr { bytes: [0; 6] };

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Address type attached to an LE device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

/// A device address together with its address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressWithType {
    pub address: BdAddr,
    pub address_type: AddressType,
}

impl AddressWithType {
    pub const fn new(address: BdAddr, address_type: AddressType) -> Self {
        Self {
            address,
            address_type,
        }
    }
}

impl fmt::Display for AddressWithType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.address_type)
    }
}

/// Own-address selection for LE advertising and initiating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnAddressType {
    #[default]
    PublicDevice,
    RandomDevice,
    ResolvableOrPublic,
    ResolvableOrRandom,
}

impl From<u8> for OwnAddressType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => OwnAddressType::PublicDevice,
            0x01 => OwnAddressType::RandomDevice,
            0x02 => OwnAddressType::ResolvableOrPublic,
            0x03 => OwnAddressType::ResolvableOrRandom,
            _ => OwnAddressType::PublicDevice,
        }
    }
}

/// Connection role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl From<Role> for u8 {
    fn from(value: Role) -> Self {
        match value {
            Role::Master => 0x00,
            Role::Slave => 0x01,
        }
    }
}

/// Link type reported in connection events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Sco,
    Acl,
}

/// Packet boundary flag on ACL data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketBoundaryFlag {
    FirstNonAutomaticallyFlushable,
    ContinuingFragment,
    FirstAutomaticallyFlushable,
    CompleteLlDataPdu,
}

impl PacketBoundaryFlag {
    pub fn to_bits(self) -> u16 {
        match self {
            PacketBoundaryFlag::FirstNonAutomaticallyFlushable => 0b00,
            PacketBoundaryFlag::ContinuingFragment => 0b01,
            PacketBoundaryFlag::FirstAutomaticallyFlushable => 0b10,
            PacketBoundaryFlag::CompleteLlDataPdu => 0b11,
        }
    }

    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => PacketBoundaryFlag::FirstNonAutomaticallyFlushable,
            0b01 => PacketBoundaryFlag::ContinuingFragment,
            0b10 => PacketBoundaryFlag::FirstAutomaticallyFlushable,
            _ => PacketBoundaryFlag::CompleteLlDataPdu,
        }
    }
}

/// Broadcast flag on ACL data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastFlag {
    PointToPoint,
    ActiveSlaveBroadcast,
    PiconetBroadcast,
}

impl BroadcastFlag {
    pub fn to_bits(self) -> u16 {
        match self {
            BroadcastFlag::PointToPoint => 0b00,
            BroadcastFlag::ActiveSlaveBroadcast => 0b01,
            BroadcastFlag::PiconetBroadcast => 0b10,
        }
    }

    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => BroadcastFlag::ActiveSlaveBroadcast,
            0b10 => BroadcastFlag::PiconetBroadcast,
            _ => BroadcastFlag::PointToPoint,
        }
    }
}
