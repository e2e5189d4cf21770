//! Security manager
//!
//! Tracks the single in-flight authentication, the IO capabilities
//! exchanged during secure simple pairing, and the link-key store.
//! Concurrent authentications are not supported: a new request
//! replaces the previous context.

use crate::hci::types::BdAddr;
use std::collections::HashMap;

/// IO capability advertised during secure simple pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
}

impl IoCapability {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(IoCapability::DisplayOnly),
            0x01 => Some(IoCapability::DisplayYesNo),
            0x02 => Some(IoCapability::KeyboardOnly),
            0x03 => Some(IoCapability::NoInputNoOutput),
            _ => None,
        }
    }
}

/// User interaction required to complete pairing, derived from the two
/// IO capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingType {
    AutoConfirmation,
    ConfirmYN,
    DisplayPin,
    DisplayAndConfirm,
    InputPin,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
struct IoCapabilities {
    io_capability: u8,
    #[allow(dead_code)]
    oob_data_present: u8,
    #[allow(dead_code)]
    authentication_requirements: u8,
}

/// Pairing state and link-key store (C2)
#[derive(Default)]
pub struct SecurityManager {
    keys: HashMap<BdAddr, [u8; 16]>,
    authenticating: bool,
    peer: Option<(BdAddr, u16)>,
    local_capabilities: Option<IoCapabilities>,
    peer_capabilities: Option<IoCapabilities>,
}

impl SecurityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin authenticating `peer` on `handle`, replacing any previous
    /// context
    pub fn authentication_request(&mut self, peer: BdAddr, handle: u16) {
        self.authenticating = true;
        self.peer = Some((peer, handle));
    }

    /// Address of the peer the current (or just-finished)
    /// authentication is for. Staged pairing events still reference
    /// the context after `authentication_request_finished`, so the
    /// address survives until the next request replaces it.
    pub fn authentication_address(&self) -> Option<BdAddr> {
        self.peer.map(|(addr, _)| addr)
    }

    /// Handle of the connection being authenticated
    pub fn authentication_handle(&self) -> Option<u16> {
        self.peer.map(|(_, handle)| handle)
    }

    pub fn is_authenticating(&self) -> bool {
        self.authenticating
    }

    pub fn authentication_request_finished(&mut self) {
        self.authenticating = false;
    }

    pub fn set_local_io_capability(
        &mut self,
        _peer: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    ) {
        self.local_capabilities = Some(IoCapabilities {
            io_capability,
            oob_data_present,
            authentication_requirements,
        });
    }

    pub fn set_peer_io_capability(
        &mut self,
        _peer: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    ) {
        self.peer_capabilities = Some(IoCapabilities {
            io_capability,
            oob_data_present,
            authentication_requirements,
        });
    }

    pub fn invalidate_io_capabilities(&mut self) {
        self.local_capabilities = None;
        self.peer_capabilities = None;
    }

    /// Derive the pairing interaction from the exchanged capabilities.
    /// `Invalid` until both sides have been recorded.
    pub fn simple_pairing_type(&self) -> PairingType {
        let (local, peer) = match (self.local_capabilities, self.peer_capabilities) {
            (Some(local), Some(peer)) => (local, peer),
            _ => return PairingType::Invalid,
        };
        let local = match IoCapability::from_u8(local.io_capability) {
            Some(cap) => cap,
            None => return PairingType::Invalid,
        };
        let peer = match IoCapability::from_u8(peer.io_capability) {
            Some(cap) => cap,
            None => return PairingType::Invalid,
        };

        use IoCapability::*;
        match (local, peer) {
            (NoInputNoOutput, _) | (_, NoInputNoOutput) => PairingType::AutoConfirmation,
            (DisplayOnly, DisplayOnly) | (DisplayOnly, DisplayYesNo) => {
                PairingType::AutoConfirmation
            }
            (DisplayOnly, KeyboardOnly) => PairingType::DisplayPin,
            (DisplayYesNo, DisplayOnly) => PairingType::ConfirmYN,
            (DisplayYesNo, DisplayYesNo) => PairingType::DisplayAndConfirm,
            (DisplayYesNo, KeyboardOnly) => PairingType::DisplayPin,
            (KeyboardOnly, DisplayOnly)
            | (KeyboardOnly, DisplayYesNo)
            | (KeyboardOnly, KeyboardOnly) => PairingType::InputPin,
        }
    }

    pub fn write_key(&mut self, peer: BdAddr, key: [u8; 16]) {
        self.keys.insert(peer, key);
    }

    /// Number of stored keys for `peer` (0 or 1)
    pub fn read_key(&self, peer: BdAddr) -> u16 {
        u16::from(self.keys.contains_key(&peer))
    }

    pub fn get_key(&self, peer: BdAddr) -> Option<[u8; 16]> {
        self.keys.get(&peer).copied()
    }

    pub fn delete_key(&mut self, peer: BdAddr) {
        self.keys.remove(&peer);
    }
}
