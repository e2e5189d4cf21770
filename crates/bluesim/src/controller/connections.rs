//! Connection table
//!
//! Owns every active and pending link. Handles are allocated from
//! `[1, 0xEFE]` by a rotating counter so allocation order is
//! reproducible; `0xEFF` is reserved as the "no connection" sentinel.
//! At most one classic and one LE connection may be pending at a time,
//! which is what surfaces as CONTROLLER_BUSY when a host issues two
//! overlapping CreateConnection commands.

use crate::hci::constants::{MAX_HANDLE, RESERVED_HANDLE};
use crate::hci::types::{AddressWithType, BdAddr};
use crate::link::types::Phy;
use std::collections::HashMap;

/// An established link
#[derive(Debug, Clone)]
struct AclConnection {
    peer: AddressWithType,
    own: AddressWithType,
    phy: Phy,
    encrypted: bool,
}

/// A classic connection awaiting a page response / host decision
#[derive(Debug, Clone, Copy)]
struct PendingConnection {
    address: BdAddr,
    authenticate_on_complete: bool,
}

/// Table of active and pending connections (C1)
#[derive(Default)]
pub struct ConnectionTable {
    active: HashMap<u16, AclConnection>,
    pending: Option<PendingConnection>,
    pending_le: Option<AddressWithType>,
    last_handle: u16,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending classic connection. Fails if one is already
    /// outstanding.
    pub fn create_pending(&mut self, address: BdAddr, authenticate_on_complete: bool) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(PendingConnection {
            address,
            authenticate_on_complete,
        });
        true
    }

    pub fn has_pending(&self, address: BdAddr) -> bool {
        matches!(self.pending, Some(p) if p.address == address)
    }

    pub fn cancel_pending(&mut self, address: BdAddr) -> bool {
        if self.has_pending(address) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Whether the outstanding pending connection asked for
    /// authentication once it completes
    pub fn authenticate_pending(&self) -> bool {
        matches!(self.pending, Some(p) if p.authenticate_on_complete)
    }

    /// Register a pending LE connection. Fails if one is already
    /// outstanding.
    pub fn create_le_pending(&mut self, peer: AddressWithType) -> bool {
        if self.pending_le.is_some() {
            return false;
        }
        self.pending_le = Some(peer);
        true
    }

    pub fn cancel_le_pending(&mut self, peer: AddressWithType) -> bool {
        if self.pending_le == Some(peer) {
            self.pending_le = None;
            true
        } else {
            false
        }
    }

    /// Convert the pending classic connection for `address` into an
    /// active one, allocating a handle. Returns [`RESERVED_HANDLE`] if
    /// nothing was pending for that address or the table is full.
    pub fn create_connection(&mut self, address: BdAddr, own_address: BdAddr) -> u16 {
        if !self.cancel_pending(address) {
            return RESERVED_HANDLE;
        }
        self.insert(AclConnection {
            peer: AddressWithType::new(address, Default::default()),
            own: AddressWithType::new(own_address, Default::default()),
            phy: Phy::BrEdr,
            encrypted: false,
        })
    }

    /// Convert the pending LE connection for `peer` into an active one
    pub fn create_le_connection(&mut self, peer: AddressWithType, own: AddressWithType) -> u16 {
        if self.pending_le != Some(peer) {
            return RESERVED_HANDLE;
        }
        self.pending_le = None;
        self.insert(AclConnection {
            peer,
            own,
            phy: Phy::LowEnergy,
            encrypted: false,
        })
    }

    fn insert(&mut self, connection: AclConnection) -> u16 {
        if self.active.len() as u16 >= MAX_HANDLE {
            return RESERVED_HANDLE;
        }
        let handle = self.next_handle();
        self.active.insert(handle, connection);
        handle
    }

    fn next_handle(&mut self) -> u16 {
        loop {
            self.last_handle = if self.last_handle >= MAX_HANDLE {
                1
            } else {
                self.last_handle + 1
            };
            if !self.active.contains_key(&self.last_handle) {
                return self.last_handle;
            }
        }
    }

    pub fn disconnect(&mut self, handle: u16) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn has_handle(&self, handle: u16) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn peer_address(&self, handle: u16) -> Option<AddressWithType> {
        self.active.get(&handle).map(|c| c.peer)
    }

    pub fn own_address(&self, handle: u16) -> Option<AddressWithType> {
        self.active.get(&handle).map(|c| c.own)
    }

    pub fn phy(&self, handle: u16) -> Option<Phy> {
        self.active.get(&handle).map(|c| c.phy)
    }

    /// Look up the handle of the connection whose peer has the given
    /// address, ignoring the address type
    pub fn handle_for_address(&self, address: BdAddr) -> u16 {
        self.active
            .iter()
            .find(|(_, c)| c.peer.address == address)
            .map(|(&h, _)| h)
            .unwrap_or(RESERVED_HANDLE)
    }

    /// Look up the handle of the connection to the given typed address
    pub fn handle_for_address_with_type(&self, peer: AddressWithType) -> u16 {
        self.active
            .iter()
            .find(|(_, c)| c.peer == peer)
            .map(|(&h, _)| h)
            .unwrap_or(RESERVED_HANDLE)
    }

    pub fn is_encrypted(&self, handle: u16) -> bool {
        self.active.get(&handle).map(|c| c.encrypted).unwrap_or(false)
    }

    pub fn encrypt(&mut self, handle: u16) {
        if let Some(connection) = self.active.get_mut(&handle) {
            connection.encrypted = true;
        }
    }
}
