//! LE connect and resolving lists
//!
//! The two lists are positionally aligned: adding a resolving entry
//! for a device already on the connect list lands at the matching
//! index, and removing a connect-list entry purges the resolving entry
//! at the same position.

use crate::hci::types::BdAddr;

pub const IRK_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectListEntry {
    pub address: BdAddr,
    pub address_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvingListEntry {
    pub address: BdAddr,
    pub address_type: u8,
    pub peer_irk: [u8; IRK_SIZE],
    pub local_irk: [u8; IRK_SIZE],
}

/// Connect list and resolving list with their capacities (C4)
pub struct FilterLists {
    connect: Vec<ConnectListEntry>,
    resolving: Vec<ResolvingListEntry>,
    connect_capacity: usize,
    resolving_capacity: usize,
}

impl FilterLists {
    pub fn new(connect_capacity: usize, resolving_capacity: usize) -> Self {
        Self {
            connect: Vec::new(),
            resolving: Vec::new(),
            connect_capacity,
            resolving_capacity,
        }
    }

    pub fn connect_list_clear(&mut self) {
        self.connect.clear();
    }

    pub fn resolving_list_clear(&mut self) {
        self.resolving.clear();
    }

    /// Add to the connect list; duplicates are ignored
    pub fn connect_list_add(&mut self, address: BdAddr, address_type: u8) {
        let entry = ConnectListEntry {
            address,
            address_type,
        };
        if !self.connect.contains(&entry) {
            self.connect.push(entry);
        }
    }

    /// Add to the resolving list. If the device is already on the
    /// connect list, the resolving entry is written at the same index
    /// to keep the lists aligned.
    pub fn resolving_list_add(
        &mut self,
        address: BdAddr,
        address_type: u8,
        peer_irk: [u8; IRK_SIZE],
        local_irk: [u8; IRK_SIZE],
    ) {
        let entry = ResolvingListEntry {
            address,
            address_type,
            peer_irk,
            local_irk,
        };
        let aligned = self
            .connect
            .iter()
            .position(|c| c.address == address && c.address_type == address_type);
        match aligned {
            Some(index) if index < self.resolving.len() => self.resolving[index] = entry,
            _ => self.resolving.push(entry),
        }
    }

    /// Remove from the connect list, purging the aligned resolving
    /// entry
    pub fn connect_list_remove(&mut self, address: BdAddr, address_type: u8) {
        while let Some(index) = self
            .connect
            .iter()
            .position(|c| c.address == address && c.address_type == address_type)
        {
            self.connect.remove(index);
            if index < self.resolving.len() {
                self.resolving.remove(index);
            }
        }
    }

    pub fn resolving_list_remove(&mut self, address: BdAddr, address_type: u8) {
        self.resolving
            .retain(|r| !(r.address == address && r.address_type == address_type));
    }

    pub fn connect_list_contains(&self, address: BdAddr, address_type: u8) -> bool {
        self.connect
            .iter()
            .any(|c| c.address == address && c.address_type == address_type)
    }

    pub fn resolving_list_contains(&self, address: BdAddr, address_type: u8) -> bool {
        self.resolving
            .iter()
            .any(|r| r.address == address && r.address_type == address_type)
    }

    pub fn connect_list_full(&self) -> bool {
        self.connect.len() >= self.connect_capacity
    }

    pub fn resolving_list_full(&self) -> bool {
        self.resolving.len() >= self.resolving_capacity
    }
}
