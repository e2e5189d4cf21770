//! Read-only controller configuration
//!
//! A `DeviceProperties` value is handed to the controller at
//! construction and never mutated afterwards; every component reads
//! its configuration from here.

use crate::hci::types::{AddressType, BdAddr};

/// Static configuration of a virtual controller
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    /// BR/EDR public device address
    pub address: BdAddr,
    /// LE (random) device address
    pub le_address: BdAddr,
    pub class_of_device: u32,
    /// UTF-8 device name, at most 248 bytes
    pub name: Vec<u8>,
    pub clock_offset: u16,
    pub extended_inquiry_data: Vec<u8>,
    /// LMP feature mask, page 0
    pub supported_features: u64,
    /// Extended feature pages; index is the page number
    pub extended_features: Vec<u64>,
    pub lmp_version: u8,
    pub manufacturer_name: u16,
    pub lmp_subversion: u16,
    /// Host-facing ACL fragment size
    pub acl_data_packet_size: u16,
    pub total_num_acl_data_packets: u8,
    pub page_scan_repetition_mode: u8,
    pub authentication_enable: bool,
    pub le_connect_list_size: usize,
    pub le_resolving_list_size: usize,
    /// Number of LE advertising slots
    pub le_advertising_sets: usize,
    // Legacy advertising parameters, in 0.625 ms units
    pub le_advertising_interval_min: u16,
    pub le_advertising_interval_max: u16,
    pub le_advertising_own_address_type: AddressType,
    pub le_advertising_peer_address: BdAddr,
    pub le_advertising_peer_address_type: AddressType,
    pub le_advertising_filter_policy: u8,
    /// Legacy advertisement PDU type as configured over HCI
    pub le_advertising_type: u8,
    pub le_advertisement: Vec<u8>,
    pub le_scan_response: Vec<u8>,
}

impl DeviceProperties {
    pub fn max_extended_features_page(&self) -> u8 {
        self.extended_features.len().saturating_sub(1) as u8
    }

    pub fn extended_features_page(&self, page: u8) -> u64 {
        self.extended_features
            .get(page as usize)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            address: BdAddr::EMPTY,
            le_address: BdAddr::EMPTY,
            class_of_device: 0x00_1F_00,
            name: b"bluesim".to_vec(),
            clock_offset: 0,
            extended_inquiry_data: Vec::new(),
            supported_features: 0x8779_FF9B_FE8F_FFFF,
            extended_features: vec![0x8779_FF9B_FE8F_FFFF, 0x0000_0000_0000_0007, 0],
            lmp_version: 0x09,
            manufacturer_name: 0x00E0,
            lmp_subversion: 0x0000,
            acl_data_packet_size: 1024,
            total_num_acl_data_packets: 10,
            page_scan_repetition_mode: 0,
            authentication_enable: false,
            le_connect_list_size: 15,
            le_resolving_list_size: 15,
            le_advertising_sets: 3,
            le_advertising_interval_min: 0x0800,
            le_advertising_interval_max: 0x0800,
            le_advertising_own_address_type: AddressType::Public,
            le_advertising_peer_address: BdAddr::EMPTY,
            le_advertising_peer_address_type: AddressType::Public,
            le_advertising_filter_policy: 0,
            le_advertising_type: 0,
            le_advertisement: Vec::new(),
            le_scan_response: Vec::new(),
        }
    }
}
