//! HCI protocol constants
//!
//! Numeric values used at the HCI boundary of the virtual controller.

// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

/// Connection handle meaning "no connection"; also carried in
/// ConnectionComplete on failure
pub const RESERVED_HANDLE: u16 = 0x0EFF;

/// Largest allocatable connection handle
pub const MAX_HANDLE: u16 = 0x0EFE;

// Extended advertising report event-type bytes
pub const EXT_EVENT_TYPE_ADV_IND: u8 = 0x13;
pub const EXT_EVENT_TYPE_ADV_DIRECT_IND: u8 = 0x15;
pub const EXT_EVENT_TYPE_ADV_SCAN_IND: u8 = 0x12;
pub const EXT_EVENT_TYPE_ADV_NONCONN_IND: u8 = 0x10;
pub const EXT_EVENT_TYPE_SCAN_RESPONSE: u8 = 0x1B;

// Legacy advertising report event-type bytes
pub const EVENT_TYPE_SCAN_RESPONSE: u8 = 0x04;

/// Link key type reported with LinkKeyNotification
pub const KEY_TYPE_AUTHENTICATED_P256: u8 = 0x08;

/// Number of command packets credited back per completed host ACL
pub const NUM_COMMAND_PACKETS: u16 = 0x01;

/// Fixed numeric value shown during simple-pairing confirmation
pub const PAIRING_NUMERIC_VALUE: u32 = 123456;

// Link-policy settings bits (sniff | hold | role switch)
pub const LINK_POLICY_SETTINGS_MAX: u16 = 0x0007;
