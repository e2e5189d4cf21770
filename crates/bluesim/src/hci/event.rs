//! Typed HCI events emitted to the host
//!
//! HCI byte-level serialization is out of scope for the virtual
//! controller; events cross the host boundary as values of this enum.
//! Each variant mirrors the parameter list of the corresponding HCI
//! event so a host shim can serialize them mechanically.

use crate::hci::status::ErrorCode;
use crate::hci::types::{AddressType, BdAddr, LinkType, Role};

/// A single inquiry result entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryResponse {
    pub bd_addr: BdAddr,
    pub page_scan_repetition_mode: u8,
    pub class_of_device: u32,
    pub clock_offset: u16,
}

/// HCI events produced by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciEvent {
    ConnectionRequest {
        bd_addr: BdAddr,
        class_of_device: u32,
        link_type: LinkType,
    },
    ConnectionComplete {
        status: ErrorCode,
        handle: u16,
        bd_addr: BdAddr,
        link_type: LinkType,
        encryption_enabled: bool,
    },
    DisconnectionComplete {
        status: ErrorCode,
        handle: u16,
        reason: ErrorCode,
    },
    AuthenticationComplete {
        status: ErrorCode,
        handle: u16,
    },
    RemoteNameRequestComplete {
        status: ErrorCode,
        bd_addr: BdAddr,
        remote_name: Vec<u8>,
    },
    EncryptionChange {
        status: ErrorCode,
        handle: u16,
        encryption_enabled: bool,
    },
    EncryptionKeyRefreshComplete {
        status: ErrorCode,
        handle: u16,
    },
    ReadRemoteSupportedFeaturesComplete {
        status: ErrorCode,
        handle: u16,
        features: u64,
    },
    ReadRemoteExtendedFeaturesComplete {
        status: ErrorCode,
        handle: u16,
        page_number: u8,
        max_page_number: u8,
        features: u64,
    },
    ReadRemoteVersionInformationComplete {
        status: ErrorCode,
        handle: u16,
        lmp_version: u8,
        manufacturer_name: u16,
        lmp_subversion: u16,
    },
    ReadClockOffsetComplete {
        status: ErrorCode,
        handle: u16,
        clock_offset: u16,
    },
    RemoteHostSupportedFeaturesNotification {
        bd_addr: BdAddr,
        features: u64,
    },
    ConnectionPacketTypeChanged {
        status: ErrorCode,
        handle: u16,
        packet_type: u16,
    },
    NumberOfCompletedPackets {
        handle: u16,
        num_completed_packets: u16,
    },
    InquiryComplete {
        status: ErrorCode,
    },
    InquiryResult {
        responses: Vec<InquiryResponse>,
    },
    InquiryResultWithRssi {
        responses: Vec<(InquiryResponse, u8)>,
    },
    ExtendedInquiryResult {
        response: InquiryResponse,
        rssi: u8,
        extended_inquiry_data: Vec<u8>,
    },
    LinkKeyRequest {
        bd_addr: BdAddr,
    },
    LinkKeyNotification {
        bd_addr: BdAddr,
        key: [u8; 16],
        key_type: u8,
    },
    IoCapabilityRequest {
        bd_addr: BdAddr,
    },
    IoCapabilityResponse {
        bd_addr: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    },
    UserConfirmationRequest {
        bd_addr: BdAddr,
        numeric_value: u32,
    },
    UserPasskeyRequest {
        bd_addr: BdAddr,
    },
    SimplePairingComplete {
        status: ErrorCode,
        bd_addr: BdAddr,
    },
    LeConnectionComplete {
        status: ErrorCode,
        handle: u16,
        role: Role,
        peer_address_type: AddressType,
        peer_address: BdAddr,
        connection_interval: u16,
        connection_latency: u16,
        supervision_timeout: u16,
        master_clock_accuracy: u8,
    },
    LeAdvertisingReport {
        event_type: u8,
        address_type: AddressType,
        address: BdAddr,
        data: Vec<u8>,
        rssi: u8,
    },
    LeExtendedAdvertisingReport {
        event_type: u8,
        address_type: AddressType,
        address: BdAddr,
        primary_phy: u8,
        secondary_phy: u8,
        advertising_sid: u8,
        tx_power: u8,
        rssi: u8,
        periodic_advertising_interval: u16,
        direct_address_type: AddressType,
        direct_address: BdAddr,
        data: Vec<u8>,
    },
    LeConnectionUpdateComplete {
        status: ErrorCode,
        handle: u16,
        connection_interval: u16,
        connection_latency: u16,
        supervision_timeout: u16,
    },
    LeLongTermKeyRequest {
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
    },
}
