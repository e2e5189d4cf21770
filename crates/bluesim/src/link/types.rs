//! Link-layer packet model for the emulated radio
//!
//! Packets exchanged between virtual controllers are typed values
//! rather than byte blobs: the radio bus delivers them whole, so the
//! wire union only needs to carry the fields each protocol sub-machine
//! reads. The one embedded byte payload is the serialized HCI ACL view
//! inside [`PacketBody::Acl`].

use crate::hci::types::{AddressType, BdAddr};

/// Physical transport a packet travels over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phy {
    BrEdr,
    LowEnergy,
}

/// LE advertisement PDU types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementType {
    AdvInd,
    AdvDirectInd,
    AdvScanInd,
    AdvNonconnInd,
    ScanResponse,
}

impl From<u8> for AdvertisementType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => AdvertisementType::AdvDirectInd,
            0x02 => AdvertisementType::AdvScanInd,
            0x03 => AdvertisementType::AdvNonconnInd,
            0x04 => AdvertisementType::ScanResponse,
            _ => AdvertisementType::AdvInd,
        }
    }
}

impl From<AdvertisementType> for u8 {
    fn from(value: AdvertisementType) -> Self {
        match value {
            AdvertisementType::AdvInd => 0x00,
            AdvertisementType::AdvDirectInd => 0x01,
            AdvertisementType::AdvScanInd => 0x02,
            AdvertisementType::AdvNonconnInd => 0x03,
            AdvertisementType::ScanResponse => 0x04,
        }
    }
}

/// Inquiry flavor requested by the discovering side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InquiryType {
    #[default]
    Standard,
    Rssi,
    Extended,
}

impl From<u8> for InquiryType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => InquiryType::Rssi,
            0x02 => InquiryType::Extended,
            _ => InquiryType::Standard,
        }
    }
}

/// A packet on the emulated radio
///
/// `destination == BdAddr::EMPTY` denotes a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLayerPacket {
    pub source: BdAddr,
    pub destination: BdAddr,
    pub body: PacketBody,
}

impl LinkLayerPacket {
    pub fn new(source: BdAddr, destination: BdAddr, body: PacketBody) -> Self {
        Self {
            source,
            destination,
            body,
        }
    }
}

/// Type-specific body of a link-layer packet
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PacketBody {
    /// Serialized HCI ACL view forwarded between hosts
    Acl { payload: Vec<u8> },
    Disconnect {
        reason: u8,
    },
    EncryptConnection {
        key: [u8; 16],
    },
    EncryptConnectionResponse {
        key: [u8; 16],
    },
    Inquiry {
        inquiry_type: InquiryType,
    },
    InquiryResponse {
        page_scan_repetition_mode: u8,
        class_of_device: u32,
        clock_offset: u16,
    },
    InquiryResponseWithRssi {
        page_scan_repetition_mode: u8,
        class_of_device: u32,
        clock_offset: u16,
        rssi: u8,
    },
    ExtendedInquiryResponse {
        page_scan_repetition_mode: u8,
        class_of_device: u32,
        clock_offset: u16,
        rssi: u8,
        extended_data: Vec<u8>,
    },
    IoCapabilityRequest {
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    },
    IoCapabilityResponse {
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    },
    IoCapabilityNegativeResponse {
        reason: u8,
    },
    LeAdvertisement {
        address_type: AddressType,
        advertisement_type: AdvertisementType,
        data: Vec<u8>,
    },
    LeConnect {
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
        address_type: AddressType,
    },
    LeConnectComplete {
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
        address_type: AddressType,
    },
    LeEncryptConnection {
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    },
    LeEncryptConnectionResponse {
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    },
    LeScan,
    LeScanResponse {
        address_type: AddressType,
        advertisement_type: AdvertisementType,
        data: Vec<u8>,
    },
    Page {
        class_of_device: u32,
        allow_role_switch: u8,
    },
    PageResponse {
        try_role_switch: u8,
    },
    PageReject {
        reason: u8,
    },
    RemoteNameRequest,
    RemoteNameRequestResponse {
        name: Vec<u8>,
    },
    ReadRemoteSupportedFeatures,
    ReadRemoteSupportedFeaturesResponse {
        features: u64,
    },
    ReadRemoteLmpFeatures,
    ReadRemoteLmpFeaturesResponse {
        features: u64,
    },
    ReadRemoteExtendedFeatures {
        page_number: u8,
    },
    ReadRemoteExtendedFeaturesResponse {
        status: u8,
        page_number: u8,
        max_page_number: u8,
        features: u64,
    },
    ReadRemoteVersionInformation,
    ReadRemoteVersionInformationResponse {
        lmp_version: u8,
        manufacturer_name: u16,
        lmp_subversion: u16,
    },
    ReadClockOffset,
    ReadClockOffsetResponse {
        offset: u16,
    },
}

impl PacketBody {
    /// Short name used when logging dropped or unroutable packets
    pub fn kind(&self) -> &'static str {
        match self {
            PacketBody::Acl { .. } => "ACL",
            PacketBody::Disconnect { .. } => "DISCONNECT",
            PacketBody::EncryptConnection { .. } => "ENCRYPT_CONNECTION",
            PacketBody::EncryptConnectionResponse { .. } => "ENCRYPT_CONNECTION_RESPONSE",
            PacketBody::Inquiry { .. } => "INQUIRY",
            PacketBody::InquiryResponse { .. } => "INQUIRY_RESPONSE",
            PacketBody::InquiryResponseWithRssi { .. } => "INQUIRY_RESPONSE_WITH_RSSI",
            PacketBody::ExtendedInquiryResponse { .. } => "EXTENDED_INQUIRY_RESPONSE",
            PacketBody::IoCapabilityRequest { .. } => "IO_CAPABILITY_REQUEST",
            PacketBody::IoCapabilityResponse { .. } => "IO_CAPABILITY_RESPONSE",
            PacketBody::IoCapabilityNegativeResponse { .. } => "IO_CAPABILITY_NEGATIVE_RESPONSE",
            PacketBody::LeAdvertisement { .. } => "LE_ADVERTISEMENT",
            PacketBody::LeConnect { .. } => "LE_CONNECT",
            PacketBody::LeConnectComplete { .. } => "LE_CONNECT_COMPLETE",
            PacketBody::LeEncryptConnection { .. } => "LE_ENCRYPT_CONNECTION",
            PacketBody::LeEncryptConnectionResponse { .. } => "LE_ENCRYPT_CONNECTION_RESPONSE",
            PacketBody::LeScan => "LE_SCAN",
            PacketBody::LeScanResponse { .. } => "LE_SCAN_RESPONSE",
            PacketBody::Page { .. } => "PAGE",
            PacketBody::PageResponse { .. } => "PAGE_RESPONSE",
            PacketBody::PageReject { .. } => "PAGE_REJECT",
            PacketBody::RemoteNameRequest => "REMOTE_NAME_REQUEST",
            PacketBody::RemoteNameRequestResponse { .. } => "REMOTE_NAME_REQUEST_RESPONSE",
            PacketBody::ReadRemoteSupportedFeatures => "READ_REMOTE_SUPPORTED_FEATURES",
            PacketBody::ReadRemoteSupportedFeaturesResponse { .. } => {
                "READ_REMOTE_SUPPORTED_FEATURES_RESPONSE"
            }
            PacketBody::ReadRemoteLmpFeatures => "READ_REMOTE_LMP_FEATURES",
            PacketBody::ReadRemoteLmpFeaturesResponse { .. } => {
                "READ_REMOTE_LMP_FEATURES_RESPONSE"
            }
            PacketBody::ReadRemoteExtendedFeatures { .. } => "READ_REMOTE_EXTENDED_FEATURES",
            PacketBody::ReadRemoteExtendedFeaturesResponse { .. } => {
                "READ_REMOTE_EXTENDED_FEATURES_RESPONSE"
            }
            PacketBody::ReadRemoteVersionInformation => "READ_REMOTE_VERSION_INFORMATION",
            PacketBody::ReadRemoteVersionInformationResponse { .. } => {
                "READ_REMOTE_VERSION_INFORMATION_RESPONSE"
            }
            PacketBody::ReadClockOffset => "READ_CLOCK_OFFSET",
            PacketBody::ReadClockOffsetResponse { .. } => "READ_CLOCK_OFFSET_RESPONSE",
        }
    }
}
