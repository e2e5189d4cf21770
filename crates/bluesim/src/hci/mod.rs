//! HCI surface of the virtual controller
//!
//! This module provides the typed host boundary: status codes, events,
//! ACL packets, and the core address/handle types.

pub mod acl;
pub mod constants;
pub mod event;
pub mod status;
pub mod types;


pub use acl::HciAclPacket;
pub use event::{HciEvent, InquiryResponse};
pub use status::ErrorCode;
pub use types::{
    AddressType, AddressWithType, BdAddr, BroadcastFlag, LinkType, OwnAddressType,
    PacketBoundaryFlag, Role,
};
