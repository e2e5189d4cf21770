//! bluesim - a virtual Bluetooth controller
//!
//! This library implements the link-layer core of an emulated
//! Bluetooth controller: the state machine a host stack talks to over
//! HCI, with the radio replaced by a software bus that delivers
//! link-layer packets to other virtual controllers. It is intended for
//! testing Bluetooth stacks, applications, and profiles without
//! hardware.
//!
//! The host pushes commands and ACL data into a [`LinkLayerController`];
//! the controller answers synchronously with an [`ErrorCode`] and emits
//! [`HciEvent`]s, host ACL, and [`LinkLayerPacket`]s through channels
//! registered at setup. Timed behavior (radio latency, page acceptance,
//! staged pairing) goes through an injected [`TaskScheduler`], so an
//! embedder - or a test - fully controls the clock.
//!
//! ```no_run
//! use bluesim::{DeviceProperties, LinkLayerController};
//!
//! let mut controller = LinkLayerController::new(DeviceProperties::default());
//! controller.register_event_channel(Box::new(|event| {
//!     println!("HCI event: {:?}", event);
//! }));
//! controller.register_remote_channel(Box::new(|packet, phy| {
//!     println!("radio tx ({:?}): {:?}", phy, packet.body);
//! }));
//! ```

pub mod controller;
pub mod error;
pub mod hci;
pub mod link;
pub mod properties;
pub mod scheduler;

// Re-export common types for convenience
pub use controller::{
    AclCallback, EventCallback, LeScanMode, LegacyAdvertisingProperties, LinkLayerController,
    RemoteCallback,
};
pub use error::PacketError;
pub use hci::{
    AddressType, AddressWithType, BdAddr, BroadcastFlag, ErrorCode, HciAclPacket, HciEvent,
    LinkType, OwnAddressType, PacketBoundaryFlag, Role,
};
pub use link::{AdvertisementType, InquiryType, LinkLayerPacket, PacketBody, Phy};
pub use properties::DeviceProperties;
pub use scheduler::{PeriodicTask, Task, TaskId, TaskScheduler, INVALID_TASK_ID};
