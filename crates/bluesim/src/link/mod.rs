//! Link-layer packet model shared by all virtual controllers on a bus

pub mod types;

pub use types::{AdvertisementType, InquiryType, LinkLayerPacket, PacketBody, Phy};
