//! LE advertiser slot
//!
//! Each slot is polled once per timer tick: it emits an advertisement
//! when its interval has elapsed and answers scan requests while
//! enabled. Extended slots may carry a duration after which they
//! disable themselves.

use crate::hci::types::{AddressType, AddressWithType, BdAddr};
use crate::link::types::{AdvertisementType, LinkLayerPacket, PacketBody};
use std::time::{Duration, Instant};

/// One independent LE advertising context (a slot of C3)
pub struct Advertiser {
    enabled: bool,
    extended: bool,
    address: AddressWithType,
    peer_address: AddressWithType,
    filter_policy: u8,
    advertisement_type: AdvertisementType,
    advertisement: Vec<u8>,
    scan_response: Vec<u8>,
    interval: Duration,
    /// Extended-advertising duration; zero means unlimited
    duration: Duration,
    next_at: Option<Instant>,
    ends_at: Option<Instant>,
}

impl Default for Advertiser {
    fn default() -> Self {
        Self {
            enabled: false,
            extended: false,
            address: AddressWithType::default(),
            peer_address: AddressWithType::default(),
            filter_policy: 0,
            advertisement_type: AdvertisementType::AdvInd,
            advertisement: Vec::new(),
            scan_response: Vec::new(),
            interval: Duration::from_millis(0),
            duration: Duration::from_millis(0),
            next_at: None,
            ends_at: None,
        }
    }
}

impl Advertiser {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        address: AddressWithType,
        peer_address: AddressWithType,
        filter_policy: u8,
        advertisement_type: AdvertisementType,
        advertisement: Vec<u8>,
        scan_response: Vec<u8>,
        interval: Duration,
    ) {
        self.extended = false;
        self.address = address;
        self.peer_address = peer_address;
        self.filter_policy = filter_policy;
        self.advertisement_type = advertisement_type;
        self.advertisement = advertisement;
        self.scan_response = scan_response;
        self.interval = interval;
    }

    /// Configure an extended slot. The slot's own address is set
    /// separately; only its type is taken from the parameters.
    pub fn initialize_extended(
        &mut self,
        own_address_type: AddressType,
        peer_address: AddressWithType,
        filter_policy: u8,
        advertisement_type: AdvertisementType,
        interval: Duration,
    ) {
        self.extended = true;
        self.address = AddressWithType::new(self.address.address, own_address_type);
        self.peer_address = peer_address;
        self.filter_policy = filter_policy;
        self.advertisement_type = advertisement_type;
        self.interval = interval;
    }

    pub fn set_address(&mut self, address: BdAddr) {
        self.address = AddressWithType::new(address, self.address.address_type);
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.advertisement = data;
    }

    pub fn address(&self) -> AddressWithType {
        self.address
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        self.next_at = None;
        self.ends_at = None;
        self.duration = Duration::ZERO;
    }

    /// Enable an extended slot; a zero duration means no time limit
    pub fn enable_extended(&mut self, duration: Duration) {
        self.enabled = true;
        self.next_at = None;
        self.ends_at = None;
        self.duration = duration;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.next_at = None;
        self.ends_at = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Produce the next advertisement if the slot is enabled and due.
    /// The first poll after enabling fires immediately; afterwards the
    /// fire time advances by whole intervals.
    pub fn get_advertisement(&mut self, now: Instant) -> Option<LinkLayerPacket> {
        if !self.enabled {
            return None;
        }
        if let Some(ends_at) = self.ends_at {
            if now >= ends_at {
                self.disable();
                return None;
            }
        }
        let next_at = match self.next_at {
            None => now,
            Some(at) => at,
        };
        if now < next_at {
            return None;
        }
        self.next_at = Some(next_at + self.interval);
        if self.extended && self.ends_at.is_none() && !self.duration.is_zero() {
            self.ends_at = Some(now + self.duration);
        }
        Some(LinkLayerPacket::new(
            self.address.address,
            self.peer_address.address,
            PacketBody::LeAdvertisement {
                address_type: self.address.address_type,
                advertisement_type: self.advertisement_type,
                data: self.advertisement.clone(),
            },
        ))
    }

    /// Answer a scan request addressed to this slot. Only scannable
    /// advertisement types respond.
    pub fn get_scan_response(
        &self,
        scanned_address: BdAddr,
        scanner_address: BdAddr,
    ) -> Option<LinkLayerPacket> {
        if !self.enabled || scanned_address != self.address.address {
            return None;
        }
        match self.advertisement_type {
            AdvertisementType::AdvInd | AdvertisementType::AdvScanInd => {}
            _ => return None,
        }
        Some(LinkLayerPacket::new(
            self.address.address,
            scanner_address,
            PacketBody::LeScanResponse {
                address_type: self.address.address_type,
                advertisement_type: AdvertisementType::ScanResponse,
                data: self.scan_response.clone(),
            },
        ))
    }
}
