//! The link-layer controller
//!
//! This module is the heart of the virtual controller: it owns every
//! protocol sub-machine (paging, inquiry, secure simple pairing,
//! feature exchange, LE advertising/scanning/initiating, encryption,
//! ACL forwarding) and dispatches both host commands and inbound
//! radio packets to them. All handlers run synchronously on one
//! logical thread; anything timed is pushed onto the injected task
//! scheduler as a closure that is applied back to the controller when
//! due.

pub mod advertiser;
pub mod connections;
pub mod lists;
pub mod security;

#[cfg(test)]
mod tests;

use crate::hci::acl::HciAclPacket;
use crate::hci::constants::*;
use crate::hci::event::{HciEvent, InquiryResponse};
use crate::hci::status::ErrorCode;
use crate::hci::types::{
    AddressType, AddressWithType, BdAddr, LinkType, OwnAddressType, PacketBoundaryFlag, Role,
};
use crate::link::types::{AdvertisementType, InquiryType, LinkLayerPacket, PacketBody, Phy};
use crate::properties::DeviceProperties;
use crate::scheduler::{Task, TaskId, TaskScheduler, INVALID_TASK_ID};
use advertiser::Advertiser;
use connections::ConnectionTable;
use lists::FilterLists;
use log::{debug, error, info, warn};
use security::{PairingType, SecurityManager};
use std::time::{Duration, Instant};

/// Channel carrying HCI events to the host
pub type EventCallback = Box<dyn Fn(HciEvent) + Send>;
/// Channel carrying ACL data to the host
pub type AclCallback = Box<dyn Fn(HciAclPacket) + Send>;
/// Channel carrying link-layer packets onto the radio bus
pub type RemoteCallback = Box<dyn Fn(LinkLayerPacket, Phy) + Send>;

// Modeled controller latencies
const LINK_LAYER_SEND_DELAY: Duration = Duration::from_millis(50);
const COMPLETED_PACKETS_DELAY: Duration = Duration::from_millis(1);
const DISCONNECT_CLEANUP_DELAY: Duration = Duration::from_millis(20);
const PACKET_TYPE_CHANGED_DELAY: Duration = Duration::from_millis(20);
const PAGE_DECISION_DELAY: Duration = Duration::from_millis(200);
const PAIRING_STEP_DELAY: Duration = Duration::from_millis(5);
const PAIRING_FINISH_DELAY: Duration = Duration::from_millis(15);
const CONNECTION_UPDATE_DELAY: Duration = Duration::from_millis(25);
const INQUIRY_COOLDOWN: Duration = Duration::from_millis(2000);
const MIN_ADVERTISING_INTERVAL: Duration = Duration::from_millis(20);

/// Which scan command, if any, currently has LE scanning enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeScanMode {
    #[default]
    Disabled,
    Legacy,
    Extended,
}

/// Advertisement shapes accepted by the extended-advertising
/// parameter command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyAdvertisingProperties {
    AdvInd,
    AdvNonconnInd,
    AdvScanInd,
    AdvDirectIndHigh,
    AdvDirectIndLow,
}

/// Armed LE initiator parameters
#[derive(Debug, Clone, Copy, Default)]
struct LeInitiator {
    armed: bool,
    peer_address: BdAddr,
    peer_address_type: AddressType,
    own_address_type: OwnAddressType,
    interval_min: u16,
    interval_max: u16,
    latency: u16,
    supervision_timeout: u16,
}

/// Deterministic stand-in for received signal strength
#[derive(Debug, Default)]
struct RssiStub {
    counter: u8,
}

impl RssiStub {
    fn next(&mut self) -> u8 {
        self.counter = self.counter.wrapping_add(5);
        if self.counter > 128 {
            self.counter %= 7;
        }
        self.counter.wrapping_neg()
    }
}

/// The virtual controller core (C10 plus every component it owns)
pub struct LinkLayerController {
    properties: DeviceProperties,
    connections: ConnectionTable,
    security_manager: SecurityManager,
    advertisers: Vec<Advertiser>,
    lists: FilterLists,
    event_channel: Option<EventCallback>,
    acl_channel: Option<AclCallback>,
    remote_channel: Option<RemoteCallback>,
    scheduler: Option<Box<dyn TaskScheduler>>,
    inquiry_scans_enabled: bool,
    page_scans_enabled: bool,
    simple_pairing_mode_enabled: bool,
    le_scan_mode: LeScanMode,
    /// 0 = passive, 1 = active
    le_scan_type: u8,
    initiator: LeInitiator,
    inquiry_mode: InquiryType,
    inquiry_lap: u64,
    inquiry_max_responses: u8,
    inquiry_timer_task_id: TaskId,
    last_inquiry: Option<Instant>,
    default_link_policy_settings: u16,
    rssi: RssiStub,
}

impl LinkLayerController {
    pub fn new(properties: DeviceProperties) -> Self {
        let advertisers = (0..properties.le_advertising_sets)
            .map(|_| Advertiser::default())
            .collect();
        let lists = FilterLists::new(
            properties.le_connect_list_size,
            properties.le_resolving_list_size,
        );
        Self {
            properties,
            connections: ConnectionTable::new(),
            security_manager: SecurityManager::new(),
            advertisers,
            lists,
            event_channel: None,
            acl_channel: None,
            remote_channel: None,
            scheduler: None,
            inquiry_scans_enabled: false,
            page_scans_enabled: false,
            simple_pairing_mode_enabled: true,
            le_scan_mode: LeScanMode::Disabled,
            le_scan_type: 0,
            initiator: LeInitiator::default(),
            inquiry_mode: InquiryType::Standard,
            inquiry_lap: 0,
            inquiry_max_responses: 0,
            inquiry_timer_task_id: INVALID_TASK_ID,
            last_inquiry: None,
            default_link_policy_settings: 0,
            rssi: RssiStub::default(),
        }
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    // ------------------------------------------------------------------
    // Channel and scheduler registration
    // ------------------------------------------------------------------

    pub fn register_event_channel(&mut self, callback: EventCallback) {
        self.event_channel = Some(callback);
    }

    pub fn register_acl_channel(&mut self, callback: AclCallback) {
        self.acl_channel = Some(callback);
    }

    pub fn register_remote_channel(&mut self, callback: RemoteCallback) {
        self.remote_channel = Some(callback);
    }

    pub fn register_task_scheduler(&mut self, scheduler: Box<dyn TaskScheduler>) {
        self.scheduler = Some(scheduler);
    }

    fn send_event(&self, event: HciEvent) {
        if let Some(channel) = &self.event_channel {
            channel(event);
        } else {
            warn!("No event channel registered, dropping event");
        }
    }

    fn send_acl(&self, acl: HciAclPacket) {
        if let Some(channel) = &self.acl_channel {
            channel(acl);
        } else {
            warn!("No ACL channel registered, dropping data");
        }
    }

    fn transmit(&self, packet: LinkLayerPacket, phy: Phy) {
        if let Some(channel) = &self.remote_channel {
            channel(packet, phy);
        } else {
            warn!("No remote channel registered, dropping {}", packet.body.kind());
        }
    }

    /// Hand deferred work to the scheduler; without one the task runs
    /// inline
    fn schedule_task(&mut self, delay: Duration, task: Task) -> TaskId {
        if let Some(scheduler) = self.scheduler.as_mut() {
            return scheduler.schedule(delay, task);
        }
        task(self);
        INVALID_TASK_ID
    }

    fn cancel_task(&mut self, id: TaskId) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.cancel(id);
        }
    }

    /// Queue a packet for the BR/EDR side of the radio, modeling the
    /// transmit latency
    fn send_link_layer_packet(&mut self, packet: LinkLayerPacket) {
        self.schedule_task(
            LINK_LAYER_SEND_DELAY,
            Box::new(move |controller| controller.transmit(packet, Phy::BrEdr)),
        );
    }

    /// Queue a packet for the LE side of the radio
    fn send_le_link_layer_packet(&mut self, packet: LinkLayerPacket) {
        self.schedule_task(
            LINK_LAYER_SEND_DELAY,
            Box::new(move |controller| controller.transmit(packet, Phy::LowEnergy)),
        );
    }

    fn local_address(&self) -> BdAddr {
        self.properties.address
    }

    // ------------------------------------------------------------------
    // Ingress dispatch (radio -> core)
    // ------------------------------------------------------------------

    /// Entry point for packets delivered by the radio bus
    pub fn incoming_packet(&mut self, packet: LinkLayerPacket) {
        let destination = packet.destination;
        let mut address_matches = destination.is_empty()
            || destination == self.properties.address
            || destination == self.properties.le_address;
        if !address_matches {
            address_matches = self
                .advertisers
                .iter()
                .any(|a| a.is_enabled() && a.address().address == destination);
        }
        if !address_matches {
            return;
        }

        let source = packet.source;
        match packet.body {
            PacketBody::Acl { payload } => self.incoming_acl(source, payload),
            PacketBody::Disconnect { reason } => self.incoming_disconnect(source, reason),
            PacketBody::EncryptConnection { key } => {
                self.incoming_encrypt_connection(source, key)
            }
            PacketBody::EncryptConnectionResponse { .. } => {
                self.incoming_encrypt_connection_response(source)
            }
            PacketBody::Inquiry { inquiry_type } => {
                if self.inquiry_scans_enabled {
                    self.incoming_inquiry(source, inquiry_type);
                }
            }
            PacketBody::InquiryResponse {
                page_scan_repetition_mode,
                class_of_device,
                clock_offset,
            } => {
                self.send_event(HciEvent::InquiryResult {
                    responses: vec![InquiryResponse {
                        bd_addr: source,
                        page_scan_repetition_mode,
                        class_of_device,
                        clock_offset,
                    }],
                });
            }
            PacketBody::InquiryResponseWithRssi {
                page_scan_repetition_mode,
                class_of_device,
                clock_offset,
                rssi,
            } => {
                self.send_event(HciEvent::InquiryResultWithRssi {
                    responses: vec![(
                        InquiryResponse {
                            bd_addr: source,
                            page_scan_repetition_mode,
                            class_of_device,
                            clock_offset,
                        },
                        rssi,
                    )],
                });
            }
            PacketBody::ExtendedInquiryResponse {
                page_scan_repetition_mode,
                class_of_device,
                clock_offset,
                rssi,
                extended_data,
            } => {
                self.send_event(HciEvent::ExtendedInquiryResult {
                    response: InquiryResponse {
                        bd_addr: source,
                        page_scan_repetition_mode,
                        class_of_device,
                        clock_offset,
                    },
                    rssi,
                    extended_inquiry_data: extended_data,
                });
            }
            PacketBody::IoCapabilityRequest {
                io_capability,
                oob_data_present,
                authentication_requirements,
            } => self.incoming_io_capability_request(
                source,
                io_capability,
                oob_data_present,
                authentication_requirements,
            ),
            PacketBody::IoCapabilityResponse {
                io_capability,
                oob_data_present,
                authentication_requirements,
            } => self.incoming_io_capability_response(
                source,
                io_capability,
                oob_data_present,
                authentication_requirements,
            ),
            PacketBody::IoCapabilityNegativeResponse { .. } => {
                self.incoming_io_capability_negative_response(source)
            }
            PacketBody::LeAdvertisement {
                address_type,
                advertisement_type,
                data,
            } => {
                if self.le_scan_mode != LeScanMode::Disabled || self.initiator.armed {
                    self.incoming_le_advertisement(source, address_type, advertisement_type, data);
                }
            }
            PacketBody::LeConnect {
                interval_min,
                interval_max,
                latency,
                supervision_timeout,
                address_type,
            } => self.incoming_le_connect(
                source,
                destination,
                interval_min,
                interval_max,
                latency,
                supervision_timeout,
                address_type,
            ),
            PacketBody::LeConnectComplete {
                interval,
                latency,
                supervision_timeout,
                address_type,
            } => self.incoming_le_connect_complete(
                source,
                destination,
                interval,
                latency,
                supervision_timeout,
                address_type,
            ),
            PacketBody::LeEncryptConnection { rand, ediv, .. } => {
                self.incoming_le_encrypt_connection(source, rand, ediv)
            }
            PacketBody::LeEncryptConnectionResponse { ltk, .. } => {
                self.incoming_le_encrypt_connection_response(source, ltk)
            }
            PacketBody::LeScan => self.incoming_le_scan(source, destination),
            PacketBody::LeScanResponse {
                address_type,
                advertisement_type,
                data,
            } => {
                if self.le_scan_mode != LeScanMode::Disabled && self.le_scan_type == 1 {
                    self.incoming_le_scan_response(source, address_type, advertisement_type, data);
                }
            }
            PacketBody::Page {
                class_of_device, ..
            } => {
                if self.page_scans_enabled {
                    self.incoming_page(source, class_of_device);
                }
            }
            PacketBody::PageResponse { .. } => self.incoming_page_response(source, destination),
            PacketBody::PageReject { reason } => self.incoming_page_reject(source, reason),
            PacketBody::RemoteNameRequest => self.incoming_remote_name_request(source, destination),
            PacketBody::RemoteNameRequestResponse { name } => {
                self.send_event(HciEvent::RemoteNameRequestComplete {
                    status: ErrorCode::Success,
                    bd_addr: source,
                    remote_name: name,
                });
            }
            PacketBody::ReadRemoteSupportedFeatures => {
                let response = LinkLayerPacket::new(
                    destination,
                    source,
                    PacketBody::ReadRemoteSupportedFeaturesResponse {
                        features: self.properties.supported_features,
                    },
                );
                self.send_link_layer_packet(response);
            }
            PacketBody::ReadRemoteSupportedFeaturesResponse { features } => {
                self.incoming_read_remote_supported_features_response(source, features)
            }
            PacketBody::ReadRemoteLmpFeatures => {
                let response = LinkLayerPacket::new(
                    destination,
                    source,
                    PacketBody::ReadRemoteLmpFeaturesResponse {
                        features: self.properties.extended_features_page(1),
                    },
                );
                self.send_link_layer_packet(response);
            }
            PacketBody::ReadRemoteLmpFeaturesResponse { features } => {
                self.send_event(HciEvent::RemoteHostSupportedFeaturesNotification {
                    bd_addr: source,
                    features,
                });
            }
            PacketBody::ReadRemoteExtendedFeatures { page_number } => {
                self.incoming_read_remote_extended_features(source, destination, page_number)
            }
            PacketBody::ReadRemoteExtendedFeaturesResponse {
                status,
                page_number,
                max_page_number,
                features,
            } => self.incoming_read_remote_extended_features_response(
                source,
                status,
                page_number,
                max_page_number,
                features,
            ),
            PacketBody::ReadRemoteVersionInformation => {
                let response = LinkLayerPacket::new(
                    destination,
                    source,
                    PacketBody::ReadRemoteVersionInformationResponse {
                        lmp_version: self.properties.lmp_version,
                        manufacturer_name: self.properties.manufacturer_name,
                        lmp_subversion: self.properties.lmp_subversion,
                    },
                );
                self.send_link_layer_packet(response);
            }
            PacketBody::ReadRemoteVersionInformationResponse {
                lmp_version,
                manufacturer_name,
                lmp_subversion,
            } => self.incoming_read_remote_version_response(
                source,
                lmp_version,
                manufacturer_name,
                lmp_subversion,
            ),
            PacketBody::ReadClockOffset => {
                let response = LinkLayerPacket::new(
                    destination,
                    source,
                    PacketBody::ReadClockOffsetResponse {
                        offset: self.properties.clock_offset,
                    },
                );
                self.send_link_layer_packet(response);
            }
            PacketBody::ReadClockOffsetResponse { offset } => {
                self.incoming_read_clock_offset_response(source, offset)
            }
        }
    }

    // ------------------------------------------------------------------
    // ACL forwarding (C9)
    // ------------------------------------------------------------------

    /// Forward a host ACL packet to the connected peer
    pub fn send_acl_to_remote(&mut self, acl: HciAclPacket) -> ErrorCode {
        let handle = acl.handle;
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        let (own, destination, phy) = match (
            self.connections.own_address(handle),
            self.connections.peer_address(handle),
            self.connections.phy(handle),
        ) {
            (Some(own), Some(peer), Some(phy)) => (own, peer, phy),
            _ => return ErrorCode::UnknownConnection,
        };

        self.schedule_task(
            COMPLETED_PACKETS_DELAY,
            Box::new(move |controller| {
                controller.send_event(HciEvent::NumberOfCompletedPackets {
                    handle,
                    num_completed_packets: NUM_COMMAND_PACKETS,
                });
            }),
        );

        // The link-layer ACL body is the serialized HCI ACL view, so
        // the boundary and broadcast flags survive the crossing.
        let packet = LinkLayerPacket::new(
            own.address,
            destination.address,
            PacketBody::Acl {
                payload: acl.to_bytes(),
            },
        );
        match phy {
            Phy::BrEdr => self.send_link_layer_packet(packet),
            Phy::LowEnergy => self.send_le_link_layer_packet(packet),
        }
        ErrorCode::Success
    }

    fn incoming_acl(&mut self, source: BdAddr, payload: Vec<u8>) {
        debug!("ACL packet from {}", source);
        let view = match HciAclPacket::parse(&payload) {
            Ok(view) => view,
            Err(e) => {
                warn!("Malformed inner ACL from {}: {}", source, e);
                return;
            }
        };
        let local_handle = self.connections.handle_for_address(source);
        if local_handle == RESERVED_HANDLE {
            info!("Discarding ACL from a disconnected device {}", source);
            return;
        }

        let mut pb_flag = view.packet_boundary_flag;
        if pb_flag == PacketBoundaryFlag::FirstNonAutomaticallyFlushable {
            pb_flag = PacketBoundaryFlag::FirstAutomaticallyFlushable;
        }
        let fragment_size = usize::from(self.properties.acl_data_packet_size.max(1));
        for fragment in view.payload.chunks(fragment_size) {
            self.send_acl(HciAclPacket::new(
                local_handle,
                pb_flag,
                view.broadcast_flag,
                fragment.to_vec(),
            ));
            pb_flag = PacketBoundaryFlag::ContinuingFragment;
        }
    }

    // ------------------------------------------------------------------
    // Paging / BR/EDR connections (C5)
    // ------------------------------------------------------------------

    pub fn create_connection(&mut self, address: BdAddr, allow_role_switch: u8) -> ErrorCode {
        if !self
            .connections
            .create_pending(address, self.properties.authentication_enable)
        {
            return ErrorCode::ControllerBusy;
        }
        let page = LinkLayerPacket::new(
            self.local_address(),
            address,
            PacketBody::Page {
                class_of_device: self.properties.class_of_device,
                allow_role_switch,
            },
        );
        self.send_link_layer_packet(page);
        ErrorCode::Success
    }

    pub fn create_connection_cancel(&mut self, address: BdAddr) -> ErrorCode {
        if !self.connections.cancel_pending(address) {
            return ErrorCode::UnknownConnection;
        }
        ErrorCode::Success
    }

    fn incoming_page(&mut self, source: BdAddr, class_of_device: u32) {
        info!("Page from {}", source);
        if !self
            .connections
            .create_pending(source, self.properties.authentication_enable)
        {
            warn!("Failed to create a pending connection for {}", source);
        }
        self.send_event(HciEvent::ConnectionRequest {
            bd_addr: source,
            class_of_device,
            link_type: LinkType::Acl,
        });
    }

    pub fn accept_connection_request(&mut self, address: BdAddr, try_role_switch: bool) -> ErrorCode {
        if !self.connections.has_pending(address) {
            info!("No pending connection for {}", address);
            return ErrorCode::UnknownConnection;
        }
        self.schedule_task(
            PAGE_DECISION_DELAY,
            Box::new(move |controller| controller.make_slave_connection(address, try_role_switch)),
        );
        ErrorCode::Success
    }

    fn make_slave_connection(&mut self, address: BdAddr, try_role_switch: bool) {
        let response = LinkLayerPacket::new(
            self.local_address(),
            address,
            PacketBody::PageResponse {
                try_role_switch: u8::from(try_role_switch),
            },
        );
        self.send_link_layer_packet(response);

        let awaiting_authentication = self.connections.authenticate_pending();
        let handle = self
            .connections
            .create_connection(address, self.local_address());
        if handle == RESERVED_HANDLE {
            warn!("Failed to create a connection for {}", address);
            return;
        }
        self.send_event(HciEvent::ConnectionComplete {
            status: ErrorCode::Success,
            handle,
            bd_addr: address,
            link_type: LinkType::Acl,
            encryption_enabled: false,
        });

        if awaiting_authentication {
            self.schedule_task(
                PAIRING_STEP_DELAY,
                Box::new(move |controller| {
                    controller.handle_authentication_request(address, handle)
                }),
            );
        }
    }

    pub fn reject_connection_request(&mut self, address: BdAddr, reason: u8) -> ErrorCode {
        if !self.connections.has_pending(address) {
            info!("No pending connection for {}", address);
            return ErrorCode::UnknownConnection;
        }
        self.schedule_task(
            PAGE_DECISION_DELAY,
            Box::new(move |controller| controller.reject_slave_connection(address, reason)),
        );
        ErrorCode::Success
    }

    fn reject_slave_connection(&mut self, address: BdAddr, reason: u8) {
        info!("Rejecting connection request from {} (reason 0x{:02x})", address, reason);
        self.connections.cancel_pending(address);
        let reject = LinkLayerPacket::new(
            self.local_address(),
            address,
            PacketBody::PageReject { reason },
        );
        self.send_link_layer_packet(reject);
        self.send_event(HciEvent::ConnectionComplete {
            status: ErrorCode::from_u8(reason),
            handle: RESERVED_HANDLE,
            bd_addr: address,
            link_type: LinkType::Acl,
            encryption_enabled: false,
        });
    }

    fn incoming_page_response(&mut self, source: BdAddr, destination: BdAddr) {
        info!("Page response from {}", source);
        let awaiting_authentication = self.connections.authenticate_pending();
        let handle = self.connections.create_connection(source, destination);
        if handle == RESERVED_HANDLE {
            warn!("No free handles");
            return;
        }
        self.send_event(HciEvent::ConnectionComplete {
            status: ErrorCode::Success,
            handle,
            bd_addr: source,
            link_type: LinkType::Acl,
            encryption_enabled: false,
        });

        if awaiting_authentication {
            self.schedule_task(
                PAIRING_STEP_DELAY,
                Box::new(move |controller| {
                    controller.handle_authentication_request(source, handle)
                }),
            );
        }
    }

    fn incoming_page_reject(&mut self, source: BdAddr, reason: u8) {
        info!("Page rejected by {} (reason 0x{:02x})", source, reason);
        self.connections.cancel_pending(source);
        self.send_event(HciEvent::ConnectionComplete {
            status: ErrorCode::from_u8(reason),
            handle: RESERVED_HANDLE,
            bd_addr: source,
            link_type: LinkType::Acl,
            encryption_enabled: false,
        });
    }

    // ------------------------------------------------------------------
    // Disconnection
    // ------------------------------------------------------------------

    pub fn disconnect(&mut self, handle: u16, reason: u8) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        if let (Some(remote), Some(phy)) = (
            self.connections.peer_address(handle),
            self.connections.phy(handle),
        ) {
            let packet = LinkLayerPacket::new(
                self.local_address(),
                remote.address,
                PacketBody::Disconnect { reason },
            );
            match phy {
                Phy::BrEdr => self.send_link_layer_packet(packet),
                Phy::LowEnergy => self.send_le_link_layer_packet(packet),
            }
        }
        if !self.connections.disconnect(handle) {
            error!("Failed to disconnect handle 0x{:03x}", handle);
        }
        self.schedule_task(
            DISCONNECT_CLEANUP_DELAY,
            Box::new(move |controller| {
                controller.disconnect_cleanup(
                    handle,
                    ErrorCode::ConnectionTerminatedByLocalHost.to_u8(),
                )
            }),
        );
        ErrorCode::Success
    }

    fn incoming_disconnect(&mut self, source: BdAddr, reason: u8) {
        debug!("Disconnect packet from {}", source);
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Discarding disconnect from a disconnected device {}", source);
            return;
        }
        if !self.connections.disconnect(handle) {
            error!("Failed to disconnect handle 0x{:03x}", handle);
            return;
        }
        self.schedule_task(
            DISCONNECT_CLEANUP_DELAY,
            Box::new(move |controller| controller.disconnect_cleanup(handle, reason)),
        );
    }

    fn disconnect_cleanup(&mut self, handle: u16, reason: u8) {
        self.send_event(HciEvent::DisconnectionComplete {
            status: ErrorCode::Success,
            handle,
            reason: ErrorCode::from_u8(reason),
        });
    }

    // ------------------------------------------------------------------
    // Link policy and validated-but-unimplemented operations
    // ------------------------------------------------------------------

    pub fn change_connection_packet_type(&mut self, handle: u16, packet_type: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        self.schedule_task(
            PACKET_TYPE_CHANGED_DELAY,
            Box::new(move |controller| {
                controller.send_event(HciEvent::ConnectionPacketTypeChanged {
                    status: ErrorCode::Success,
                    handle,
                    packet_type,
                });
            }),
        );
        ErrorCode::Success
    }

    pub fn change_connection_link_key(&mut self, handle: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn master_link_key(&mut self, _key_flag: u8) -> ErrorCode {
        ErrorCode::CommandDisallowed
    }

    pub fn hold_mode(&mut self, handle: u16, max_interval: u16, min_interval: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        if max_interval < min_interval {
            return ErrorCode::InvalidHciCommandParameters;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn sniff_mode(
        &mut self,
        handle: u16,
        max_interval: u16,
        min_interval: u16,
        attempt: u16,
        timeout: u16,
    ) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        if max_interval < min_interval || attempt < 0x0001 || attempt > 0x7FFF || timeout > 0x7FFF {
            return ErrorCode::InvalidHciCommandParameters;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn exit_sniff_mode(&mut self, handle: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn qos_setup(&mut self, handle: u16, service_type: u8) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        if service_type > 0x02 {
            return ErrorCode::InvalidHciCommandParameters;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn switch_role(&mut self, _address: BdAddr, _role: u8) -> ErrorCode {
        ErrorCode::CommandDisallowed
    }

    pub fn flow_specification(
        &mut self,
        handle: u16,
        flow_direction: u8,
        service_type: u8,
    ) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        if flow_direction > 0x01 || service_type > 0x02 {
            return ErrorCode::InvalidHciCommandParameters;
        }
        ErrorCode::CommandDisallowed
    }

    pub fn write_link_policy_settings(&mut self, handle: u16, _settings: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        ErrorCode::Success
    }

    pub fn write_default_link_policy_settings(&mut self, settings: u16) -> ErrorCode {
        if settings > LINK_POLICY_SETTINGS_MAX {
            return ErrorCode::InvalidHciCommandParameters;
        }
        self.default_link_policy_settings = settings;
        ErrorCode::Success
    }

    pub fn read_default_link_policy_settings(&self) -> u16 {
        self.default_link_policy_settings
    }

    pub fn write_link_supervision_timeout(&mut self, handle: u16, _timeout: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        ErrorCode::Success
    }

    // ------------------------------------------------------------------
    // Authentication and secure simple pairing (C2 flows)
    // ------------------------------------------------------------------

    /// Only simple pairing is implemented; the host contract forbids
    /// disabling it.
    pub fn write_simple_pairing_mode(&mut self, enabled: bool) {
        assert!(enabled, "The spec says don't disable this!");
        self.simple_pairing_mode_enabled = enabled;
    }

    pub fn authentication_requested(&mut self, handle: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            info!("Authentication requested for unknown handle 0x{:03x}", handle);
            return ErrorCode::UnknownConnection;
        }
        let remote = match self.connections.peer_address(handle) {
            Some(remote) => remote,
            None => return ErrorCode::UnknownConnection,
        };
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.handle_authentication_request(remote.address, handle)
            }),
        );
        ErrorCode::Success
    }

    fn handle_authentication_request(&mut self, address: BdAddr, handle: u16) {
        if self.simple_pairing_mode_enabled {
            self.security_manager.authentication_request(address, handle);
            self.send_event(HciEvent::LinkKeyRequest { bd_addr: address });
        } else {
            self.send_event(HciEvent::AuthenticationComplete {
                status: ErrorCode::AuthenticationFailure,
                handle,
            });
        }
    }

    pub fn link_key_request_reply(&mut self, address: BdAddr, key: [u8; 16]) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        self.security_manager.write_key(address, key);
        self.security_manager.authentication_request_finished();
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| controller.authenticate_remote_stage2(address)),
        );
        ErrorCode::Success
    }

    pub fn link_key_request_negative_reply(&mut self, address: BdAddr) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        self.security_manager.delete_key(address);
        // No key; run simple pairing to mint one
        let handle = self.connections.handle_for_address(address);
        if handle == RESERVED_HANDLE {
            info!("Device not connected: {}", address);
            return ErrorCode::UnknownConnection;
        }
        self.security_manager.authentication_request(address, handle);
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| controller.start_simple_pairing(address)),
        );
        ErrorCode::Success
    }

    fn start_simple_pairing(&mut self, address: BdAddr) {
        // IO capability exchange comes first
        self.send_event(HciEvent::IoCapabilityRequest { bd_addr: address });
    }

    pub fn io_capability_request_reply(
        &mut self,
        address: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    ) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        self.security_manager.set_local_io_capability(
            address,
            io_capability,
            oob_data_present,
            authentication_requirements,
        );

        let pairing_type = self.security_manager.simple_pairing_type();
        if pairing_type != PairingType::Invalid {
            self.schedule_task(
                PAIRING_STEP_DELAY,
                Box::new(move |controller| {
                    controller.authenticate_remote_stage1(address, pairing_type)
                }),
            );
            let response = LinkLayerPacket::new(
                self.local_address(),
                address,
                PacketBody::IoCapabilityResponse {
                    io_capability,
                    oob_data_present,
                    authentication_requirements,
                },
            );
            self.send_link_layer_packet(response);
        } else {
            info!("Requesting remote capability");
            let request = LinkLayerPacket::new(
                self.local_address(),
                address,
                PacketBody::IoCapabilityRequest {
                    io_capability,
                    oob_data_present,
                    authentication_requirements,
                },
            );
            self.send_link_layer_packet(request);
        }
        ErrorCode::Success
    }

    pub fn io_capability_request_negative_reply(
        &mut self,
        address: BdAddr,
        reason: ErrorCode,
    ) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        self.security_manager.invalidate_io_capabilities();
        let response = LinkLayerPacket::new(
            self.local_address(),
            address,
            PacketBody::IoCapabilityNegativeResponse {
                reason: reason.to_u8(),
            },
        );
        self.send_link_layer_packet(response);
        ErrorCode::Success
    }

    fn incoming_io_capability_request(
        &mut self,
        source: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    ) {
        debug!("IO capability request from {}", source);
        if !self.simple_pairing_mode_enabled {
            warn!("Only simple pairing mode is implemented");
            return;
        }
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Device not connected: {}", source);
            return;
        }

        self.security_manager.authentication_request(source, handle);
        self.security_manager.set_peer_io_capability(
            source,
            io_capability,
            oob_data_present,
            authentication_requirements,
        );

        self.send_event(HciEvent::IoCapabilityResponse {
            bd_addr: source,
            io_capability,
            oob_data_present,
            authentication_requirements,
        });

        self.start_simple_pairing(source);
    }

    fn incoming_io_capability_response(
        &mut self,
        source: BdAddr,
        io_capability: u8,
        oob_data_present: u8,
        authentication_requirements: u8,
    ) {
        debug!("IO capability response from {}", source);
        self.security_manager.set_peer_io_capability(
            source,
            io_capability,
            oob_data_present,
            authentication_requirements,
        );
        self.send_event(HciEvent::IoCapabilityResponse {
            bd_addr: source,
            io_capability,
            oob_data_present,
            authentication_requirements,
        });

        let pairing_type = self.security_manager.simple_pairing_type();
        if pairing_type != PairingType::Invalid {
            self.schedule_task(
                PAIRING_STEP_DELAY,
                Box::new(move |controller| {
                    controller.authenticate_remote_stage1(source, pairing_type)
                }),
            );
        } else {
            info!("Security manager returned INVALID");
        }
    }

    fn incoming_io_capability_negative_response(&mut self, source: BdAddr) {
        if self.security_manager.authentication_address() != Some(source) {
            warn!("Negative IO capability response from unexpected peer {}", source);
            return;
        }
        self.security_manager.invalidate_io_capabilities();
    }

    fn authenticate_remote_stage1(&mut self, peer: BdAddr, pairing_type: PairingType) {
        if self.security_manager.authentication_address() != Some(peer) {
            warn!("Stage 1 for {} without a matching authentication", peer);
            return;
        }
        match pairing_type {
            PairingType::AutoConfirmation
            | PairingType::ConfirmYN
            | PairingType::DisplayPin
            | PairingType::DisplayAndConfirm => {
                self.send_event(HciEvent::UserConfirmationRequest {
                    bd_addr: peer,
                    numeric_value: PAIRING_NUMERIC_VALUE,
                });
            }
            PairingType::InputPin => {
                self.send_event(HciEvent::UserPasskeyRequest { bd_addr: peer });
            }
            PairingType::Invalid => {
                error!("Cannot start stage 1 with an invalid pairing type");
            }
        }
    }

    fn authenticate_remote_stage2(&mut self, peer: BdAddr) {
        let handle = match self.security_manager.authentication_handle() {
            Some(handle) if self.security_manager.authentication_address() == Some(peer) => handle,
            _ => {
                warn!("Stage 2 for {} without a matching authentication", peer);
                return;
            }
        };
        self.send_event(HciEvent::AuthenticationComplete {
            status: ErrorCode::Success,
            handle,
        });
    }

    pub fn user_confirmation_request_reply(&mut self, address: BdAddr) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        // The key would be derived here on real hardware
        let key: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        self.security_manager.write_key(address, key);
        self.security_manager.authentication_request_finished();

        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.send_event(HciEvent::SimplePairingComplete {
                    status: ErrorCode::Success,
                    bd_addr: address,
                });
            }),
        );
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.send_event(HciEvent::LinkKeyNotification {
                    bd_addr: address,
                    key,
                    key_type: KEY_TYPE_AUTHENTICATED_P256,
                });
            }),
        );
        self.schedule_task(
            PAIRING_FINISH_DELAY,
            Box::new(move |controller| controller.authenticate_remote_stage2(address)),
        );
        ErrorCode::Success
    }

    pub fn user_confirmation_request_negative_reply(&mut self, address: BdAddr) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.send_event(HciEvent::SimplePairingComplete {
                    status: ErrorCode::AuthenticationFailure,
                    bd_addr: address,
                });
            }),
        );
        ErrorCode::Success
    }

    pub fn user_passkey_request_reply(&mut self, address: BdAddr, numeric_value: u32) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        debug!("Passkey {:06} entered for {}", numeric_value, address);
        ErrorCode::Success
    }

    pub fn user_passkey_request_negative_reply(&mut self, address: BdAddr) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        ErrorCode::Success
    }

    pub fn remote_oob_data_request_reply(
        &mut self,
        address: BdAddr,
        c: &[u8],
        r: &[u8],
    ) -> ErrorCode {
        if c.is_empty() || r.is_empty() {
            return ErrorCode::InvalidHciCommandParameters;
        }
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        debug!("OOB data for {}: c[0]=0x{:02x} r[0]=0x{:02x}", address, c[0], r[0]);
        ErrorCode::Success
    }

    pub fn remote_oob_data_request_negative_reply(&mut self, address: BdAddr) -> ErrorCode {
        if self.security_manager.authentication_address() != Some(address) {
            return ErrorCode::AuthenticationFailure;
        }
        ErrorCode::Success
    }

    // ------------------------------------------------------------------
    // BR/EDR encryption (C7)
    // ------------------------------------------------------------------

    pub fn set_connection_encryption(&mut self, handle: u16, encryption_enable: u8) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            info!("Set connection encryption for unknown handle 0x{:03x}", handle);
            return ErrorCode::UnknownConnection;
        }
        if self.connections.is_encrypted(handle) && encryption_enable == 0 {
            return ErrorCode::EncryptionModeNotAcceptable;
        }
        let remote = match self.connections.peer_address(handle) {
            Some(remote) => remote,
            None => return ErrorCode::UnknownConnection,
        };
        if self.security_manager.read_key(remote.address) == 0 {
            return ErrorCode::PinOrKeyMissing;
        }
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.handle_set_connection_encryption(
                    remote.address,
                    handle,
                    encryption_enable,
                )
            }),
        );
        ErrorCode::Success
    }

    fn handle_set_connection_encryption(
        &mut self,
        peer: BdAddr,
        handle: u16,
        encryption_enable: u8,
    ) {
        if self.connections.is_encrypted(handle) && encryption_enable != 0 {
            self.send_event(HciEvent::EncryptionChange {
                status: ErrorCode::Success,
                handle,
                encryption_enabled: true,
            });
            return;
        }
        let key = match self.security_manager.get_key(peer) {
            Some(key) => key,
            None => {
                error!("No key stored for {}", peer);
                return;
            }
        };
        let packet = LinkLayerPacket::new(
            self.local_address(),
            peer,
            PacketBody::EncryptConnection { key },
        );
        self.send_link_layer_packet(packet);
    }

    fn incoming_encrypt_connection(&mut self, source: BdAddr, _key: [u8; 16]) {
        debug!("Encrypt connection from {}", source);
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Unknown connection @{}", source);
            return;
        }
        self.connections.encrypt(handle);
        self.send_event(HciEvent::EncryptionChange {
            status: ErrorCode::Success,
            handle,
            encryption_enabled: true,
        });

        let key = match self.security_manager.get_key(source) {
            Some(key) => key,
            None => {
                error!("No key stored for {}", source);
                return;
            }
        };
        let response = LinkLayerPacket::new(
            self.local_address(),
            source,
            PacketBody::EncryptConnectionResponse { key },
        );
        self.send_link_layer_packet(response);
    }

    fn incoming_encrypt_connection_response(&mut self, source: BdAddr) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Unknown connection @{}", source);
            return;
        }
        self.connections.encrypt(handle);
        self.send_event(HciEvent::EncryptionChange {
            status: ErrorCode::Success,
            handle,
            encryption_enabled: true,
        });
    }

    // ------------------------------------------------------------------
    // LE encryption (C7)
    // ------------------------------------------------------------------

    pub fn le_enable_encryption(
        &mut self,
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    ) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            info!("Unknown handle 0x{:03x}", handle);
            return ErrorCode::UnknownConnection;
        }
        self.schedule_task(
            PAIRING_STEP_DELAY,
            Box::new(move |controller| {
                controller.handle_le_enable_encryption(handle, rand, ediv, ltk)
            }),
        );
        ErrorCode::Success
    }

    fn handle_le_enable_encryption(
        &mut self,
        handle: u16,
        rand: [u8; 8],
        ediv: u16,
        ltk: [u8; 16],
    ) {
        if !self.connections.has_handle(handle) {
            return;
        }
        let (own, peer) = match (
            self.connections.own_address(handle),
            self.connections.peer_address(handle),
        ) {
            (Some(own), Some(peer)) => (own, peer),
            _ => return,
        };
        let packet = LinkLayerPacket::new(
            own.address,
            peer.address,
            PacketBody::LeEncryptConnection { rand, ediv, ltk },
        );
        self.send_le_link_layer_packet(packet);
    }

    fn incoming_le_encrypt_connection(&mut self, source: BdAddr, rand: [u8; 8], ediv: u16) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Unknown connection @{}", source);
            return;
        }
        self.send_event(HciEvent::LeLongTermKeyRequest { handle, rand, ediv });
    }

    pub fn le_long_term_key_request_reply(&mut self, handle: u16, ltk: [u8; 16]) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            info!("Unknown handle 0x{:03x}", handle);
            return ErrorCode::UnknownConnection;
        }
        if self.connections.is_encrypted(handle) {
            self.send_event(HciEvent::EncryptionKeyRefreshComplete {
                status: ErrorCode::Success,
                handle,
            });
        } else {
            self.connections.encrypt(handle);
            self.send_event(HciEvent::EncryptionChange {
                status: ErrorCode::Success,
                handle,
                encryption_enabled: true,
            });
        }
        self.send_le_encrypt_response(handle, ltk);
        ErrorCode::Success
    }

    pub fn le_long_term_key_request_negative_reply(&mut self, handle: u16) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            info!("Unknown handle 0x{:03x}", handle);
            return ErrorCode::UnknownConnection;
        }
        self.send_le_encrypt_response(handle, [0u8; 16]);
        ErrorCode::Success
    }

    fn send_le_encrypt_response(&mut self, handle: u16, ltk: [u8; 16]) {
        let (own, peer) = match (
            self.connections.own_address(handle),
            self.connections.peer_address(handle),
        ) {
            (Some(own), Some(peer)) => (own, peer),
            _ => return,
        };
        let response = LinkLayerPacket::new(
            own.address,
            peer.address,
            PacketBody::LeEncryptConnectionResponse {
                rand: [0u8; 8],
                ediv: 0,
                ltk,
            },
        );
        self.send_le_link_layer_packet(response);
    }

    fn incoming_le_encrypt_connection_response(&mut self, source: BdAddr, ltk: [u8; 16]) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Unknown connection @{}", source);
            return;
        }
        // A zero LTK is a rejection
        let status = if ltk == [0u8; 16] {
            ErrorCode::AuthenticationFailure
        } else {
            ErrorCode::Success
        };

        if self.connections.is_encrypted(handle) {
            self.send_event(HciEvent::EncryptionKeyRefreshComplete { status, handle });
        } else {
            self.connections.encrypt(handle);
            self.send_event(HciEvent::EncryptionChange {
                status,
                handle,
                encryption_enabled: true,
            });
        }
    }

    // ------------------------------------------------------------------
    // Remote information (C8)
    // ------------------------------------------------------------------

    pub fn remote_name_request(&mut self, address: BdAddr) -> ErrorCode {
        // LMP features ride along with remote name requests
        let features = LinkLayerPacket::new(
            self.local_address(),
            address,
            PacketBody::ReadRemoteLmpFeatures,
        );
        self.send_link_layer_packet(features);
        let request =
            LinkLayerPacket::new(self.local_address(), address, PacketBody::RemoteNameRequest);
        self.send_link_layer_packet(request);
        ErrorCode::Success
    }

    pub fn read_remote_supported_features(&mut self, handle: u16) -> ErrorCode {
        self.send_remote_info_request(handle, PacketBody::ReadRemoteSupportedFeatures)
    }

    pub fn read_remote_extended_features(&mut self, handle: u16, page_number: u8) -> ErrorCode {
        self.send_remote_info_request(
            handle,
            PacketBody::ReadRemoteExtendedFeatures { page_number },
        )
    }

    pub fn read_remote_version_information(&mut self, handle: u16) -> ErrorCode {
        self.send_remote_info_request(handle, PacketBody::ReadRemoteVersionInformation)
    }

    pub fn read_clock_offset(&mut self, handle: u16) -> ErrorCode {
        self.send_remote_info_request(handle, PacketBody::ReadClockOffset)
    }

    fn send_remote_info_request(&mut self, handle: u16, body: PacketBody) -> ErrorCode {
        let remote = match self.connections.peer_address(handle) {
            Some(remote) => remote,
            None => return ErrorCode::UnknownConnection,
        };
        let packet = LinkLayerPacket::new(self.local_address(), remote.address, body);
        self.send_link_layer_packet(packet);
        ErrorCode::Success
    }

    fn incoming_remote_name_request(&mut self, source: BdAddr, destination: BdAddr) {
        let response = LinkLayerPacket::new(
            destination,
            source,
            PacketBody::RemoteNameRequestResponse {
                name: self.properties.name.clone(),
            },
        );
        self.send_link_layer_packet(response);
    }

    fn incoming_read_remote_supported_features_response(&mut self, source: BdAddr, features: u64) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Discarding response from a disconnected device {}", source);
            return;
        }
        self.send_event(HciEvent::ReadRemoteSupportedFeaturesComplete {
            status: ErrorCode::Success,
            handle,
            features,
        });
    }

    fn incoming_read_remote_extended_features(
        &mut self,
        source: BdAddr,
        destination: BdAddr,
        page_number: u8,
    ) {
        let max_page_number = self.properties.max_extended_features_page();
        let status = if page_number > max_page_number {
            ErrorCode::InvalidLmpOrLlParameters
        } else {
            ErrorCode::Success
        };
        let response = LinkLayerPacket::new(
            destination,
            source,
            PacketBody::ReadRemoteExtendedFeaturesResponse {
                status: status.to_u8(),
                page_number,
                max_page_number,
                features: self.properties.extended_features_page(page_number),
            },
        );
        self.send_link_layer_packet(response);
    }

    fn incoming_read_remote_extended_features_response(
        &mut self,
        source: BdAddr,
        status: u8,
        page_number: u8,
        max_page_number: u8,
        features: u64,
    ) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Discarding response from a disconnected device {}", source);
            return;
        }
        self.send_event(HciEvent::ReadRemoteExtendedFeaturesComplete {
            status: ErrorCode::from_u8(status),
            handle,
            page_number,
            max_page_number,
            features,
        });
    }

    fn incoming_read_remote_version_response(
        &mut self,
        source: BdAddr,
        lmp_version: u8,
        manufacturer_name: u16,
        lmp_subversion: u16,
    ) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Discarding response from a disconnected device {}", source);
            return;
        }
        self.send_event(HciEvent::ReadRemoteVersionInformationComplete {
            status: ErrorCode::Success,
            handle,
            lmp_version,
            manufacturer_name,
            lmp_subversion,
        });
    }

    fn incoming_read_clock_offset_response(&mut self, source: BdAddr, offset: u16) {
        let handle = self.connections.handle_for_address(source);
        if handle == RESERVED_HANDLE {
            info!("Discarding response from a disconnected device {}", source);
            return;
        }
        self.send_event(HciEvent::ReadClockOffsetComplete {
            status: ErrorCode::Success,
            handle,
            clock_offset: offset,
        });
    }

    // ------------------------------------------------------------------
    // Inquiry (C5)
    // ------------------------------------------------------------------

    pub fn set_inquiry_scan_enable(&mut self, enable: bool) {
        self.inquiry_scans_enabled = enable;
    }

    pub fn set_page_scan_enable(&mut self, enable: bool) {
        self.page_scans_enabled = enable;
    }

    pub fn set_inquiry_mode(&mut self, mode: u8) {
        self.inquiry_mode = InquiryType::from(mode);
    }

    pub fn set_inquiry_lap(&mut self, lap: u64) {
        self.inquiry_lap = lap;
    }

    pub fn set_inquiry_max_responses(&mut self, max: u8) {
        self.inquiry_max_responses = max;
    }

    pub fn start_inquiry(&mut self, timeout: Duration) {
        let task_id = self.schedule_task(
            timeout,
            Box::new(move |controller| controller.inquiry_timeout()),
        );
        self.inquiry_timer_task_id = task_id;
    }

    pub fn inquiry_cancel(&mut self) {
        if self.inquiry_timer_task_id != INVALID_TASK_ID {
            let task_id = self.inquiry_timer_task_id;
            self.inquiry_timer_task_id = INVALID_TASK_ID;
            self.cancel_task(task_id);
        }
    }

    fn inquiry_timeout(&mut self) {
        if self.inquiry_timer_task_id != INVALID_TASK_ID {
            self.inquiry_timer_task_id = INVALID_TASK_ID;
            self.send_event(HciEvent::InquiryComplete {
                status: ErrorCode::Success,
            });
        }
    }

    fn inquiry_step(&mut self, now: Instant) {
        if let Some(last) = self.last_inquiry {
            if now.saturating_duration_since(last) < INQUIRY_COOLDOWN {
                return;
            }
        }
        debug!(
            "Inquiry (lap 0x{:06x}, max responses {})",
            self.inquiry_lap, self.inquiry_max_responses
        );
        let packet = LinkLayerPacket::new(
            self.local_address(),
            BdAddr::EMPTY,
            PacketBody::Inquiry {
                inquiry_type: self.inquiry_mode,
            },
        );
        self.send_link_layer_packet(packet);
        self.last_inquiry = Some(now);
    }

    fn incoming_inquiry(&mut self, source: BdAddr, inquiry_type: InquiryType) {
        let body = match inquiry_type {
            InquiryType::Standard => PacketBody::InquiryResponse {
                page_scan_repetition_mode: self.properties.page_scan_repetition_mode,
                class_of_device: self.properties.class_of_device,
                clock_offset: self.properties.clock_offset,
            },
            InquiryType::Rssi => PacketBody::InquiryResponseWithRssi {
                page_scan_repetition_mode: self.properties.page_scan_repetition_mode,
                class_of_device: self.properties.class_of_device,
                clock_offset: self.properties.clock_offset,
                rssi: self.rssi.next(),
            },
            InquiryType::Extended => PacketBody::ExtendedInquiryResponse {
                page_scan_repetition_mode: self.properties.page_scan_repetition_mode,
                class_of_device: self.properties.class_of_device,
                clock_offset: self.properties.clock_offset,
                rssi: self.rssi.next(),
                extended_data: self.properties.extended_inquiry_data.clone(),
            },
        };
        let response = LinkLayerPacket::new(self.local_address(), source, body);
        self.send_link_layer_packet(response);
    }

    // ------------------------------------------------------------------
    // LE advertising (C3 plumbing)
    // ------------------------------------------------------------------

    pub fn set_le_advertising_enable(&mut self, enable: bool) -> ErrorCode {
        if !enable {
            if let Some(advertiser) = self.advertisers.get_mut(0) {
                advertiser.disable();
            }
            return ErrorCode::Success;
        }

        let interval_units = u64::from(self.properties.le_advertising_interval_min)
            + u64::from(self.properties.le_advertising_interval_max);
        let interval = Duration::from_micros(interval_units * 625 / 2);
        if interval < MIN_ADVERTISING_INTERVAL {
            return ErrorCode::InvalidHciCommandParameters;
        }

        let own_address_type = self.properties.le_advertising_own_address_type;
        let own_address = match own_address_type {
            AddressType::Random | AddressType::RandomIdentity => {
                if self.properties.le_address.is_empty() {
                    return ErrorCode::InvalidHciCommandParameters;
                }
                self.properties.le_address
            }
            _ => self.properties.address,
        };

        let peer = AddressWithType::new(
            self.properties.le_advertising_peer_address,
            self.properties.le_advertising_peer_address_type,
        );
        let advertisement_type = AdvertisementType::from(self.properties.le_advertising_type);
        let advertisement = self.properties.le_advertisement.clone();
        let scan_response = self.properties.le_scan_response.clone();
        let filter_policy = self.properties.le_advertising_filter_policy;

        let advertiser = match self.advertisers.get_mut(0) {
            Some(advertiser) => advertiser,
            None => return ErrorCode::CommandDisallowed,
        };
        advertiser.initialize(
            AddressWithType::new(own_address, own_address_type),
            peer,
            filter_policy,
            advertisement_type,
            advertisement,
            scan_response,
            interval,
        );
        advertiser.enable();
        ErrorCode::Success
    }

    pub fn set_le_extended_address(&mut self, set: u8, address: BdAddr) -> ErrorCode {
        match self.advertisers.get_mut(usize::from(set)) {
            Some(advertiser) => {
                advertiser.set_address(address);
                ErrorCode::Success
            }
            None => ErrorCode::InvalidHciCommandParameters,
        }
    }

    pub fn set_le_extended_advertising_data(&mut self, set: u8, data: Vec<u8>) -> ErrorCode {
        match self.advertisers.get_mut(usize::from(set)) {
            Some(advertiser) => {
                advertiser.set_data(data);
                ErrorCode::Success
            }
            None => ErrorCode::InvalidHciCommandParameters,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_le_extended_advertising_parameters(
        &mut self,
        set: u8,
        interval_min: u16,
        interval_max: u16,
        advertising_type: LegacyAdvertisingProperties,
        own_address_type: OwnAddressType,
        peer_address_type: u8,
        peer: BdAddr,
        filter_policy: u8,
    ) -> ErrorCode {
        let (advertisement_type, peer) = match advertising_type {
            LegacyAdvertisingProperties::AdvInd => (AdvertisementType::AdvInd, BdAddr::EMPTY),
            LegacyAdvertisingProperties::AdvNonconnInd => {
                (AdvertisementType::AdvNonconnInd, BdAddr::EMPTY)
            }
            LegacyAdvertisingProperties::AdvScanInd => {
                (AdvertisementType::AdvScanInd, BdAddr::EMPTY)
            }
            LegacyAdvertisingProperties::AdvDirectIndHigh
            | LegacyAdvertisingProperties::AdvDirectIndLow => {
                (AdvertisementType::AdvDirectInd, peer)
            }
        };
        let interval_units = u64::from(interval_min) + u64::from(interval_max);
        let interval = Duration::from_micros(interval_units * 625 / 2);

        let peer_address = AddressWithType::new(
            peer,
            if peer_address_type == 0x01 {
                AddressType::Random
            } else {
                AddressType::Public
            },
        );
        let own_address_type = match own_address_type {
            OwnAddressType::PublicDevice => AddressType::Public,
            OwnAddressType::RandomDevice => AddressType::Random,
            OwnAddressType::ResolvableOrPublic => AddressType::PublicIdentity,
            OwnAddressType::ResolvableOrRandom => AddressType::RandomIdentity,
        };

        match self.advertisers.get_mut(usize::from(set)) {
            Some(advertiser) => {
                advertiser.initialize_extended(
                    own_address_type,
                    peer_address,
                    filter_policy,
                    advertisement_type,
                    interval,
                );
                ErrorCode::Success
            }
            None => ErrorCode::InvalidHciCommandParameters,
        }
    }

    /// Enable or disable the listed extended advertising slots;
    /// durations are in 10 ms units, zero meaning unlimited
    pub fn set_le_extended_advertising_enable(
        &mut self,
        enable: bool,
        sets: &[(u8, u16)],
    ) -> ErrorCode {
        for (set, _) in sets {
            if usize::from(*set) >= self.advertisers.len() {
                return ErrorCode::InvalidHciCommandParameters;
            }
        }
        for (set, duration) in sets {
            if let Some(advertiser) = self.advertisers.get_mut(usize::from(*set)) {
                if enable {
                    advertiser.enable_extended(Duration::from_millis(10 * u64::from(*duration)));
                } else {
                    advertiser.disable();
                }
            }
        }
        ErrorCode::Success
    }

    pub fn le_remove_advertising_set(&mut self, set: u8) -> ErrorCode {
        match self.advertisers.get_mut(usize::from(set)) {
            Some(advertiser) => {
                advertiser.disable();
                ErrorCode::Success
            }
            None => ErrorCode::InvalidHciCommandParameters,
        }
    }

    pub fn le_clear_advertising_sets(&mut self) -> ErrorCode {
        if self.advertisers.iter().any(|a| a.is_enabled()) {
            return ErrorCode::CommandDisallowed;
        }
        for advertiser in &mut self.advertisers {
            advertiser.clear();
        }
        ErrorCode::Success
    }

    pub fn le_disable_advertising_sets(&mut self) {
        for advertiser in &mut self.advertisers {
            advertiser.disable();
        }
    }

    pub fn le_read_number_of_supported_advertising_sets(&self) -> u8 {
        self.advertisers.len() as u8
    }

    fn le_advertising(&mut self, now: Instant) {
        let advertisements: Vec<LinkLayerPacket> = self
            .advertisers
            .iter_mut()
            .filter_map(|advertiser| advertiser.get_advertisement(now))
            .collect();
        for advertisement in advertisements {
            self.send_le_link_layer_packet(advertisement);
        }
    }

    // ------------------------------------------------------------------
    // LE scanning and initiating (C6)
    // ------------------------------------------------------------------

    pub fn set_le_scan_enable(&mut self, enable: bool) {
        self.le_scan_mode = if enable {
            LeScanMode::Legacy
        } else {
            LeScanMode::Disabled
        };
    }

    pub fn set_le_extended_scan_enable(&mut self, enable: bool) {
        self.le_scan_mode = if enable {
            LeScanMode::Extended
        } else {
            LeScanMode::Disabled
        };
    }

    /// Scan type: 0 = passive, 1 = active
    pub fn set_le_scan_type(&mut self, scan_type: u8) {
        self.le_scan_type = scan_type;
    }

    pub fn le_scan_mode(&self) -> LeScanMode {
        self.le_scan_mode
    }

    #[allow(clippy::too_many_arguments)]
    pub fn le_create_connection(
        &mut self,
        peer_address: BdAddr,
        peer_address_type: u8,
        own_address_type: OwnAddressType,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
    ) -> ErrorCode {
        if self.initiator.armed {
            return ErrorCode::CommandDisallowed;
        }
        self.initiator = LeInitiator {
            armed: true,
            peer_address,
            peer_address_type: AddressType::from(peer_address_type),
            own_address_type,
            interval_min,
            interval_max,
            latency,
            supervision_timeout,
        };
        ErrorCode::Success
    }

    pub fn le_create_connection_cancel(&mut self) -> ErrorCode {
        if !self.initiator.armed {
            return ErrorCode::CommandDisallowed;
        }
        self.initiator.armed = false;
        ErrorCode::Success
    }

    fn incoming_le_advertisement(
        &mut self,
        source: BdAddr,
        address_type: AddressType,
        advertisement_type: AdvertisementType,
        data: Vec<u8>,
    ) {
        if self.le_scan_mode == LeScanMode::Legacy {
            let rssi = self.rssi.next();
            self.send_event(HciEvent::LeAdvertisingReport {
                event_type: u8::from(advertisement_type),
                address_type,
                address: source,
                data: data.clone(),
                rssi,
            });
        }

        if self.le_scan_mode == LeScanMode::Extended {
            let event_type = match advertisement_type {
                AdvertisementType::AdvInd => Some(EXT_EVENT_TYPE_ADV_IND),
                AdvertisementType::AdvDirectInd => Some(EXT_EVENT_TYPE_ADV_DIRECT_IND),
                AdvertisementType::AdvScanInd => Some(EXT_EVENT_TYPE_ADV_SCAN_IND),
                AdvertisementType::AdvNonconnInd => Some(EXT_EVENT_TYPE_ADV_NONCONN_IND),
                // Scan responses are reported from the scan-response
                // path, not here
                AdvertisementType::ScanResponse => None,
            };
            if let Some(event_type) = event_type {
                let rssi = self.rssi.next();
                self.send_event(extended_report(
                    event_type,
                    address_type,
                    source,
                    rssi,
                    data.clone(),
                ));
            }
        }

        // Active scanning
        if self.le_scan_mode != LeScanMode::Disabled && self.le_scan_type == 1 {
            let scan = LinkLayerPacket::new(self.properties.le_address, source, PacketBody::LeScan);
            self.send_le_link_layer_packet(scan);
        }

        // Connect while the initiator is armed and the advertiser is
        // either the configured peer or on the connect list
        let connectable = matches!(
            advertisement_type,
            AdvertisementType::AdvInd | AdvertisementType::AdvDirectInd
        );
        let matches_peer = self.initiator.peer_address == source
            && self.initiator.peer_address_type == address_type;
        if self.initiator.armed
            && connectable
            && (matches_peer || self.lists.connect_list_contains(source, u8::from(address_type)))
        {
            if !self
                .connections
                .create_le_pending(AddressWithType::new(source, address_type))
            {
                warn!(
                    "Failed to create a pending LE connection to {} (type {:?})",
                    source, address_type
                );
            }
            let own_address = match self.initiator.own_address_type {
                OwnAddressType::PublicDevice | OwnAddressType::ResolvableOrPublic => {
                    self.properties.address
                }
                OwnAddressType::RandomDevice | OwnAddressType::ResolvableOrRandom => {
                    self.properties.le_address
                }
            };
            info!(
                "Connecting to {} (type {:?}) own address {}",
                source, address_type, own_address
            );
            let own_address_type = match self.initiator.own_address_type {
                OwnAddressType::PublicDevice => AddressType::Public,
                OwnAddressType::RandomDevice => AddressType::Random,
                OwnAddressType::ResolvableOrPublic => AddressType::PublicIdentity,
                OwnAddressType::ResolvableOrRandom => AddressType::RandomIdentity,
            };
            self.initiator.armed = false;
            self.le_scan_mode = LeScanMode::Disabled;

            let connect = LinkLayerPacket::new(
                own_address,
                source,
                PacketBody::LeConnect {
                    interval_min: self.initiator.interval_min,
                    interval_max: self.initiator.interval_max,
                    latency: self.initiator.latency,
                    supervision_timeout: self.initiator.supervision_timeout,
                    address_type: own_address_type,
                },
            );
            self.send_le_link_layer_packet(connect);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn incoming_le_connect(
        &mut self,
        source: BdAddr,
        destination: BdAddr,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
        address_type: AddressType,
    ) {
        let connection_interval =
            ((u32::from(interval_min) + u32::from(interval_max)) / 2) as u16;
        let peer = AddressWithType::new(source, address_type);
        if !self.connections.create_le_pending(peer) {
            warn!(
                "Failed to create a pending LE connection from {} (type {:?})",
                source, address_type
            );
            return;
        }

        let my_address = self
            .advertisers
            .iter()
            .find(|a| a.is_enabled() && a.address().address == destination)
            .map(|a| a.address());
        let my_address = match my_address {
            Some(address) => address,
            None => {
                info!("Dropping unmatched connection request to {}", source);
                return;
            }
        };

        self.handle_le_connection(
            peer,
            my_address,
            Role::Slave,
            connection_interval,
            latency,
            supervision_timeout,
        );

        let complete = LinkLayerPacket::new(
            destination,
            source,
            PacketBody::LeConnectComplete {
                interval: connection_interval,
                latency,
                supervision_timeout,
                address_type: my_address.address_type,
            },
        );
        self.send_le_link_layer_packet(complete);
    }

    fn incoming_le_connect_complete(
        &mut self,
        source: BdAddr,
        destination: BdAddr,
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
        address_type: AddressType,
    ) {
        let own_address_type = match self.initiator.own_address_type {
            OwnAddressType::PublicDevice => AddressType::Public,
            OwnAddressType::RandomDevice => AddressType::Random,
            OwnAddressType::ResolvableOrPublic => AddressType::PublicIdentity,
            OwnAddressType::ResolvableOrRandom => AddressType::RandomIdentity,
        };
        self.handle_le_connection(
            AddressWithType::new(source, address_type),
            AddressWithType::new(destination, own_address_type),
            Role::Master,
            interval,
            latency,
            supervision_timeout,
        );
    }

    fn handle_le_connection(
        &mut self,
        peer: AddressWithType,
        own: AddressWithType,
        role: Role,
        connection_interval: u16,
        connection_latency: u16,
        supervision_timeout: u16,
    ) {
        let handle = self.connections.create_le_connection(peer, own);
        if handle == RESERVED_HANDLE {
            warn!("No pending connection for connection from {}", peer);
            return;
        }
        self.send_event(HciEvent::LeConnectionComplete {
            status: ErrorCode::Success,
            handle,
            role,
            peer_address_type: peer.address_type,
            peer_address: peer.address,
            connection_interval,
            connection_latency,
            supervision_timeout,
            master_clock_accuracy: 0x00,
        });
    }

    fn incoming_le_scan(&mut self, source: BdAddr, destination: BdAddr) {
        let responses: Vec<LinkLayerPacket> = self
            .advertisers
            .iter()
            .filter_map(|advertiser| advertiser.get_scan_response(destination, source))
            .collect();
        for response in responses {
            self.send_le_link_layer_packet(response);
        }
    }

    fn incoming_le_scan_response(
        &mut self,
        source: BdAddr,
        address_type: AddressType,
        advertisement_type: AdvertisementType,
        data: Vec<u8>,
    ) {
        if self.le_scan_mode == LeScanMode::Legacy {
            if advertisement_type != AdvertisementType::ScanResponse {
                return;
            }
            let rssi = self.rssi.next();
            self.send_event(HciEvent::LeAdvertisingReport {
                event_type: EVENT_TYPE_SCAN_RESPONSE,
                address_type,
                address: source,
                data: data.clone(),
                rssi,
            });
        }

        if self.le_scan_mode == LeScanMode::Extended {
            let rssi = self.rssi.next();
            self.send_event(extended_report(
                EXT_EVENT_TYPE_SCAN_RESPONSE,
                address_type,
                source,
                rssi,
                data,
            ));
        }
    }

    // ------------------------------------------------------------------
    // LE connection update
    // ------------------------------------------------------------------

    pub fn le_connection_update(
        &mut self,
        handle: u16,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
    ) -> ErrorCode {
        if !self.connections.has_handle(handle) {
            return ErrorCode::UnknownConnection;
        }
        // Negotiation with the remote device could happen here
        self.schedule_task(
            CONNECTION_UPDATE_DELAY,
            Box::new(move |controller| {
                controller.le_connection_update_complete(
                    handle,
                    interval_min,
                    interval_max,
                    latency,
                    supervision_timeout,
                )
            }),
        );
        ErrorCode::Success
    }

    fn le_connection_update_complete(
        &mut self,
        handle: u16,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
    ) {
        let mut status = ErrorCode::Success;
        if !self.connections.has_handle(handle) {
            status = ErrorCode::UnknownConnection;
        }
        if !le_connection_parameters_valid(interval_min, interval_max, latency, supervision_timeout)
        {
            status = ErrorCode::InvalidHciCommandParameters;
        }
        let interval = ((u32::from(interval_min) + u32::from(interval_max)) / 2) as u16;
        self.send_event(HciEvent::LeConnectionUpdateComplete {
            status,
            handle,
            connection_interval: interval,
            connection_latency: latency,
            supervision_timeout,
        });
    }

    // ------------------------------------------------------------------
    // LE filter lists (C4 plumbing)
    // ------------------------------------------------------------------

    pub fn le_connect_list_clear(&mut self) {
        self.lists.connect_list_clear();
    }

    pub fn le_resolving_list_clear(&mut self) {
        self.lists.resolving_list_clear();
    }

    pub fn le_connect_list_add_device(&mut self, address: BdAddr, address_type: u8) -> ErrorCode {
        if self.lists.connect_list_full() {
            return ErrorCode::MemoryCapacityExceeded;
        }
        self.lists.connect_list_add(address, address_type);
        ErrorCode::Success
    }

    pub fn le_resolving_list_add_device(
        &mut self,
        address: BdAddr,
        address_type: u8,
        peer_irk: [u8; lists::IRK_SIZE],
        local_irk: [u8; lists::IRK_SIZE],
    ) -> ErrorCode {
        if self.lists.resolving_list_full() {
            return ErrorCode::MemoryCapacityExceeded;
        }
        self.lists
            .resolving_list_add(address, address_type, peer_irk, local_irk);
        ErrorCode::Success
    }

    pub fn le_connect_list_remove_device(&mut self, address: BdAddr, address_type: u8) {
        self.lists.connect_list_remove(address, address_type);
    }

    pub fn le_resolving_list_remove_device(&mut self, address: BdAddr, address_type: u8) {
        self.lists.resolving_list_remove(address, address_type);
    }

    pub fn le_connect_list_contains_device(&self, address: BdAddr, address_type: u8) -> bool {
        self.lists.connect_list_contains(address, address_type)
    }

    pub fn le_resolving_list_contains_device(&self, address: BdAddr, address_type: u8) -> bool {
        self.lists.resolving_list_contains(address, address_type)
    }

    pub fn le_connect_list_full(&self) -> bool {
        self.lists.connect_list_full()
    }

    pub fn le_resolving_list_full(&self) -> bool {
        self.lists.resolving_list_full()
    }

    pub fn le_set_privacy_mode(&mut self, address_type: u8, address: BdAddr, mode: u8) {
        info!(
            "Privacy mode {} for {} (type {})",
            mode, address, address_type
        );
    }

    // ------------------------------------------------------------------
    // Reset and tick
    // ------------------------------------------------------------------

    pub fn reset(&mut self) {
        if self.inquiry_timer_task_id != INVALID_TASK_ID {
            let task_id = self.inquiry_timer_task_id;
            self.inquiry_timer_task_id = INVALID_TASK_ID;
            self.cancel_task(task_id);
        }
        self.last_inquiry = None;
        self.le_scan_mode = LeScanMode::Disabled;
        self.le_disable_advertising_sets();
        self.initiator.armed = false;
    }

    /// Timer tick: advance the inquiry engine and poll every
    /// advertiser slot
    pub fn tick(&mut self, now: Instant) {
        if self.inquiry_timer_task_id != INVALID_TASK_ID {
            self.inquiry_step(now);
        }
        self.le_advertising(now);
    }
}

/// Validity per the Core Spec bounds for LE connection parameters
fn le_connection_parameters_valid(
    interval_min: u16,
    interval_max: u16,
    latency: u16,
    supervision_timeout: u16,
) -> bool {
    if interval_min < 0x0006
        || interval_max > 0x0C80
        || interval_min > interval_max
        || latency > 0x01F3
        || supervision_timeout < 0x000A
        || supervision_timeout > 0x0C80
    {
        return false;
    }
    // The supervision timeout (10 ms units) must exceed
    // (1 + latency) * interval_max (1.25 ms units)
    let timeout_ms = u32::from(supervision_timeout) * 10;
    let window_ms = (1 + u32::from(latency)) * u32::from(interval_max) * 10 / 8;
    timeout_ms > window_ms
}

fn extended_report(
    event_type: u8,
    address_type: AddressType,
    address: BdAddr,
    rssi: u8,
    data: Vec<u8>,
) -> HciEvent {
    HciEvent::LeExtendedAdvertisingReport {
        event_type,
        address_type,
        address,
        primary_phy: 0x01,
        secondary_phy: 0x00,
        advertising_sid: 0xFF,
        tx_power: 0x7F,
        rssi,
        periodic_advertising_interval: 0,
        direct_address_type: AddressType::Public,
        direct_address: BdAddr::EMPTY,
        data,
    }
}
