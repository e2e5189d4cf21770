//! Controller tests
//!
//! Component tests for the connection table, security manager,
//! advertiser, and filter lists, plus end-to-end scenarios that wire
//! two controllers together over an in-memory radio with a virtual
//! clock.

use super::advertiser::Advertiser;
use super::connections::ConnectionTable;
use super::lists::FilterLists;
use super::security::{PairingType, SecurityManager};
use super::*;
use crate::hci::acl::HciAclPacket;
use crate::hci::constants::RESERVED_HANDLE;
use crate::hci::event::HciEvent;
use crate::hci::status::ErrorCode;
use crate::hci::types::{
    AddressType, AddressWithType, BdAddr, BroadcastFlag, OwnAddressType, PacketBoundaryFlag, Role,
};
use crate::link::types::{AdvertisementType, LinkLayerPacket, PacketBody, Phy};
use crate::properties::DeviceProperties;
use crate::scheduler::{PeriodicTask, Task, TaskId, TaskScheduler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------
// Virtual-clock scheduler and two-controller harness
// ----------------------------------------------------------------------

enum Job {
    Once(Task),
    Periodic { period: Duration, task: PeriodicTask },
}

struct Scheduled {
    id: TaskId,
    due: Duration,
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Scheduled>,
    now: Duration,
    next_id: TaskId,
    next_seq: u64,
}

/// Scheduler handle installed into the controller; the queue is shared
/// with the harness that drains it
struct FakeScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl TaskScheduler for FakeScheduler {
    fn schedule(&mut self, delay: Duration, task: Task) -> TaskId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.next_seq += 1;
        let id = state.next_id;
        let due = state.now + delay;
        let seq = state.next_seq;
        state.queue.push(Scheduled {
            id,
            due,
            seq,
            job: Job::Once(task),
        });
        id
    }

    fn schedule_periodic(
        &mut self,
        delay: Duration,
        period: Duration,
        task: PeriodicTask,
    ) -> TaskId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.next_seq += 1;
        let id = state.next_id;
        let due = state.now + delay;
        let seq = state.next_seq;
        state.queue.push(Scheduled {
            id,
            due,
            seq,
            job: Job::Periodic { period, task },
        });
        id
    }

    fn cancel(&mut self, id: TaskId) {
        let mut state = self.state.lock().unwrap();
        state.queue.retain(|scheduled| scheduled.id != id);
    }
}

struct TestDevice {
    controller: LinkLayerController,
    events: Arc<Mutex<VecDeque<HciEvent>>>,
    acls: Arc<Mutex<VecDeque<HciAclPacket>>>,
    radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>>,
    scheduler: Arc<Mutex<SchedulerState>>,
    base: Instant,
}

impl TestDevice {
    fn new(properties: DeviceProperties) -> Self {
        let mut controller = LinkLayerController::new(properties);
        let events: Arc<Mutex<VecDeque<HciEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let acls: Arc<Mutex<VecDeque<HciAclPacket>>> = Arc::new(Mutex::new(VecDeque::new()));
        let radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let scheduler = Arc::new(Mutex::new(SchedulerState::default()));

        let sink = events.clone();
        controller.register_event_channel(Box::new(move |event| {
            sink.lock().unwrap().push_back(event);
        }));
        let sink = acls.clone();
        controller.register_acl_channel(Box::new(move |acl| {
            sink.lock().unwrap().push_back(acl);
        }));
        let sink = radio.clone();
        controller.register_remote_channel(Box::new(move |packet, phy| {
            sink.lock().unwrap().push_back((packet, phy));
        }));
        controller.register_task_scheduler(Box::new(FakeScheduler {
            state: scheduler.clone(),
        }));

        Self {
            controller,
            events,
            acls,
            radio,
            scheduler,
            base: Instant::now(),
        }
    }

    /// Advance the virtual clock, running every task that falls due in
    /// order (FIFO among tasks due at the same time)
    fn run_for(&mut self, duration: Duration) {
        let target = self.scheduler.lock().unwrap().now + duration;
        loop {
            let next = {
                let mut state = self.scheduler.lock().unwrap();
                let index = state
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.due <= target)
                    .min_by_key(|(_, s)| (s.due, s.seq))
                    .map(|(i, _)| i);
                match index {
                    Some(i) => {
                        let scheduled = state.queue.remove(i);
                        state.now = scheduled.due;
                        Some(scheduled)
                    }
                    None => None,
                }
            };
            let Some(scheduled) = next else {
                break;
            };
            match scheduled.job {
                Job::Once(task) => task(&mut self.controller),
                Job::Periodic { period, mut task } => {
                    task(&mut self.controller);
                    let mut state = self.scheduler.lock().unwrap();
                    state.next_seq += 1;
                    let seq = state.next_seq;
                    let due = state.now + period;
                    state.queue.push(Scheduled {
                        id: scheduled.id,
                        due,
                        seq,
                        job: Job::Periodic { period, task },
                    });
                }
            }
        }
        self.scheduler.lock().unwrap().now = target;
    }

    fn now(&self) -> Instant {
        self.base + self.scheduler.lock().unwrap().now
    }

    fn tick(&mut self) {
        let now = self.now();
        self.controller.tick(now);
    }

    fn take_events(&mut self) -> Vec<HciEvent> {
        std::mem::take(&mut *self.events.lock().unwrap()).into()
    }

    fn take_acls(&mut self) -> Vec<HciAclPacket> {
        std::mem::take(&mut *self.acls.lock().unwrap()).into()
    }

    fn take_radio(&mut self) -> Vec<(LinkLayerPacket, Phy)> {
        std::mem::take(&mut *self.radio.lock().unwrap()).into()
    }

    /// Deliver everything this device has put on the radio to `other`
    fn deliver_to(&mut self, other: &mut TestDevice) {
        for (packet, _phy) in self.take_radio() {
            other.controller.incoming_packet(packet);
        }
    }
}

fn addr(seed: u8) -> BdAddr {
    BdAddr::new([seed, seed, seed, seed, seed, 0x0A])
}

fn le_addr(seed: u8) -> BdAddr {
    BdAddr::new([seed, seed, seed, seed, seed, 0x0B])
}

fn test_properties(seed: u8) -> DeviceProperties {
    DeviceProperties {
        address: addr(seed),
        le_address: le_addr(seed),
        // 0x20 units = 20 ms legacy advertising interval
        le_advertising_interval_min: 0x20,
        le_advertising_interval_max: 0x20,
        ..Default::default()
    }
}

const MS: Duration = Duration::from_millis(1);

/// Run the classic page flow to completion, returning the handles on
/// each side
fn connect_classic(a: &mut TestDevice, b: &mut TestDevice) -> (u16, u16) {
    let a_addr = a.controller.properties().address;
    let b_addr = b.controller.properties().address;
    b.controller.set_page_scan_enable(true);
    assert_eq!(a.controller.create_connection(b_addr, 1), ErrorCode::Success);
    a.run_for(50 * MS);
    a.deliver_to(b);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ConnectionRequest { bd_addr, .. } if *bd_addr == a_addr
    )));
    assert_eq!(
        b.controller.accept_connection_request(a_addr, true),
        ErrorCode::Success
    );
    b.run_for(250 * MS);
    let handle_b = b
        .take_events()
        .iter()
        .find_map(|e| match e {
            HciEvent::ConnectionComplete { status, handle, .. } => {
                assert_eq!(*status, ErrorCode::Success);
                Some(*handle)
            }
            _ => None,
        })
        .expect("no ConnectionComplete on acceptor");
    b.deliver_to(a);
    let handle_a = a
        .take_events()
        .iter()
        .find_map(|e| match e {
            HciEvent::ConnectionComplete { status, handle, .. } => {
                assert_eq!(*status, ErrorCode::Success);
                Some(*handle)
            }
            _ => None,
        })
        .expect("no ConnectionComplete on initiator");
    (handle_a, handle_b)
}

/// Run the LE advertise/initiate flow to completion, returning the
/// handles on each side (a advertises, b initiates)
fn connect_le(a: &mut TestDevice, b: &mut TestDevice) -> (u16, u16) {
    let a_addr = a.controller.properties().address;
    assert_eq!(a.controller.set_le_advertising_enable(true), ErrorCode::Success);
    b.controller.set_le_scan_type(0);
    b.controller.set_le_scan_enable(true);
    assert_eq!(
        b.controller.le_create_connection(
            a_addr,
            0x00,
            OwnAddressType::PublicDevice,
            0x0010,
            0x0020,
            0x0000,
            0x0100,
        ),
        ErrorCode::Success
    );

    a.tick();
    a.run_for(50 * MS);
    a.deliver_to(b);
    assert_eq!(b.controller.le_scan_mode(), LeScanMode::Disabled);
    b.run_for(50 * MS);
    b.deliver_to(a);
    let handle_a = a
        .take_events()
        .iter()
        .find_map(|e| match e {
            HciEvent::LeConnectionComplete { status, handle, role, .. } => {
                assert_eq!(*status, ErrorCode::Success);
                assert_eq!(*role, Role::Slave);
                Some(*handle)
            }
            _ => None,
        })
        .expect("no LeConnectionComplete on advertiser");
    a.run_for(50 * MS);
    a.deliver_to(b);
    let handle_b = b
        .take_events()
        .iter()
        .find_map(|e| match e {
            HciEvent::LeConnectionComplete { status, handle, role, .. } => {
                assert_eq!(*status, ErrorCode::Success);
                assert_eq!(*role, Role::Master);
                Some(*handle)
            }
            _ => None,
        })
        .expect("no LeConnectionComplete on initiator");
    (handle_a, handle_b)
}

// ----------------------------------------------------------------------
// Connection table
// ----------------------------------------------------------------------

#[test]
fn test_connection_table_pending() {
    let mut table = ConnectionTable::new();
    let peer = addr(1);

    assert!(table.create_pending(peer, false));
    // Only one classic connection may be pending
    assert!(!table.create_pending(addr(2), false));
    assert!(table.has_pending(peer));
    assert!(!table.has_pending(addr(2)));
    assert!(table.cancel_pending(peer));
    assert!(!table.cancel_pending(peer));

    // No pending entry means no connection
    assert_eq!(table.create_connection(peer, addr(9)), RESERVED_HANDLE);
}

#[test]
fn test_connection_table_handles() {
    let mut table = ConnectionTable::new();

    assert!(table.create_pending(addr(1), true));
    assert!(table.authenticate_pending());
    let handle = table.create_connection(addr(1), addr(9));
    assert_ne!(handle, RESERVED_HANDLE);
    assert!(table.has_handle(handle));
    assert_eq!(table.handle_for_address(addr(1)), handle);
    assert_eq!(table.handle_for_address(addr(2)), RESERVED_HANDLE);
    assert_eq!(table.phy(handle), Some(Phy::BrEdr));

    // A second connection gets a distinct handle
    assert!(table.create_pending(addr(2), false));
    let second = table.create_connection(addr(2), addr(9));
    assert_ne!(second, handle);

    assert!(!table.is_encrypted(handle));
    table.encrypt(handle);
    assert!(table.is_encrypted(handle));

    assert!(table.disconnect(handle));
    assert!(!table.has_handle(handle));
    assert!(!table.is_encrypted(handle));
    assert!(!table.disconnect(handle));
}

#[test]
fn test_connection_table_le() {
    let mut table = ConnectionTable::new();
    let peer = AddressWithType::new(addr(3), AddressType::Random);
    let own = AddressWithType::new(le_addr(9), AddressType::Random);

    // Conversion without a pending entry fails
    assert_eq!(table.create_le_connection(peer, own), RESERVED_HANDLE);

    // A cancelled pending entry cannot be converted either
    assert!(table.create_le_pending(peer));
    assert!(table.cancel_le_pending(peer));
    assert_eq!(table.create_le_connection(peer, own), RESERVED_HANDLE);

    assert!(table.create_le_pending(peer));
    assert!(!table.create_le_pending(peer));
    let handle = table.create_le_connection(peer, own);
    assert_ne!(handle, RESERVED_HANDLE);
    assert_eq!(table.phy(handle), Some(Phy::LowEnergy));
    assert_eq!(table.peer_address(handle), Some(peer));
    assert_eq!(table.own_address(handle), Some(own));
    assert_eq!(table.handle_for_address_with_type(peer), handle);
}

// ----------------------------------------------------------------------
// Security manager
// ----------------------------------------------------------------------

#[test]
fn test_pairing_type_requires_both_sides() {
    let mut manager = SecurityManager::new();
    assert_eq!(manager.simple_pairing_type(), PairingType::Invalid);
    manager.set_local_io_capability(addr(1), 0x01, 0, 0);
    assert_eq!(manager.simple_pairing_type(), PairingType::Invalid);
    manager.set_peer_io_capability(addr(1), 0x01, 0, 0);
    assert_eq!(manager.simple_pairing_type(), PairingType::DisplayAndConfirm);
    manager.invalidate_io_capabilities();
    assert_eq!(manager.simple_pairing_type(), PairingType::Invalid);
}

#[test]
fn test_pairing_type_table() {
    // (local, peer, expected)
    let cases = [
        (0x00, 0x00, PairingType::AutoConfirmation),
        (0x00, 0x01, PairingType::AutoConfirmation),
        (0x00, 0x02, PairingType::DisplayPin),
        (0x01, 0x00, PairingType::ConfirmYN),
        (0x01, 0x01, PairingType::DisplayAndConfirm),
        (0x01, 0x02, PairingType::DisplayPin),
        (0x02, 0x00, PairingType::InputPin),
        (0x02, 0x01, PairingType::InputPin),
        (0x02, 0x02, PairingType::InputPin),
        (0x03, 0x01, PairingType::AutoConfirmation),
        (0x01, 0x03, PairingType::AutoConfirmation),
        (0x03, 0x03, PairingType::AutoConfirmation),
    ];
    for (local, peer, expected) in cases {
        let mut manager = SecurityManager::new();
        manager.set_local_io_capability(addr(1), local, 0, 0);
        manager.set_peer_io_capability(addr(1), peer, 0, 0);
        assert_eq!(
            manager.simple_pairing_type(),
            expected,
            "local 0x{:02x} peer 0x{:02x}",
            local,
            peer
        );
    }
}

#[test]
fn test_key_store() {
    let mut manager = SecurityManager::new();
    let peer = addr(4);
    assert_eq!(manager.read_key(peer), 0);
    assert_eq!(manager.get_key(peer), None);
    manager.write_key(peer, [7u8; 16]);
    assert_eq!(manager.read_key(peer), 1);
    assert_eq!(manager.get_key(peer), Some([7u8; 16]));
    manager.delete_key(peer);
    assert_eq!(manager.read_key(peer), 0);
}

#[test]
fn test_authentication_context_survives_finish() {
    let mut manager = SecurityManager::new();
    manager.authentication_request(addr(5), 0x0042);
    assert!(manager.is_authenticating());
    manager.authentication_request_finished();
    assert!(!manager.is_authenticating());
    // Staged completion events still need the context
    assert_eq!(manager.authentication_address(), Some(addr(5)));
    assert_eq!(manager.authentication_handle(), Some(0x0042));
}

// ----------------------------------------------------------------------
// Advertiser
// ----------------------------------------------------------------------

fn advertiser_slot(advertisement_type: AdvertisementType) -> Advertiser {
    let mut advertiser = Advertiser::default();
    advertiser.initialize(
        AddressWithType::new(addr(1), AddressType::Public),
        AddressWithType::default(),
        0,
        advertisement_type,
        vec![0x02, 0x01, 0x06],
        vec![0x05, 0x09, b'a', b'd', b'v'],
        Duration::from_millis(20),
    );
    advertiser
}

#[test]
fn test_advertiser_interval() {
    let mut advertiser = advertiser_slot(AdvertisementType::AdvInd);
    let t0 = Instant::now();

    // Disabled slots stay silent
    assert!(advertiser.get_advertisement(t0).is_none());

    advertiser.enable();
    assert!(advertiser.get_advertisement(t0).is_some());
    assert!(advertiser.get_advertisement(t0 + 10 * MS).is_none());
    let packet = advertiser.get_advertisement(t0 + 20 * MS).unwrap();
    assert!(matches!(
        packet.body,
        PacketBody::LeAdvertisement {
            advertisement_type: AdvertisementType::AdvInd,
            ..
        }
    ));

    advertiser.disable();
    assert!(advertiser.get_advertisement(t0 + 40 * MS).is_none());
}

#[test]
fn test_advertiser_extended_duration() {
    let mut advertiser = Advertiser::default();
    advertiser.set_address(addr(2));
    advertiser.initialize_extended(
        AddressType::Random,
        AddressWithType::default(),
        0,
        AdvertisementType::AdvNonconnInd,
        Duration::from_millis(20),
    );
    advertiser.enable_extended(Duration::from_millis(30));
    let t0 = Instant::now();

    assert!(advertiser.get_advertisement(t0).is_some());
    assert!(advertiser.get_advertisement(t0 + 20 * MS).is_some());
    // Past the duration the slot turns itself off
    assert!(advertiser.get_advertisement(t0 + 40 * MS).is_none());
    assert!(!advertiser.is_enabled());
}

#[test]
fn test_advertiser_scan_response() {
    let scanner = addr(9);

    let mut advertiser = advertiser_slot(AdvertisementType::AdvInd);
    advertiser.enable();
    let response = advertiser.get_scan_response(addr(1), scanner).unwrap();
    assert_eq!(response.destination, scanner);
    assert!(matches!(
        response.body,
        PacketBody::LeScanResponse {
            advertisement_type: AdvertisementType::ScanResponse,
            ..
        }
    ));

    // Wrong scanned address
    assert!(advertiser.get_scan_response(addr(2), scanner).is_none());

    // Non-scannable advertisement type
    let mut advertiser = advertiser_slot(AdvertisementType::AdvNonconnInd);
    advertiser.enable();
    assert!(advertiser.get_scan_response(addr(1), scanner).is_none());
}

// ----------------------------------------------------------------------
// Filter lists
// ----------------------------------------------------------------------

#[test]
fn test_filter_lists_basics() {
    let mut lists = FilterLists::new(2, 2);
    lists.connect_list_add(addr(1), 0);
    lists.connect_list_add(addr(1), 0);
    assert!(lists.connect_list_contains(addr(1), 0));
    assert!(!lists.connect_list_contains(addr(1), 1));
    assert!(!lists.connect_list_full());
    lists.connect_list_add(addr(2), 0);
    assert!(lists.connect_list_full());
    lists.connect_list_clear();
    assert!(!lists.connect_list_contains(addr(1), 0));
}

#[test]
fn test_resolving_list_is_searched_directly() {
    let mut lists = FilterLists::new(4, 4);
    // No connect-list entry for this device
    lists.resolving_list_add(addr(3), 1, [1u8; 16], [2u8; 16]);
    assert!(lists.resolving_list_contains(addr(3), 1));
    lists.resolving_list_remove(addr(3), 1);
    assert!(!lists.resolving_list_contains(addr(3), 1));
}

#[test]
fn test_connect_list_removal_purges_aligned_entry() {
    let mut lists = FilterLists::new(4, 4);
    lists.connect_list_add(addr(1), 0);
    lists.resolving_list_add(addr(1), 0, [1u8; 16], [2u8; 16]);
    lists.connect_list_add(addr(2), 0);
    lists.resolving_list_add(addr(2), 0, [3u8; 16], [4u8; 16]);

    lists.connect_list_remove(addr(1), 0);
    assert!(!lists.connect_list_contains(addr(1), 0));
    assert!(!lists.resolving_list_contains(addr(1), 0));
    assert!(lists.resolving_list_contains(addr(2), 0));
}

// ----------------------------------------------------------------------
// LE connection parameter validation
// ----------------------------------------------------------------------

#[test]
fn test_le_connection_parameters() {
    assert!(le_connection_parameters_valid(0x10, 0x20, 0, 0x0100));
    // interval_min below the floor
    assert!(!le_connection_parameters_valid(5, 0x20, 0, 0x0100));
    // interval_max above the ceiling
    assert!(!le_connection_parameters_valid(0x10, 0x0C81, 0, 0x0100));
    // min > max
    assert!(!le_connection_parameters_valid(0x30, 0x20, 0, 0x0100));
    // latency above the ceiling
    assert!(!le_connection_parameters_valid(0x10, 0x20, 0x01F4, 0x0100));
    // supervision timeout out of range
    assert!(!le_connection_parameters_valid(0x10, 0x20, 0, 0x0009));
    assert!(!le_connection_parameters_valid(0x10, 0x20, 0, 0x0C81));
    // timeout not larger than (1 + latency) * interval_max * 1.25 ms
    assert!(!le_connection_parameters_valid(0x0C80, 0x0C80, 0x01F3, 0x0C80));
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

#[test]
fn test_page_accept() {
    let mut a = TestDevice::new(test_properties(0xA1));
    let mut b = TestDevice::new(test_properties(0xB1));
    let (handle_a, handle_b) = connect_classic(&mut a, &mut b);
    assert_ne!(handle_a, RESERVED_HANDLE);
    assert_ne!(handle_b, RESERVED_HANDLE);

    // The pending slot is free again on both sides
    assert_eq!(
        a.controller.create_connection_cancel(addr(0xB1)),
        ErrorCode::UnknownConnection
    );
}

#[test]
fn test_page_while_paging_is_busy() {
    let mut a = TestDevice::new(test_properties(0xA2));
    assert_eq!(a.controller.create_connection(addr(1), 0), ErrorCode::Success);
    assert_eq!(
        a.controller.create_connection(addr(2), 0),
        ErrorCode::ControllerBusy
    );
    assert_eq!(a.controller.create_connection_cancel(addr(1)), ErrorCode::Success);
    assert_eq!(a.controller.create_connection(addr(2), 0), ErrorCode::Success);
}

#[test]
fn test_page_reject() {
    let mut a = TestDevice::new(test_properties(0xA3));
    let mut b = TestDevice::new(test_properties(0xB3));
    let a_addr = a.controller.properties().address;
    let b_addr = b.controller.properties().address;

    b.controller.set_page_scan_enable(true);
    assert_eq!(a.controller.create_connection(b_addr, 0), ErrorCode::Success);
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.take_events();

    assert_eq!(
        b.controller.reject_connection_request(a_addr, 0x0D),
        ErrorCode::Success
    );
    b.run_for(250 * MS);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ConnectionComplete { status, handle, .. }
            if *status != ErrorCode::Success && *handle == RESERVED_HANDLE
    )));
    b.deliver_to(&mut a);
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::ConnectionComplete { handle, bd_addr, .. }
            if *handle == RESERVED_HANDLE && *bd_addr == b_addr
    )));
    // The rejected page no longer occupies the pending slot
    assert_eq!(a.controller.create_connection(b_addr, 0), ErrorCode::Success);
}

#[test]
fn test_page_ignored_without_page_scan() {
    let mut a = TestDevice::new(test_properties(0xA4));
    let mut b = TestDevice::new(test_properties(0xB4));
    let b_addr = b.controller.properties().address;

    assert_eq!(a.controller.create_connection(b_addr, 0), ErrorCode::Success);
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    assert!(b.take_events().is_empty());
}

#[test]
fn test_le_central_connect() {
    let mut a = TestDevice::new(test_properties(0xA5));
    let mut b = TestDevice::new(test_properties(0xB5));
    let (handle_a, handle_b) = connect_le(&mut a, &mut b);
    assert_ne!(handle_a, RESERVED_HANDLE);
    assert_ne!(handle_b, RESERVED_HANDLE);
}

#[test]
fn test_le_passive_scan_reports() {
    let mut a = TestDevice::new(test_properties(0xA6));
    let mut b = TestDevice::new(test_properties(0xB6));
    let a_addr = a.controller.properties().address;

    assert_eq!(a.controller.set_le_advertising_enable(true), ErrorCode::Success);
    b.controller.set_le_scan_type(0);
    b.controller.set_le_scan_enable(true);

    a.tick();
    a.run_for(50 * MS);
    a.deliver_to(&mut b);

    let events = b.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::LeAdvertisingReport { event_type: 0x00, address, .. } if *address == a_addr
    )));
    // Passive scanning never transmits
    assert!(b.take_radio().is_empty());
}

#[test]
fn test_le_active_scan_round_trip() {
    let mut a = TestDevice::new(TestDeviceScanData::properties(0xA7));
    let mut b = TestDevice::new(test_properties(0xB7));
    let a_addr = a.controller.properties().address;

    assert_eq!(a.controller.set_le_advertising_enable(true), ErrorCode::Success);
    b.controller.set_le_scan_type(1);
    b.controller.set_le_scan_enable(true);

    a.tick();
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.take_events();

    // Active scanning sends an LE scan request to the advertiser
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    a.run_for(50 * MS);
    a.deliver_to(&mut b);

    let events = b.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::LeAdvertisingReport { event_type: 0x04, address, data, .. }
            if *address == a_addr && data == &TestDeviceScanData::SCAN_RESPONSE.to_vec()
    )));
}

struct TestDeviceScanData;

impl TestDeviceScanData {
    const SCAN_RESPONSE: [u8; 4] = [0x03, 0x09, b'h', b'i'];

    fn properties(seed: u8) -> DeviceProperties {
        DeviceProperties {
            le_scan_response: Self::SCAN_RESPONSE.to_vec(),
            ..test_properties(seed)
        }
    }
}

#[test]
fn test_le_extended_scan_report_event_types() {
    let mut b = TestDevice::new(test_properties(0xB8));
    b.controller.set_le_scan_type(0);
    b.controller.set_le_extended_scan_enable(true);

    let cases = [
        (AdvertisementType::AdvInd, Some(0x13)),
        (AdvertisementType::AdvDirectInd, Some(0x15)),
        (AdvertisementType::AdvScanInd, Some(0x12)),
        (AdvertisementType::AdvNonconnInd, Some(0x10)),
        // Scan responses are not reported from the advertisement path
        (AdvertisementType::ScanResponse, None),
    ];
    for (advertisement_type, expected) in cases {
        b.controller.incoming_packet(LinkLayerPacket::new(
            addr(0x21),
            BdAddr::EMPTY,
            PacketBody::LeAdvertisement {
                address_type: AddressType::Public,
                advertisement_type,
                data: vec![],
            },
        ));
        let events = b.take_events();
        match expected {
            Some(event_type) => {
                assert!(
                    events.iter().any(|e| matches!(
                        e,
                        HciEvent::LeExtendedAdvertisingReport { event_type: t, .. } if *t == event_type
                    )),
                    "missing extended report 0x{:02x} for {:?}",
                    event_type,
                    advertisement_type
                );
            }
            None => assert!(events.is_empty()),
        }
    }
}

#[test]
fn test_address_filter_drops_foreign_packets() {
    let mut b = TestDevice::new(test_properties(0xB9));
    b.controller.set_le_scan_enable(true);

    b.controller.incoming_packet(LinkLayerPacket::new(
        addr(0x31),
        BdAddr::new([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]),
        PacketBody::LeAdvertisement {
            address_type: AddressType::Public,
            advertisement_type: AdvertisementType::AdvInd,
            data: vec![],
        },
    ));

    assert!(b.take_events().is_empty());
    assert!(b.take_radio().is_empty());
}

#[test]
fn test_acl_fragmentation() {
    let mut a = TestDevice::new(test_properties(0xAA));
    let mut b = TestDevice::new(DeviceProperties {
        acl_data_packet_size: 27,
        ..test_properties(0xBA)
    });
    let (handle_a, handle_b) = connect_classic(&mut a, &mut b);

    let status = a.controller.send_acl_to_remote(HciAclPacket::new(
        handle_a,
        PacketBoundaryFlag::FirstNonAutomaticallyFlushable,
        BroadcastFlag::PointToPoint,
        vec![0x55; 80],
    ));
    assert_eq!(status, ErrorCode::Success);

    a.run_for(50 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::NumberOfCompletedPackets { handle, num_completed_packets: 1 }
            if *handle == handle_a
    )));

    a.deliver_to(&mut b);
    let fragments = b.take_acls();
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0].payload.len(), 27);
    assert_eq!(fragments[1].payload.len(), 27);
    assert_eq!(fragments[2].payload.len(), 26);
    assert_eq!(
        fragments[0].packet_boundary_flag,
        PacketBoundaryFlag::FirstAutomaticallyFlushable
    );
    assert_eq!(
        fragments[1].packet_boundary_flag,
        PacketBoundaryFlag::ContinuingFragment
    );
    assert_eq!(
        fragments[2].packet_boundary_flag,
        PacketBoundaryFlag::ContinuingFragment
    );
    for fragment in &fragments {
        assert_eq!(fragment.handle, handle_b);
    }
}

#[test]
fn test_acl_to_unknown_handle() {
    let mut a = TestDevice::new(test_properties(0xAB));
    let status = a.controller.send_acl_to_remote(HciAclPacket::new(
        0x0123,
        PacketBoundaryFlag::FirstAutomaticallyFlushable,
        BroadcastFlag::PointToPoint,
        vec![1, 2, 3],
    ));
    assert_eq!(status, ErrorCode::UnknownConnection);
    a.run_for(50 * MS);
    assert!(a.take_events().is_empty());
}

#[test]
fn test_le_connection_update_rejects_bad_interval() {
    let mut a = TestDevice::new(test_properties(0xAC));
    let mut b = TestDevice::new(test_properties(0xBC));
    let (_, handle_b) = connect_le(&mut a, &mut b);

    assert_eq!(
        b.controller
            .le_connection_update(handle_b, 5, 0x0020, 0x0003, 0x0100),
        ErrorCode::Success
    );
    b.run_for(25 * MS);
    let events = b.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::LeConnectionUpdateComplete {
            status: ErrorCode::InvalidHciCommandParameters,
            handle,
            connection_interval,
            connection_latency: 0x0003,
            supervision_timeout: 0x0100,
        } if *handle == handle_b && *connection_interval == (5 + 0x0020) / 2
    )));
}

#[test]
fn test_le_connection_update_success() {
    let mut a = TestDevice::new(test_properties(0xAD));
    let mut b = TestDevice::new(test_properties(0xBD));
    let (_, handle_b) = connect_le(&mut a, &mut b);

    assert_eq!(
        b.controller
            .le_connection_update(0x0ABC, 0x10, 0x20, 0, 0x0100),
        ErrorCode::UnknownConnection
    );
    assert_eq!(
        b.controller
            .le_connection_update(handle_b, 0x10, 0x20, 0, 0x0100),
        ErrorCode::Success
    );
    b.run_for(25 * MS);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::LeConnectionUpdateComplete { status: ErrorCode::Success, handle, .. }
            if *handle == handle_b
    )));
}

#[test]
fn test_le_encryption_and_key_refresh() {
    let mut a = TestDevice::new(test_properties(0xAE));
    let mut b = TestDevice::new(test_properties(0xBE));
    let (handle_a, handle_b) = connect_le(&mut a, &mut b);
    let ltk = [0x42u8; 16];

    assert_eq!(
        b.controller
            .le_enable_encryption(handle_b, [1u8; 8], 0x1234, ltk),
        ErrorCode::Success
    );
    b.run_for(55 * MS);
    b.deliver_to(&mut a);
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::LeLongTermKeyRequest { handle, rand: [1, 1, 1, 1, 1, 1, 1, 1], ediv: 0x1234 }
            if *handle == handle_a
    )));

    // First reply encrypts the link
    assert_eq!(
        a.controller.le_long_term_key_request_reply(handle_a, ltk),
        ErrorCode::Success
    );
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::EncryptionChange { status: ErrorCode::Success, handle, encryption_enabled: true }
            if *handle == handle_a
    )));
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::EncryptionChange { status: ErrorCode::Success, handle, encryption_enabled: true }
            if *handle == handle_b
    )));

    // A second reply on an encrypted link refreshes the key instead
    assert_eq!(
        a.controller.le_long_term_key_request_reply(handle_a, ltk),
        ErrorCode::Success
    );
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::EncryptionKeyRefreshComplete { status: ErrorCode::Success, handle }
            if *handle == handle_a
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, HciEvent::EncryptionChange { .. })));
}

#[test]
fn test_le_long_term_key_negative_reply() {
    let mut a = TestDevice::new(test_properties(0xAF));
    let mut b = TestDevice::new(test_properties(0xBF));
    let (handle_a, handle_b) = connect_le(&mut a, &mut b);

    assert_eq!(
        b.controller
            .le_enable_encryption(handle_b, [0u8; 8], 0, [9u8; 16]),
        ErrorCode::Success
    );
    b.run_for(55 * MS);
    b.deliver_to(&mut a);
    a.take_events();

    assert_eq!(
        a.controller.le_long_term_key_request_negative_reply(handle_a),
        ErrorCode::Success
    );
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    // A zero LTK comes back as an authentication failure
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::EncryptionChange {
            status: ErrorCode::AuthenticationFailure,
            handle,
            encryption_enabled: true,
        } if *handle == handle_b
    )));
}

#[test]
fn test_simple_pairing_and_encryption() {
    let mut a = TestDevice::new(DeviceProperties {
        authentication_enable: true,
        ..test_properties(0xC1)
    });
    let mut b = TestDevice::new(test_properties(0xD1));
    let a_addr = a.controller.properties().address;
    let b_addr = b.controller.properties().address;
    let (handle_a, handle_b) = connect_classic(&mut a, &mut b);

    // The initiator asked for authentication, so a link key request
    // follows the connection
    a.run_for(5 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::LinkKeyRequest { bd_addr } if *bd_addr == b_addr
    )));

    // No stored key; pairing starts with an IO capability request
    assert_eq!(
        a.controller.link_key_request_negative_reply(b_addr),
        ErrorCode::Success
    );
    a.run_for(5 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::IoCapabilityRequest { bd_addr } if *bd_addr == b_addr
    )));

    // Replies from the wrong peer are refused
    assert_eq!(
        a.controller.io_capability_request_reply(addr(0x77), 0x01, 0, 0),
        ErrorCode::AuthenticationFailure
    );

    assert_eq!(
        a.controller.io_capability_request_reply(b_addr, 0x01, 0, 0),
        ErrorCode::Success
    );
    a.run_for(50 * MS);
    a.deliver_to(&mut b);

    let events = b.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::IoCapabilityResponse { bd_addr, .. } if *bd_addr == a_addr
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::IoCapabilityRequest { bd_addr } if *bd_addr == a_addr
    )));

    assert_eq!(
        b.controller.io_capability_request_reply(a_addr, 0x01, 0, 0),
        ErrorCode::Success
    );
    b.run_for(5 * MS);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::UserConfirmationRequest { bd_addr, .. } if *bd_addr == a_addr
    )));
    b.run_for(45 * MS);
    b.deliver_to(&mut a);
    a.run_for(5 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::UserConfirmationRequest { bd_addr, .. } if *bd_addr == b_addr
    )));

    // Host confirmation mints a key and completes authentication
    assert_eq!(
        a.controller.user_confirmation_request_reply(b_addr),
        ErrorCode::Success
    );
    a.run_for(15 * MS);
    let events = a.take_events();
    let positions: Vec<usize> = [
        events
            .iter()
            .position(|e| matches!(e, HciEvent::SimplePairingComplete { status: ErrorCode::Success, .. })),
        events
            .iter()
            .position(|e| matches!(e, HciEvent::LinkKeyNotification { .. })),
        events
            .iter()
            .position(|e| matches!(
                e,
                HciEvent::AuthenticationComplete { status: ErrorCode::Success, handle }
                    if *handle == handle_a
            )),
    ]
    .into_iter()
    .map(|p| p.expect("missing pairing event"))
    .collect();
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);

    assert_eq!(
        b.controller.user_confirmation_request_reply(a_addr),
        ErrorCode::Success
    );
    b.run_for(15 * MS);
    b.take_events();

    // With keys on both sides the link can be encrypted
    assert_eq!(
        a.controller.set_connection_encryption(handle_a, 1),
        ErrorCode::Success
    );
    a.run_for(55 * MS);
    a.deliver_to(&mut b);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::EncryptionChange { status: ErrorCode::Success, handle, encryption_enabled: true }
            if *handle == handle_b
    )));
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::EncryptionChange { status: ErrorCode::Success, handle, encryption_enabled: true }
            if *handle == handle_a
    )));

    // Turning encryption off is not supported
    assert_eq!(
        a.controller.set_connection_encryption(handle_a, 0),
        ErrorCode::EncryptionModeNotAcceptable
    );
}

#[test]
fn test_encryption_requires_key() {
    let mut a = TestDevice::new(test_properties(0xC2));
    let mut b = TestDevice::new(test_properties(0xD2));
    let (handle_a, _) = connect_classic(&mut a, &mut b);

    assert_eq!(
        a.controller.set_connection_encryption(0x0999, 1),
        ErrorCode::UnknownConnection
    );
    assert_eq!(
        a.controller.set_connection_encryption(handle_a, 1),
        ErrorCode::PinOrKeyMissing
    );
}

#[test]
fn test_disconnect_both_sides() {
    let mut a = TestDevice::new(test_properties(0xC3));
    let mut b = TestDevice::new(test_properties(0xD3));
    let (handle_a, handle_b) = connect_classic(&mut a, &mut b);

    assert_eq!(a.controller.disconnect(0x0999, 0x13), ErrorCode::UnknownConnection);
    assert_eq!(a.controller.disconnect(handle_a, 0x13), ErrorCode::Success);
    a.run_for(50 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::DisconnectionComplete {
            status: ErrorCode::Success,
            handle,
            reason: ErrorCode::ConnectionTerminatedByLocalHost,
        } if *handle == handle_a
    )));

    a.deliver_to(&mut b);
    b.run_for(20 * MS);
    assert!(b.take_events().iter().any(|e| matches!(
        e,
        HciEvent::DisconnectionComplete {
            status: ErrorCode::Success,
            handle,
            reason: ErrorCode::RemoteUserTerminatedConnection,
        } if *handle == handle_b
    )));

    // Handles are gone on both sides
    assert_eq!(a.controller.disconnect(handle_a, 0x13), ErrorCode::UnknownConnection);
    assert_eq!(b.controller.disconnect(handle_b, 0x13), ErrorCode::UnknownConnection);
}

#[test]
fn test_remote_information_exchange() {
    let mut a = TestDevice::new(test_properties(0xC4));
    let mut b = TestDevice::new(DeviceProperties {
        name: b"peer device".to_vec(),
        lmp_version: 0x0B,
        manufacturer_name: 0x0123,
        lmp_subversion: 0x4567,
        clock_offset: 0x1122,
        ..test_properties(0xD4)
    });
    let b_addr = b.controller.properties().address;
    let (handle_a, _) = connect_classic(&mut a, &mut b);

    // Remote name (the LMP features read rides along)
    assert_eq!(a.controller.remote_name_request(b_addr), ErrorCode::Success);
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::RemoteHostSupportedFeaturesNotification { bd_addr, .. } if *bd_addr == b_addr
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::RemoteNameRequestComplete { status: ErrorCode::Success, bd_addr, remote_name }
            if *bd_addr == b_addr && remote_name == b"peer device"
    )));

    // Version information comes back as a version response
    assert_eq!(
        a.controller.read_remote_version_information(handle_a),
        ErrorCode::Success
    );
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ReadRemoteVersionInformationComplete {
            status: ErrorCode::Success,
            handle,
            lmp_version: 0x0B,
            manufacturer_name: 0x0123,
            lmp_subversion: 0x4567,
        } if *handle == handle_a
    )));

    // Supported features and clock offset
    assert_eq!(
        a.controller.read_remote_supported_features(handle_a),
        ErrorCode::Success
    );
    assert_eq!(a.controller.read_clock_offset(handle_a), ErrorCode::Success);
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    let events = a.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::ReadRemoteSupportedFeaturesComplete { status: ErrorCode::Success, handle, .. }
            if *handle == handle_a
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        HciEvent::ReadClockOffsetComplete {
            status: ErrorCode::Success,
            handle,
            clock_offset: 0x1122,
        } if *handle == handle_a
    )));

    // An out-of-range feature page is answered with an error status
    assert_eq!(
        a.controller.read_remote_extended_features(handle_a, 9),
        ErrorCode::Success
    );
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ReadRemoteExtendedFeaturesComplete {
            status: ErrorCode::InvalidLmpOrLlParameters,
            page_number: 9,
            ..
        }
    )));

    assert_eq!(
        a.controller.read_remote_supported_features(0x0999),
        ErrorCode::UnknownConnection
    );
}

#[test]
fn test_inquiry_round_trip() {
    let mut a = TestDevice::new(test_properties(0xC5));
    let mut b = TestDevice::new(DeviceProperties {
        extended_inquiry_data: vec![0x05, 0x09, b'e', b'i', b'r'],
        ..test_properties(0xD5)
    });
    let b_addr = b.controller.properties().address;

    b.controller.set_inquiry_scan_enable(true);
    a.controller.set_inquiry_mode(0x02);
    a.controller.start_inquiry(Duration::from_secs(10));
    a.tick();
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ExtendedInquiryResult { response, extended_inquiry_data, .. }
            if response.bd_addr == b_addr && extended_inquiry_data == &[0x05, 0x09, b'e', b'i', b'r']
    )));

    // Within the cooldown window another tick stays quiet
    a.run_for(100 * MS);
    a.tick();
    a.run_for(50 * MS);
    assert!(a.take_radio().is_empty());

    // After the cooldown the next tick transmits again
    a.run_for(Duration::from_millis(2000));
    a.tick();
    a.run_for(50 * MS);
    assert_eq!(a.take_radio().len(), 1);
}

#[test]
fn test_inquiry_ignored_without_inquiry_scan() {
    let mut a = TestDevice::new(test_properties(0xC6));
    let mut b = TestDevice::new(test_properties(0xD6));

    a.controller.start_inquiry(Duration::from_secs(10));
    a.tick();
    a.run_for(50 * MS);
    a.deliver_to(&mut b);
    b.run_for(50 * MS);
    assert!(b.take_radio().is_empty());
}

#[test]
fn test_inquiry_timeout_and_cancel() {
    let mut a = TestDevice::new(test_properties(0xC7));

    a.controller.start_inquiry(Duration::from_millis(500));
    a.run_for(Duration::from_millis(500));
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::InquiryComplete { status: ErrorCode::Success }
    )));

    // Cancelling with no inquiry armed is a no-op
    a.controller.inquiry_cancel();
    a.controller.inquiry_cancel();

    // A cancelled inquiry never completes
    a.controller.start_inquiry(Duration::from_millis(500));
    a.controller.inquiry_cancel();
    a.run_for(Duration::from_secs(1));
    assert!(a.take_events().is_empty());
}

#[test]
fn test_validated_link_policy_stubs() {
    let mut a = TestDevice::new(test_properties(0xC8));
    let mut b = TestDevice::new(test_properties(0xD8));
    let (handle, _) = connect_classic(&mut a, &mut b);
    let controller = &mut a.controller;

    assert_eq!(controller.hold_mode(0x0999, 2, 1), ErrorCode::UnknownConnection);
    assert_eq!(
        controller.hold_mode(handle, 1, 2),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(controller.hold_mode(handle, 2, 1), ErrorCode::CommandDisallowed);

    assert_eq!(
        controller.sniff_mode(handle, 2, 1, 0, 0),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(
        controller.sniff_mode(handle, 2, 1, 1, 0x8000),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(
        controller.sniff_mode(handle, 2, 1, 1, 1),
        ErrorCode::CommandDisallowed
    );
    assert_eq!(controller.exit_sniff_mode(handle), ErrorCode::CommandDisallowed);

    assert_eq!(
        controller.qos_setup(handle, 0x03),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(controller.qos_setup(handle, 0x01), ErrorCode::CommandDisallowed);

    assert_eq!(
        controller.flow_specification(handle, 0x02, 0x01),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(
        controller.flow_specification(handle, 0x01, 0x01),
        ErrorCode::CommandDisallowed
    );

    assert_eq!(controller.change_connection_link_key(handle), ErrorCode::CommandDisallowed);
    assert_eq!(controller.master_link_key(1), ErrorCode::CommandDisallowed);
    assert_eq!(controller.switch_role(addr(1), 0), ErrorCode::CommandDisallowed);

    assert_eq!(controller.write_link_policy_settings(handle, 5), ErrorCode::Success);
    assert_eq!(
        controller.write_link_supervision_timeout(handle, 0x100),
        ErrorCode::Success
    );
    assert_eq!(
        controller.write_default_link_policy_settings(8),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(controller.write_default_link_policy_settings(7), ErrorCode::Success);
    assert_eq!(controller.read_default_link_policy_settings(), 7);
}

#[test]
fn test_change_connection_packet_type() {
    let mut a = TestDevice::new(test_properties(0xC9));
    let mut b = TestDevice::new(test_properties(0xD9));
    let (handle, _) = connect_classic(&mut a, &mut b);

    assert_eq!(
        a.controller.change_connection_packet_type(handle, 0xCC18),
        ErrorCode::Success
    );
    a.run_for(20 * MS);
    assert!(a.take_events().iter().any(|e| matches!(
        e,
        HciEvent::ConnectionPacketTypeChanged {
            status: ErrorCode::Success,
            handle: h,
            packet_type: 0xCC18,
        } if *h == handle
    )));
}

#[test]
fn test_extended_advertising_slots() {
    let mut a = TestDevice::new(test_properties(0xCA));

    assert_eq!(a.controller.le_read_number_of_supported_advertising_sets(), 3);
    assert_eq!(
        a.controller.set_le_extended_address(9, addr(1)),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(a.controller.set_le_extended_address(1, le_addr(0xCA)), ErrorCode::Success);
    assert_eq!(
        a.controller.set_le_extended_advertising_data(1, vec![0x02, 0x01, 0x06]),
        ErrorCode::Success
    );
    assert_eq!(
        a.controller.set_le_extended_advertising_parameters(
            1,
            0x20,
            0x20,
            LegacyAdvertisingProperties::AdvInd,
            OwnAddressType::RandomDevice,
            0,
            BdAddr::EMPTY,
            0,
        ),
        ErrorCode::Success
    );
    // 5 => 50 ms duration
    assert_eq!(
        a.controller.set_le_extended_advertising_enable(true, &[(1, 5)]),
        ErrorCode::Success
    );
    assert_eq!(
        a.controller.set_le_extended_advertising_enable(true, &[(7, 0)]),
        ErrorCode::InvalidHciCommandParameters
    );

    // Enabled slots cannot be cleared wholesale
    assert_eq!(a.controller.le_clear_advertising_sets(), ErrorCode::CommandDisallowed);

    a.tick();
    a.run_for(50 * MS);
    let packets = a.take_radio();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].0.source, le_addr(0xCA));
    assert!(matches!(
        packets[0].0.body,
        PacketBody::LeAdvertisement {
            advertisement_type: AdvertisementType::AdvInd,
            ..
        }
    ));

    // The duration elapses and the slot disables itself
    a.run_for(Duration::from_millis(100));
    a.tick();
    a.run_for(50 * MS);
    assert!(a.take_radio().is_empty());

    assert_eq!(a.controller.le_clear_advertising_sets(), ErrorCode::Success);
}

#[test]
fn test_legacy_advertising_interval_floor() {
    let mut a = TestDevice::new(DeviceProperties {
        // 0x10 units on both ends averages to 10 ms
        le_advertising_interval_min: 0x10,
        le_advertising_interval_max: 0x10,
        ..test_properties(0xCB)
    });
    assert_eq!(
        a.controller.set_le_advertising_enable(true),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(a.controller.set_le_advertising_enable(false), ErrorCode::Success);
}

#[test]
fn test_connect_list_capacity_and_initiator() {
    let mut a = TestDevice::new(DeviceProperties {
        le_connect_list_size: 1,
        le_resolving_list_size: 1,
        ..test_properties(0xCC)
    });
    assert_eq!(
        a.controller.le_connect_list_add_device(addr(1), 0),
        ErrorCode::Success
    );
    assert_eq!(
        a.controller.le_connect_list_add_device(addr(2), 0),
        ErrorCode::MemoryCapacityExceeded
    );
    assert!(a.controller.le_connect_list_contains_device(addr(1), 0));
    assert!(a.controller.le_connect_list_full());
    assert_eq!(
        a.controller
            .le_resolving_list_add_device(addr(1), 0, [0u8; 16], [0u8; 16]),
        ErrorCode::Success
    );
    assert!(a.controller.le_resolving_list_full());
    a.controller.le_connect_list_remove_device(addr(1), 0);
    assert!(!a.controller.le_connect_list_contains_device(addr(1), 0));
    // The aligned resolving entry went with it
    assert!(!a.controller.le_resolving_list_contains_device(addr(1), 0));

    // An armed initiator also accepts connect-list members
    let mut b = TestDevice::new(test_properties(0xCD));
    let b_addr = b.controller.properties().address;
    assert_eq!(
        a.controller.le_connect_list_add_device(b_addr, 0),
        ErrorCode::Success
    );
    assert_eq!(
        a.controller.le_create_connection(
            addr(0x11),
            0x00,
            OwnAddressType::PublicDevice,
            0x10,
            0x20,
            0,
            0x0100,
        ),
        ErrorCode::Success
    );
    assert_eq!(b.controller.set_le_advertising_enable(true), ErrorCode::Success);
    b.tick();
    b.run_for(50 * MS);
    b.deliver_to(&mut a);
    a.run_for(50 * MS);
    let packets = a.take_radio();
    assert!(packets
        .iter()
        .any(|(p, _)| matches!(p.body, PacketBody::LeConnect { .. })));
}

#[test]
fn test_le_create_connection_cancel() {
    let mut a = TestDevice::new(test_properties(0xCE));
    assert_eq!(a.controller.le_create_connection_cancel(), ErrorCode::CommandDisallowed);
    assert_eq!(
        a.controller.le_create_connection(
            addr(1),
            0,
            OwnAddressType::PublicDevice,
            0x10,
            0x20,
            0,
            0x0100
        ),
        ErrorCode::Success
    );
    assert_eq!(
        a.controller.le_create_connection(
            addr(2),
            0,
            OwnAddressType::PublicDevice,
            0x10,
            0x20,
            0,
            0x0100
        ),
        ErrorCode::CommandDisallowed
    );
    assert_eq!(a.controller.le_create_connection_cancel(), ErrorCode::Success);
}

#[test]
fn test_oob_replies_validate_data() {
    let mut a = TestDevice::new(test_properties(0xCF));
    // Empty confirmation values are rejected before any state is read
    assert_eq!(
        a.controller.remote_oob_data_request_reply(addr(1), &[], &[1]),
        ErrorCode::InvalidHciCommandParameters
    );
    assert_eq!(
        a.controller.remote_oob_data_request_reply(addr(1), &[1], &[]),
        ErrorCode::InvalidHciCommandParameters
    );
    // With no authentication in flight the reply is refused
    assert_eq!(
        a.controller.remote_oob_data_request_reply(addr(1), &[1], &[1]),
        ErrorCode::AuthenticationFailure
    );
    assert_eq!(
        a.controller.remote_oob_data_request_negative_reply(addr(1)),
        ErrorCode::AuthenticationFailure
    );
    assert_eq!(
        a.controller.user_passkey_request_reply(addr(1), 123456),
        ErrorCode::AuthenticationFailure
    );
}

#[test]
fn test_reset_clears_activity() {
    let mut a = TestDevice::new(test_properties(0xD0));
    assert_eq!(a.controller.set_le_advertising_enable(true), ErrorCode::Success);
    a.controller.set_le_scan_enable(true);
    a.controller.start_inquiry(Duration::from_secs(10));

    a.controller.reset();
    assert_eq!(a.controller.le_scan_mode(), LeScanMode::Disabled);
    a.tick();
    a.run_for(Duration::from_secs(1));
    // No advertisements, no inquiry, no inquiry completion
    assert!(a.take_radio().is_empty());
    assert!(a.take_events().is_empty());
}
