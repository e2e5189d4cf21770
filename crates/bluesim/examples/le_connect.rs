//! Two virtual controllers establishing an LE connection.
//!
//! Device A advertises; device B scans and initiates. The radio bus is
//! a pair of in-memory queues, and time is a virtual clock driven from
//! this loop, so the whole exchange runs instantly and
//! deterministically.
//!
//! Run with: cargo run --example le_connect

use bluesim::{
    BdAddr, DeviceProperties, LinkLayerController, LinkLayerPacket, OwnAddressType, PeriodicTask,
    Phy, Task, TaskId, TaskScheduler,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

enum Job {
    Once(Task),
    Periodic { period: Duration, task: PeriodicTask },
}

struct Scheduled {
    id: TaskId,
    due: Duration,
    job: Job,
}

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Scheduled>,
    now: Duration,
    next_id: TaskId,
}

struct QueueScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl TaskScheduler for QueueScheduler {
    fn schedule(&mut self, delay: Duration, task: Task) -> TaskId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let due = state.now + delay;
        state.queue.push(Scheduled {
            id,
            due,
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
        let id = state.next_id;
        let due = state.now + delay;
        state.queue.push(Scheduled {
            id,
            due,
            job: Job::Periodic { period, task },
        });
        id
    }

    fn cancel(&mut self, id: TaskId) {
        let mut state = self.state.lock().unwrap();
        state.queue.retain(|scheduled| scheduled.id != id);
    }
}

struct Device {
    name: &'static str,
    controller: LinkLayerController,
    radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>>,
    scheduler: Arc<Mutex<SchedulerState>>,
    base: Instant,
}

impl Device {
    fn new(name: &'static str, properties: DeviceProperties) -> Self {
        let mut controller = LinkLayerController::new(properties);
        let radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let scheduler = Arc::new(Mutex::new(SchedulerState::default()));

        controller.register_event_channel(Box::new(move |event| {
            println!("[{name}] HCI event: {event:?}");
        }));
        let tx = radio.clone();
        controller.register_remote_channel(Box::new(move |packet, phy| {
            tx.lock().unwrap().push_back((packet, phy));
        }));
        controller.register_task_scheduler(Box::new(QueueScheduler {
            state: scheduler.clone(),
        }));

        Self {
            name,
            controller,
            radio,
            scheduler,
            base: Instant::now(),
        }
    }

    /// Advance the virtual clock, running every task that falls due
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
                    .min_by_key(|(_, s)| s.due)
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
                    let due = state.now + period;
                    state.queue.push(Scheduled {
                        id: scheduled.id,
                        due,
                        job: Job::Periodic { period, task },
                    });
                }
            }
        }
        self.scheduler.lock().unwrap().now = target;
    }

    fn tick(&mut self) {
        let now = self.base + self.scheduler.lock().unwrap().now;
        self.controller.tick(now);
    }

    /// Deliver everything this device has transmitted to `other`
    fn deliver_to(&mut self, other: &mut Device) {
        let packets: Vec<(LinkLayerPacket, Phy)> =
            self.radio.lock().unwrap().drain(..).collect();
        for (packet, phy) in packets {
            println!(
                "[{} -> {}] {:?} packet: {}",
                self.name,
                other.name,
                phy,
                packet.body.kind()
            );
            other.controller.incoming_packet(packet);
        }
    }
}

fn main() {
    env_logger::init();

    let addr_a = BdAddr::new([0x01, 0x00, 0x00, 0xC0, 0xDE, 0xAA]);
    let addr_b = BdAddr::new([0x02, 0x00, 0x00, 0xC0, 0xDE, 0xBB]);

    let mut a = Device::new(
        "A",
        DeviceProperties {
            address: addr_a,
            // 0x20 units on both ends = 20 ms advertising interval
            le_advertising_interval_min: 0x20,
            le_advertising_interval_max: 0x20,
            le_advertisement: vec![0x02, 0x01, 0x06],
            ..DeviceProperties::default()
        },
    );
    let mut b = Device::new(
        "B",
        DeviceProperties {
            address: addr_b,
            ..DeviceProperties::default()
        },
    );

    // A advertises, B scans passively with a connection armed
    a.controller.set_le_advertising_enable(true);
    b.controller.set_le_scan_type(0);
    b.controller.set_le_scan_enable(true);
    b.controller.le_create_connection(
        addr_a,
        0x00,
        OwnAddressType::PublicDevice,
        0x0010,
        0x0020,
        0x0000,
        0x0100,
    );

    let step = Duration::from_millis(50);

    // A's advertisement reaches B, which answers with a connect request
    a.tick();
    a.run_for(step);
    a.deliver_to(&mut b);

    // B's connect request reaches A, completing the slave side
    b.run_for(step);
    b.deliver_to(&mut a);

    // A's connect completion reaches B, completing the master side
    a.run_for(step);
    a.deliver_to(&mut b);

    println!("Both sides are connected.");
}
