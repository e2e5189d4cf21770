//! Two virtual controllers establishing a BR/EDR connection.
//!
//! Device A pages device B; B's host accepts the connection request
//! and both sides report a completed connection. As in the LE example,
//! the radio is an in-memory queue and time is virtual.
//!
//! Run with: cargo run --example classic_page

use bluesim::{
    BdAddr, DeviceProperties, HciEvent, LinkLayerController, LinkLayerPacket, PeriodicTask, Phy,
    Task, TaskId, TaskScheduler,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

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
    events: Arc<Mutex<VecDeque<HciEvent>>>,
    radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>>,
    scheduler: Arc<Mutex<SchedulerState>>,
}

impl Device {
    fn new(name: &'static str, properties: DeviceProperties) -> Self {
        let mut controller = LinkLayerController::new(properties);
        let events: Arc<Mutex<VecDeque<HciEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let radio: Arc<Mutex<VecDeque<(LinkLayerPacket, Phy)>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let scheduler = Arc::new(Mutex::new(SchedulerState::default()));

        let sink = events.clone();
        controller.register_event_channel(Box::new(move |event| {
            println!("[{name}] HCI event: {event:?}");
            sink.lock().unwrap().push_back(event);
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
            events,
            radio,
            scheduler,
        }
    }

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

    fn last_connection_request(&self) -> Option<BdAddr> {
        self.events.lock().unwrap().iter().find_map(|e| match e {
            HciEvent::ConnectionRequest { bd_addr, .. } => Some(*bd_addr),
            _ => None,
        })
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

    b.controller.set_page_scan_enable(true);

    // A pages B
    a.controller.create_connection(addr_b, 1);
    a.run_for(Duration::from_millis(50));
    a.deliver_to(&mut b);

    // B's host sees the connection request and accepts it
    let peer = b
        .last_connection_request()
        .expect("no connection request on B");
    b.controller.accept_connection_request(peer, true);
    b.run_for(Duration::from_millis(250));
    b.deliver_to(&mut a);

    println!("Both sides are connected.");
}
