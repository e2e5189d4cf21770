//! Deferred-task scheduler interface
//!
//! The controller never sleeps: every timed behavior (radio latency,
//! page acceptance delay, staged pairing events) is a closure handed to
//! an externally provided scheduler, to be applied back to the
//! controller when due. Implementations decide what "when due" means;
//! tests drive a virtual clock.

use crate::controller::LinkLayerController;
use std::time::Duration;

/// Opaque identifier of a scheduled task
pub type TaskId = u64;

/// Sentinel meaning "no task scheduled"
pub const INVALID_TASK_ID: TaskId = 0;

/// A one-shot deferred action applied to the controller when due
pub type Task = Box<dyn FnOnce(&mut LinkLayerController) + Send>;

/// A repeating deferred action
pub type PeriodicTask = Box<dyn FnMut(&mut LinkLayerController) + Send>;

/// Scheduler the controller hands its deferred work to
///
/// `cancel` is best-effort: cancelling an unknown or already-run task
/// id is a no-op.
pub trait TaskScheduler: Send {
    fn schedule(&mut self, delay: Duration, task: Task) -> TaskId;

    fn schedule_periodic(&mut self, delay: Duration, period: Duration, task: PeriodicTask)
        -> TaskId;

    fn cancel(&mut self, id: TaskId);
}
