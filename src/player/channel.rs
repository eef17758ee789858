//! Signalling between the control side and the worker thread.
//!
//! Two condition variables, both used with the control block mutex:
//! `worker_wakeup` wakes the worker when a command is pending and
//! `main_wakeup` wakes control-side callers when the worker has acted.

use parking_lot::{Condvar, MutexGuard};
use std::time::Duration;

use super::control::ControlState;
use super::state::CommandFlags;

/// How long a signalled submit waits before re-notifying the worker.
const RESIGNAL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
pub struct CommandChannel {
    worker_wakeup: Condvar,
    main_wakeup: Condvar,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flag`, wake the worker and block until the worker clears it.
    pub fn submit(&self, state: &mut MutexGuard<'_, ControlState>, flag: CommandFlags) {
        state.flags.insert(flag);
        self.worker_wakeup.notify_one();
        while state.flags.contains(flag) {
            self.main_wakeup.wait(state);
        }
    }

    /// Set `flag` and keep re-signalling the worker until it clears it.
    ///
    /// Used for Play and Seek. Returns only once the flag is cleared; the
    /// periodic re-notify covers a worker that is busy decoding rather than
    /// parked on its wakeup.
    pub fn submit_signalled(&self, state: &mut MutexGuard<'_, ControlState>, flag: CommandFlags) {
        state.flags.insert(flag);
        while state.flags.contains(flag) {
            self.worker_wakeup.notify_one();
            self.main_wakeup.wait_for(state, RESIGNAL_INTERVAL);
        }
    }

    /// Wake the worker without waiting for an acknowledgment.
    pub fn wake_worker(&self) {
        self.worker_wakeup.notify_one();
    }

    /// Park the worker until the control side signals it.
    pub fn wait_for_command(&self, state: &mut MutexGuard<'_, ControlState>) {
        self.worker_wakeup.wait(state);
    }

    /// Tell control-side waiters the worker has acted.
    pub fn acknowledge(&self) {
        self.main_wakeup.notify_all();
    }
}
