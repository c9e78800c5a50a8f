use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// At-most-one-save guard.
///
/// `try_acquire` hands out a `SaveGuard` only when no save is active. The
/// guard releases the gate on drop, including during a panic unwind.
#[derive(Default)]
pub(crate) struct SaveGate {
    active: Mutex<bool>,
    released: Condvar,
}

impl SaveGate {
    pub fn try_acquire(self: &Arc<Self>) -> Option<SaveGuard> {
        let mut active = self.active.lock();
        if *active {
            return None;
        }
        *active = true;
        Some(SaveGuard {
            gate: Arc::clone(self),
        })
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock()
    }

    /// Block until no save is active.
    pub fn wait_idle(&self) {
        let mut active = self.active.lock();
        while *active {
            self.released.wait(&mut active);
        }
    }
}

pub(crate) struct SaveGuard {
    gate: Arc<SaveGate>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        *self.gate.active.lock() = false;
        self.gate.released.notify_all();
    }
}
