//! Admission control: minimum priority and debug mode.

use harbour_types::Priority;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Shared admission state for one logging context.
///
/// Read on every emit, written rarely by an administrator. The threshold is
/// behind a mutex; the debug flag is a single word and uses an atomic.
#[derive(Debug)]
pub struct PriorityGate {
    min_priority: Mutex<Priority>,
    debug_mode: AtomicBool,
}

impl PriorityGate {
    /// Creates a gate with debug mode off.
    pub fn new(min_priority: Priority) -> Self {
        Self {
            min_priority: Mutex::new(min_priority),
            debug_mode: AtomicBool::new(false),
        }
    }

    /// Current minimum priority.
    pub fn min_priority(&self) -> Priority {
        // A poisoned lock still holds a valid `Copy` value.
        *self
            .min_priority
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the minimum priority and returns the previous one.
    pub fn set_min_priority(&self, priority: Priority) -> Priority {
        let mut guard = self
            .min_priority
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = *guard;
        *guard = priority;
        tracing::info!(from = %previous, to = %priority, "minimum log priority changed");
        previous
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode.load(Ordering::Acquire)
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        let previous = self.debug_mode.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::info!(enabled, "debug logging toggled");
        }
    }

    /// True iff `rank(priority) >= rank(min_priority)`.
    pub fn should_admit(&self, priority: Priority) -> bool {
        priority.at_least(self.min_priority())
    }
}

impl Default for PriorityGate {
    fn default() -> Self {
        Self::new(Priority::Info)
    }
}
