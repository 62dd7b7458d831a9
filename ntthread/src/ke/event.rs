//! Kernel Event Implementation (KEVENT)
//!
//! Events are the waitable signal behind every handle in this crate. A
//! thread object embeds one that becomes signaled when the thread
//! terminates, and two more that carry its startup rendezvous.
//!
//! Two types of events:
//! - **Notification (Manual Reset)**: Stays signaled until explicitly reset.
//!   Wakes ALL waiting threads when signaled.
//! - **Synchronization (Auto Reset)**: A satisfied wait consumes the signal,
//!   so only one waiter is released per set.
//!
//! # Usage
//! ```
//! use ntthread::ke::{EventType, KEvent};
//! use std::time::Duration;
//!
//! let event = KEvent::new(EventType::Notification, false);
//! assert!(!event.wait(Some(Duration::ZERO)));
//!
//! event.set();
//! assert!(event.wait(None));
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::dispatcher::WaitStatus;
use crate::ob::{Handle, HandleOps, ObjectType};
use crate::rtl::{fail, ThreadError, ThreadResult};

/// Event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    /// Notification event (manual reset)
    /// - Wakes ALL waiters when signaled
    /// - Stays signaled until explicitly reset
    Notification = 0,
    /// Synchronization event (auto reset)
    /// - Wakes ONE waiter when signaled
    /// - Automatically resets after satisfying a wait
    Synchronization = 1,
}

/// Kernel Event
///
/// Equivalent to NT's KEVENT
pub struct KEvent {
    /// Event type (notification or synchronization)
    event_type: EventType,
    /// Signal state, true = signaled
    signal_state: Mutex<bool>,
    /// Threads blocked in `wait`
    waiters: Condvar,
    /// Handle was closed
    closed: AtomicBool,
}

impl KEvent {
    /// Create a new event
    ///
    /// # Arguments
    /// * `event_type` - Notification (manual reset) or Synchronization (auto reset)
    /// * `initial_state` - true = signaled, false = not signaled
    pub const fn new(event_type: EventType, initial_state: bool) -> Self {
        Self {
            event_type,
            signal_state: Mutex::new(initial_state),
            waiters: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the event type
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Check if the event is signaled without consuming the signal
    #[inline]
    pub fn is_signaled(&self) -> bool {
        *self.signal_state.lock()
    }

    /// Set (signal) the event
    ///
    /// Returns the previous signal state
    pub fn set(&self) -> bool {
        let mut signaled = self.signal_state.lock();
        let was_signaled = *signaled;
        *signaled = true;

        match self.event_type {
            EventType::Notification => {
                self.waiters.notify_all();
            }
            EventType::Synchronization => {
                self.waiters.notify_one();
            }
        }

        was_signaled
    }

    /// Reset (unsignal) the event
    ///
    /// Returns the previous signal state
    pub fn reset(&self) -> bool {
        let mut signaled = self.signal_state.lock();
        let was_signaled = *signaled;
        *signaled = false;
        was_signaled
    }

    /// Wait for the event to be signaled
    ///
    /// # Arguments
    /// * `timeout` - Maximum time to block, `None` = infinite
    ///
    /// # Returns
    /// true if the event was signaled, false if the wait timed out.
    /// A zero timeout never blocks.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.signal_state.lock();

        if !*signaled {
            if timeout == Some(Duration::ZERO) {
                return false;
            }

            // An unrepresentable deadline degrades to an infinite wait
            let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

            while !*signaled {
                match deadline {
                    Some(deadline) => {
                        if self.waiters.wait_until(&mut signaled, deadline).timed_out()
                            && !*signaled
                        {
                            return false;
                        }
                    }
                    None => self.waiters.wait(&mut signaled),
                }
            }
        }

        if self.event_type == EventType::Synchronization {
            *signaled = false;
        }

        true
    }
}

impl Default for KEvent {
    fn default() -> Self {
        Self::new(EventType::Notification, false)
    }
}

impl HandleOps for KEvent {
    fn object_type(&self) -> ObjectType {
        ObjectType::Event
    }

    fn is_handled(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> ThreadResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ThreadError::InvalidHandle);
        }
        // Storage is released with the last handle reference
        Ok(())
    }

    fn waitable(&self) -> Option<&KEvent> {
        Some(self)
    }

    fn cleanup(&self) -> ThreadResult<WaitStatus> {
        Ok(WaitStatus::Object0)
    }
}

// ============================================================================
// Event Handle Services
// ============================================================================

/// Create an event object and return a handle to it
///
/// Equivalent to CreateEvent without a name or security attributes.
pub fn create_event(manual_reset: bool, initial_state: bool) -> Handle {
    let event_type = if manual_reset {
        EventType::Notification
    } else {
        EventType::Synchronization
    };

    Handle::new(std::sync::Arc::new(KEvent::new(event_type, initial_state)))
}

fn event_from_handle(handle: &Handle) -> ThreadResult<&KEvent> {
    let ops = handle.ops();
    if ops.object_type() != ObjectType::Event || !ops.is_handled() {
        return fail(ThreadError::InvalidHandle);
    }

    match ops.waitable() {
        Some(event) => Ok(event),
        None => fail(ThreadError::InvalidHandle),
    }
}

/// Signal an event object (SetEvent)
pub fn set_event(handle: &Handle) -> ThreadResult<()> {
    event_from_handle(handle)?.set();
    Ok(())
}

/// Unsignal an event object (ResetEvent)
pub fn reset_event(handle: &Handle) -> ThreadResult<()> {
    event_from_handle(handle)?.reset();
    Ok(())
}
