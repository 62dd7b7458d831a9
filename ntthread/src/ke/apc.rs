//! Asynchronous Procedure Calls (APC)
//!
//! APCs allow code to execute asynchronously in the context of a specific
//! thread. Any thread may queue an APC against a thread object; only the
//! target thread ever runs it.
//!
//! # Delivery Points
//!
//! - **Alertable wait**: `sleep_ex(.., alertable = true)` on the target
//!   thread delivers everything pending and reports `WAIT_IO_COMPLETION`
//! - **Thread rundown**: the exit path delivers whatever is still queued
//!   before the thread signals completion, then closes the queue
//!
//! Once a queue is run down, further insertions are rejected and handed
//! back to the caller.
//!
//! # NT Compatibility
//! Equivalent to NT's KAPC / KeInsertQueueApc / KiDeliverApc for user APCs

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};

/// APC routine
///
/// The argument of the Win32 PAPCFUNC is whatever the closure captures.
pub type ApcRoutine = Box<dyn FnOnce() + Send + 'static>;

bitflags! {
    /// APC state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApcFlags: u8 {
        /// Queued through QueueUserAPC
        const USER = 0x01;
        /// Routine has run; the owning queue releases the item
        const MARKED_FOR_REMOVE = 0x02;
        /// Delivered by thread rundown rather than an alertable wait
        const RUNDOWN = 0x04;
    }
}

/// APC object
///
/// Equivalent to NT's KAPC for a user-mode APC
pub struct KApc {
    /// Routine to run in the target thread (taken on delivery)
    routine: Option<ApcRoutine>,
    /// State flags
    flags: ApcFlags,
}

impl KApc {
    /// Create a user APC bound to `routine`
    pub fn new(routine: ApcRoutine) -> Self {
        Self {
            routine: Some(routine),
            flags: ApcFlags::USER,
        }
    }

    /// Get the state flags
    #[inline]
    pub fn flags(&self) -> ApcFlags {
        self.flags
    }

    /// Check whether the routine has already run
    #[inline]
    pub fn is_marked_for_remove(&self) -> bool {
        self.flags.contains(ApcFlags::MARKED_FOR_REMOVE)
    }

    /// Run the routine and mark the item for removal
    fn deliver(&mut self) {
        if let Some(routine) = self.routine.take() {
            routine();
        }
        self.flags.insert(ApcFlags::MARKED_FOR_REMOVE);
    }
}

// ============================================================================
// APC Queue
// ============================================================================

struct ApcQueue {
    /// APCs waiting for delivery, FIFO
    pending: VecDeque<KApc>,
    /// Queue was run down, insertions fail
    run_down: bool,
}

/// Per-thread APC queue
///
/// Equivalent to the user-mode half of NT's KAPC_STATE
pub struct KApcState {
    queue: Mutex<ApcQueue>,
    /// Signaled on insertion and on alerts
    queued: Condvar,
}

impl KApcState {
    /// Create an empty, open queue
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(ApcQueue {
                pending: VecDeque::new(),
                run_down: false,
            }),
            queued: Condvar::new(),
        }
    }

    /// Insert an APC at the tail of the queue
    ///
    /// # Returns
    /// The APC is handed back if the queue was already run down.
    pub fn insert(&self, apc: KApc) -> Result<(), KApc> {
        let mut queue = self.queue.lock();
        if queue.run_down {
            return Err(apc);
        }

        queue.pending.push_back(apc);
        self.queued.notify_all();
        Ok(())
    }

    /// Number of APCs waiting for delivery
    pub fn pending_count(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Check if the queue has been run down
    pub fn is_run_down(&self) -> bool {
        self.queue.lock().run_down
    }

    /// Deliver every pending APC on the calling thread
    ///
    /// Must only be called by the thread that owns this queue. The queue
    /// lock is not held while a routine runs, so routines may queue more
    /// APCs; those are delivered in the same pass.
    ///
    /// # Returns
    /// Number of APCs delivered
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;

        while let Some(mut apc) = self.pop() {
            log::trace!("[APC] Delivering user APC");
            apc.deliver();
            self.release(apc);
            delivered += 1;
        }

        delivered
    }

    /// Block until an APC is queued, `interrupted` returns true, or the
    /// timeout expires
    ///
    /// # Returns
    /// true if at least one APC is pending
    pub fn wait_for_queued(&self, timeout: Option<Duration>, interrupted: impl Fn() -> bool) -> bool {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut queue = self.queue.lock();

        loop {
            if !queue.pending.is_empty() {
                return true;
            }
            if interrupted() || timeout == Some(Duration::ZERO) {
                return false;
            }

            match deadline {
                Some(deadline) => {
                    if self.queued.wait_until(&mut queue, deadline).timed_out() {
                        return !queue.pending.is_empty();
                    }
                }
                None => self.queued.wait(&mut queue),
            }
        }
    }

    /// Wake a thread blocked in `wait_for_queued` so it re-checks its
    /// interruption condition
    pub fn alert(&self) {
        let _queue = self.queue.lock();
        self.queued.notify_all();
    }

    /// Deliver everything still pending, then close the queue
    ///
    /// Runs on the terminating thread. A routine that unwinds (panics or
    /// calls `exit_thread`) is logged and skipped so the rest of the
    /// rundown still happens.
    ///
    /// # Returns
    /// Number of APCs delivered
    pub fn run_down(&self) -> usize {
        let mut delivered = 0;

        loop {
            let mut apc = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(apc) => apc,
                    None => {
                        queue.run_down = true;
                        break;
                    }
                }
            };

            apc.flags.insert(ApcFlags::RUNDOWN);
            if panic::catch_unwind(AssertUnwindSafe(|| apc.deliver())).is_err() {
                log::error!("[APC] APC routine unwound during thread rundown");
            }
            self.release(apc);
            delivered += 1;
        }

        delivered
    }

    /// Close the queue and discard pending APCs without running them
    ///
    /// # Returns
    /// Number of APCs discarded
    pub fn uninit(&self) -> usize {
        let discarded = {
            let mut queue = self.queue.lock();
            queue.run_down = true;
            core::mem::take(&mut queue.pending)
        };

        // Routines are dropped outside the lock; their captures may do anything
        let count = discarded.len();
        drop(discarded);
        count
    }

    fn pop(&self) -> Option<KApc> {
        self.queue.lock().pending.pop_front()
    }

    fn release(&self, apc: KApc) {
        debug_assert!(apc.is_marked_for_remove() || apc.routine.is_none());
        drop(apc);
    }
}

impl Default for KApcState {
    fn default() -> Self {
        Self::new()
    }
}
