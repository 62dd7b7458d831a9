//! Thread Disposal
//!
//! Decides who releases a thread's resources when the owner closing the
//! handle races the thread's own exit.
//!
//! # Protocol
//! - **Close** (owner): if the thread was started and its termination
//!   event is not yet set, the thread is detached and the disposal state
//!   moves `Live -> DetachRequested`. Nothing is released. Otherwise the
//!   native thread is joined and the owner reclaims (`Live -> Reclaimed`).
//! - **Exit** (the thread itself): after the event is set, a thread that
//!   was detached reclaims itself (`DetachRequested -> Reclaimed`).
//!
//! Both moves are compare-and-swap, so exactly one side reclaims.
//!
//! # Locking
//! Joins never happen under the state mutex; the exit path takes that
//! mutex after setting the event.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::ke::{DisposalState, KEvent, KThread, ThreadState, WaitStatus};
use crate::ob::{HandleOps, ObjectType};
use crate::rtl::{ThreadError, ThreadResult};

impl HandleOps for KThread {
    fn object_type(&self) -> ObjectType {
        self.header_type()
    }

    fn is_handled(&self) -> bool {
        self.header_type() == ObjectType::Thread
            && self.disposal_state() != DisposalState::Reclaimed
    }

    fn close(&self) -> ThreadResult<()> {
        close_thread(self)
    }

    fn waitable(&self) -> Option<&KEvent> {
        Some(&self.event)
    }

    fn cleanup(&self) -> ThreadResult<WaitStatus> {
        cleanup_thread(self)
    }

    fn into_thread(self: Arc<Self>) -> Option<Arc<KThread>> {
        Some(self)
    }
}

impl Drop for KThread {
    /// Last reference dropped without a close
    ///
    /// The memory goes with the `Arc`; only the registry entry needs
    /// removing here.
    fn drop(&mut self) {
        if self.disposal_state() == DisposalState::Reclaimed {
            return;
        }

        log::debug!("[PS] Thread {} dropped without close", self.thread_id());

        #[cfg(feature = "thread-list")]
        if let (Some(native_id), Some(subsystem)) = (self.native_id(), super::init::try_subsystem()) {
            subsystem.thread_list().remove(native_id);
        }
    }
}

/// Owner side of the disposal protocol
fn close_thread(thread: &KThread) -> ThreadResult<()> {
    if thread.is_main() {
        log::debug!("[PS] Closing the main thread pseudo-handle");
        return Ok(());
    }

    let mut control = thread.lock_control();
    if thread.disposal_state() != DisposalState::Live {
        return Err(ThreadError::InvalidHandle);
    }

    if control.started && !thread.event.wait(Some(Duration::ZERO)) {
        control.detached = true;
        control.state = ThreadState::Detached;
        // Dropping the join handle detaches the native thread
        drop(control.native.take());
        thread.transition_disposal(DisposalState::Live, DisposalState::DetachRequested);
        drop(control);

        log::debug!("[PS] Thread {} detached while running", thread.thread_id());
        return Ok(());
    }

    let native = control.native.take();
    drop(control);

    join_native(thread, native)?;

    if !reclaim(thread, DisposalState::Live) {
        return Err(ThreadError::InvalidHandle);
    }
    Ok(())
}

/// Post-wait hook: join a finished thread that was not joined yet
fn cleanup_thread(thread: &KThread) -> ThreadResult<WaitStatus> {
    let native = {
        let mut control = thread.lock_control();
        if control.joined {
            None
        } else {
            control.native.take()
        }
    };

    if native.is_some() {
        join_native(thread, native)?;
        thread.lock_control().joined = true;
    }
    Ok(WaitStatus::Object0)
}

/// Join the native thread
///
/// A thread that was asked to terminate but has not reached a cancellation
/// point is detached instead, and so is the calling thread itself.
pub(crate) fn join_native(thread: &KThread, native: Option<JoinHandle<()>>) -> ThreadResult<()> {
    let Some(native) = native else {
        return Ok(());
    };

    if native.thread().id() == std::thread::current().id() {
        return Ok(());
    }

    if thread.cancel_requested() && !native.is_finished() {
        log::warn!(
            "[PS] Thread {} terminated but still running, not joining",
            thread.thread_id()
        );
        return Ok(());
    }

    native.join().map_err(|_| {
        log::error!("[PS] Failed to join thread {}", thread.thread_id());
        ThreadError::WaitFailed
    })
}

/// Release a thread's resources
///
/// # Arguments
/// * `expected` - Disposal state the caller is entitled to reclaim from
///
/// # Returns
/// true if this caller performed the reclamation
pub(crate) fn reclaim(thread: &KThread, expected: DisposalState) -> bool {
    if !thread.transition_disposal(expected, DisposalState::Reclaimed) {
        return false;
    }

    let (native, native_id) = {
        let mut control = thread.lock_control();
        control.state = ThreadState::Reclaimed;
        (control.native.take(), control.native_id)
    };
    drop(native);
    drop(thread.take_start_routine());

    let discarded = thread.apc.uninit();

    #[cfg(feature = "thread-list")]
    if let Some(native_id) = native_id {
        super::init::subsystem().thread_list().remove(native_id);
    }
    #[cfg(not(feature = "thread-list"))]
    let _ = native_id;

    thread.note_reclaimed();
    log::debug!(
        "[PS] Thread {} reclaimed ({} APCs discarded)",
        thread.thread_id(),
        discarded
    );
    true
}
