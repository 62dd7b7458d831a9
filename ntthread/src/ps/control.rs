//! Thread Control
//!
//! Operations on an existing thread handle.
//!
//! # NT Compatibility
//! - `resume_thread` - Equivalent to ResumeThread
//! - `suspend_thread` - SuspendThread (not supported)
//! - `get_exit_code_thread` - Equivalent to GetExitCodeThread
//! - `get_thread_id` - Equivalent to GetThreadId
//! - `queue_user_apc` - Equivalent to QueueUserAPC
//! - `switch_to_thread` - Equivalent to SwitchToThread
//! - `set_thread_priority` / `set_thread_affinity_mask` (not supported)

use std::sync::Arc;

use super::create::start_thread;
use crate::ke::{DisposalState, KApc, KThread};
use crate::ob::Handle;
use crate::rtl::{fail, ThreadError, ThreadResult};

/// Resolve a handle to a live thread object
fn thread_from_handle(handle: &Handle, operation: &str) -> ThreadResult<Arc<KThread>> {
    match handle.thread() {
        Some(thread) if handle.ops().is_handled() => Ok(thread),
        _ => {
            log::error!("[PS] {}: invalid {} handle", operation, handle.object_type());
            fail(ThreadError::InvalidHandle)
        }
    }
}

/// Resume a thread created with `CREATE_SUSPENDED`
///
/// # Returns
/// The previous suspend count: 1 if the thread was launched, 0 if it was
/// already running or has terminated (a warning is logged)
pub fn resume_thread(handle: &Handle) -> ThreadResult<u32> {
    let thread = thread_from_handle(handle, "resume_thread")?;

    let mut control = thread.lock_control();
    if thread.disposal_state() != DisposalState::Live {
        drop(control);
        return fail(ThreadError::InvalidHandle);
    }

    if control.started || control.exited {
        drop(control);
        log::warn!("[PS] Thread {} is not suspended", thread.thread_id());
        return Ok(0);
    }

    if let Err(error) = start_thread(&thread, &mut control) {
        drop(control);
        log::error!("[PS] Failed to resume thread {}: {}", thread.thread_id(), error);
        return fail(error);
    }
    Ok(1)
}

/// Suspend a thread
///
/// Native threads cannot be suspended from outside; always fails with
/// `ERROR_CALL_NOT_IMPLEMENTED`.
pub fn suspend_thread(_handle: &Handle) -> ThreadResult<u32> {
    log::error!("[PS] suspend_thread: not implemented");
    fail(ThreadError::NotImplemented)
}

/// Get a thread's exit code
///
/// Readable at any time, including after the thread was reclaimed through
/// another clone of the handle. `STILL_ACTIVE` until the thread terminates.
pub fn get_exit_code_thread(handle: &Handle) -> ThreadResult<u32> {
    match handle.thread() {
        Some(thread) => Ok(thread.exit_code()),
        None => {
            log::error!("[PS] get_exit_code_thread: invalid {} handle", handle.object_type());
            fail(ThreadError::InvalidHandle)
        }
    }
}

/// Get a thread's id
pub fn get_thread_id(handle: &Handle) -> ThreadResult<u32> {
    match handle.thread() {
        Some(thread) => Ok(thread.thread_id()),
        None => fail(ThreadError::InvalidHandle),
    }
}

/// Queue a user APC to a thread
///
/// The routine runs on the target thread the next time it enters an
/// alertable wait, and at the latest during its exit, before its resources
/// are released.
///
/// # Returns
/// `ERROR_INVALID_PARAMETER` if `handle` is not a live thread or the
/// thread has already run down its queue; the routine is dropped unrun
pub fn queue_user_apc<F>(routine: F, handle: &Handle) -> ThreadResult<()>
where
    F: FnOnce() + Send + 'static,
{
    let thread = match handle.thread() {
        Some(thread) if handle.ops().is_handled() => thread,
        _ => {
            log::error!("[APC] queue_user_apc: target is a {} handle", handle.object_type());
            return fail(ThreadError::InvalidParameter);
        }
    };

    if thread.apc.insert(KApc::new(Box::new(routine))).is_err() {
        log::error!("[APC] Thread {} no longer accepts APCs", thread.thread_id());
        return fail(ThreadError::InvalidParameter);
    }

    log::debug!("[APC] Queued user APC to thread {}", thread.thread_id());
    Ok(())
}

/// Yield the processor to another runnable thread
///
/// # Returns
/// Always true
pub fn switch_to_thread() -> bool {
    std::thread::yield_now();
    true
}

/// Set a thread's priority (not supported)
pub fn set_thread_priority(_handle: &Handle, _priority: i32) -> ThreadResult<()> {
    log::error!("[PS] set_thread_priority: not implemented");
    fail(ThreadError::NotImplemented)
}

/// Set a thread's processor affinity (not supported)
///
/// # Returns
/// The previous mask on success
pub fn set_thread_affinity_mask(_handle: &Handle, _mask: usize) -> ThreadResult<usize> {
    log::error!("[PS] set_thread_affinity_mask: not implemented");
    fail(ThreadError::NotImplemented)
}
