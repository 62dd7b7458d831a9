//! Current Thread
//!
//! Per-thread record of which thread object the calling native thread is.
//! The launcher installs it before the entry routine runs and clears it
//! after disposal; the main thread is recognized by native identity.
//!
//! # NT Compatibility
//! - `get_current_thread` - Equivalent to GetCurrentThread
//! - `get_current_thread_id` - Equivalent to GetCurrentThreadId

use core::cell::{Cell, RefCell};
use std::sync::Arc;

use super::cid::allocate_thread_id;
use super::init::subsystem;
use crate::ke::KThread;
use crate::ob::Handle;

thread_local! {
    /// Thread object of a thread started by this crate
    static CURRENT_THREAD: RefCell<Option<Arc<KThread>>> = const { RefCell::new(None) };
    /// TID lazily assigned to threads not started by this crate
    static FOREIGN_TID: Cell<u32> = const { Cell::new(0) };
}

/// Install the calling thread's object
pub(crate) fn set_current(thread: &Arc<KThread>) {
    let _ = CURRENT_THREAD.try_with(|current| *current.borrow_mut() = Some(thread.clone()));
}

/// Remove the calling thread's object
pub(crate) fn clear_current() {
    let _ = CURRENT_THREAD.try_with(|current| current.borrow_mut().take());
}

/// Thread object installed by the launcher, if any
pub(crate) fn managed_thread() -> Option<Arc<KThread>> {
    CURRENT_THREAD
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

/// Thread object of the caller: a started thread or the main thread
pub(crate) fn current_thread_object() -> Option<Arc<KThread>> {
    if let Some(thread) = managed_thread() {
        return Some(thread);
    }

    let subsystem = subsystem();
    if subsystem.is_main_thread(std::thread::current().id()) {
        return Some(subsystem.main_thread().clone());
    }
    None
}

/// Get a handle to the calling thread
///
/// The main thread resolves to its pseudo-handle without consulting the
/// thread registry. Closing the returned handle of a started thread
/// detaches it like closing the creator's handle would.
///
/// # Returns
/// None (and an error is logged) if the caller is a native thread that was
/// neither started by this crate nor the main thread
pub fn get_current_thread() -> Option<Handle> {
    match current_thread_object() {
        Some(thread) => Some(Handle::new(thread)),
        None => {
            log::error!(
                "[PS] get_current_thread: {:?} is not a known thread",
                std::thread::current().id()
            );
            None
        }
    }
}

/// Get the calling thread's id
///
/// Native threads unknown to the crate get a stable id assigned on first
/// call.
pub fn get_current_thread_id() -> u32 {
    if let Some(thread) = current_thread_object() {
        return thread.thread_id();
    }

    FOREIGN_TID
        .try_with(|tid| {
            if tid.get() == 0 {
                tid.set(allocate_thread_id());
            }
            tid.get()
        })
        .unwrap_or(0)
}
