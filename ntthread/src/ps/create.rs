//! Thread Creation
//!
//! Creates thread objects and launches their native threads.
//!
//! # Startup Rendezvous
//! Starting a thread is a two-sided handshake:
//! 1. The creator spawns the native thread and waits for `ready`
//! 2. The child installs itself as current, claims its entry routine,
//!    sets `ready` and waits for `start_permitted`
//! 3. The creator registers the thread, then sets `start_permitted`
//! 4. The child verifies its registration and runs the entry routine
//!
//! Each wait is bounded by `ThreadConfig::rendezvous_timeout`. When a wait
//! times out startup proceeds unordered; a child that then finds itself
//! unregistered reports a startup failure and skips its entry routine.
//! Configure an unbounded timeout to rule this out.
//!
//! # NT Compatibility
//! - `create_thread` - Equivalent to CreateThread
//! - `create_remote_thread` - CreateRemoteThread (not supported)

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use bitflags::bitflags;

use super::cid::allocate_thread_id;
use super::current::{clear_current, set_current};
use super::exit::{run_exit_path, ThreadExit};
use super::init::subsystem;
use crate::ke::thread::ThreadControl;
use crate::ke::{KThread, StartRoutine, ThreadState, STATUS_UNHANDLED_EXCEPTION};
use crate::ob::Handle;
use crate::rtl::{fail, ThreadError, ThreadResult};

bitflags! {
    /// Thread creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CreationFlags: u32 {
        /// Do not launch the native thread until `resume_thread`
        const CREATE_SUSPENDED = 0x0000_0004;
        /// Stack size is a reservation rather than a commit size (accepted, no effect)
        const STACK_SIZE_PARAM_IS_A_RESERVATION = 0x0001_0000;
    }
}

/// Create a thread
///
/// # Arguments
/// * `stack_size` - Stack size in bytes, 0 for the configured default
/// * `start_routine` - Entry routine; its return value is the exit code
/// * `flags` - `CREATE_SUSPENDED` defers the launch to `resume_thread`
///
/// # Returns
/// Handle to the new thread, or `OutOfResources` if the native thread could
/// not be spawned (nothing is left allocated in that case)
pub fn create_thread<F>(stack_size: usize, start_routine: F, flags: CreationFlags) -> ThreadResult<Handle>
where
    F: FnOnce() -> u32 + Send + 'static,
{
    // The creator of the first thread becomes the main thread
    subsystem();

    let thread = Arc::new(KThread::new(allocate_thread_id(), stack_size, Box::new(start_routine)));

    if flags.contains(CreationFlags::CREATE_SUSPENDED) {
        thread.lock_control().state = ThreadState::StartedSuspended;
        // Not running, so waiters see it signaled until it is resumed
        thread.event.set();
        log::debug!("[PS] Created suspended thread {}", thread.thread_id());
    } else {
        let mut control = thread.lock_control();
        if let Err(error) = start_thread(&thread, &mut control) {
            drop(control);
            log::error!("[PS] Failed to start thread {}: {}", thread.thread_id(), error);
            return fail(error);
        }
    }

    Ok(Handle::new(thread))
}

/// Create a thread in another process
///
/// Cross-process creation is not supported; this always fails with
/// `ERROR_CALL_NOT_IMPLEMENTED` and never runs `start_routine`.
pub fn create_remote_thread<F>(
    _process: &Handle,
    _stack_size: usize,
    _start_routine: F,
    _flags: CreationFlags,
) -> ThreadResult<Handle>
where
    F: FnOnce() -> u32 + Send + 'static,
{
    log::error!("[PS] create_remote_thread: not implemented");
    fail(ThreadError::NotImplemented)
}

/// Launch the native thread for a thread object
///
/// Called with the state mutex held. On spawn failure the object is
/// returned to its previous state.
pub(crate) fn start_thread(thread: &Arc<KThread>, control: &mut ThreadControl) -> ThreadResult<()> {
    let subsystem = subsystem();
    let config = subsystem.config();

    let was_suspended = control.state == ThreadState::StartedSuspended;
    control.started = true;
    control.state = ThreadState::Running;
    thread.event.reset();
    thread.ready.reset();
    thread.start_permitted.reset();

    let mut builder = thread::Builder::new();
    let stack_size = match thread.stack_size() {
        0 => config.default_stack_size,
        size => size,
    };
    if stack_size > 0 {
        builder = builder.stack_size(stack_size);
    }
    if config.name_threads {
        builder = builder.name(format!("ntthread-{}", thread.thread_id()));
    }

    let child = Arc::clone(thread);
    let native = match builder.spawn(move || thread_launcher(child)) {
        Ok(native) => native,
        Err(error) => {
            control.started = false;
            if was_suspended {
                control.state = ThreadState::StartedSuspended;
                thread.event.set();
            } else {
                control.state = ThreadState::Created;
            }
            return Err(ThreadError::OutOfResources(error));
        }
    };

    let native_id = native.thread().id();
    control.native_id = Some(native_id);
    control.native = Some(native);

    if !thread.ready.wait(config.rendezvous_timeout) {
        log::warn!(
            "[PS] Thread {} did not reach its startup checkpoint in time",
            thread.thread_id()
        );
    }

    #[cfg(feature = "thread-list")]
    if !subsystem.thread_list().insert(native_id, thread) {
        log::warn!("[PS] Thread list already had an entry for {:?}", native_id);
    }

    thread.start_permitted.set();

    log::debug!("[PS] Started thread {} ({:?})", thread.thread_id(), native_id);
    Ok(())
}

/// Body of every native thread
fn thread_launcher(thread: Arc<KThread>) {
    set_current(&thread);

    let exit_code = match thread.take_start_routine() {
        Some(start_routine) => run_start_routine(&thread, start_routine),
        None => {
            log::error!("[PS] Thread {} has no start routine", thread.thread_id());
            thread.ready.set();
            0
        }
    };

    run_exit_path(&thread, exit_code);
    clear_current();
}

fn run_start_routine(thread: &KThread, start_routine: StartRoutine) -> u32 {
    let config = subsystem().config();

    thread.ready.set();
    if !thread.start_permitted.wait(config.rendezvous_timeout) {
        log::warn!(
            "[PS] Thread {} started before its creator finished registration",
            thread.thread_id()
        );
    }

    #[cfg(feature = "thread-list")]
    {
        let native_id = std::thread::current().id();
        if !subsystem().thread_list().contains(native_id) {
            log::error!("[PS] Thread {} not in thread list, startup failed", thread.thread_id());
            return 0;
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(start_routine)) {
        Ok(exit_code) => exit_code,
        Err(payload) => exit_code_from_unwind(thread, payload),
    }
}

/// Translate an unwind out of the entry routine into an exit code
fn exit_code_from_unwind(thread: &KThread, payload: Box<dyn Any + Send>) -> u32 {
    match payload.downcast::<ThreadExit>() {
        Ok(exit) => exit.0,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            log::error!("[PS] Thread {} panicked: {}", thread.thread_id(), message);
            STATUS_UNHANDLED_EXCEPTION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ke::{create_event, wait_for_single_object, WaitStatus, INFINITE, STILL_ACTIVE};
    use crate::ob::close_handle;
    use crate::ps::{get_exit_code_thread, get_thread_id, resume_thread};
    use crate::rtl::{get_last_error, win32_error};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_routine_return_value_is_exit_code() {
        let handle = create_thread(0, || 42, CreationFlags::empty()).unwrap();

        assert_eq!(wait_for_single_object(&handle, INFINITE).unwrap(), WaitStatus::Object0);
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 42);
        assert!(close_handle(handle).is_ok());
    }

    #[test]
    fn test_suspended_thread_scenario() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = create_thread(
            0,
            move || {
                flag.store(true, Ordering::SeqCst);
                7
            },
            CreationFlags::CREATE_SUSPENDED,
        )
        .unwrap();

        // Not running yet: signaled, no native thread, routine untouched
        assert_eq!(wait_for_single_object(&handle, 0).unwrap(), WaitStatus::Object0);
        assert_eq!(get_exit_code_thread(&handle).unwrap(), STILL_ACTIVE);
        assert!(handle.thread().unwrap().native_id().is_none());
        assert!(!ran.load(Ordering::SeqCst));

        assert_eq!(resume_thread(&handle).unwrap(), 1);
        assert_eq!(wait_for_single_object(&handle, INFINITE).unwrap(), WaitStatus::Object0);
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 7);
        assert!(close_handle(handle).is_ok());
    }

    #[test]
    fn test_current_thread_inside_created_thread() {
        let (sender, receiver) = std::sync::mpsc::channel();
        let handle = create_thread(
            0,
            move || {
                let current = crate::ps::get_current_thread();
                sender.send((current, crate::ps::get_current_thread_id())).ok();
                0
            },
            CreationFlags::empty(),
        )
        .unwrap();

        let (current, tid) = receiver.recv().unwrap();
        assert!(current.unwrap().ptr_eq(&handle));
        assert_eq!(tid, get_thread_id(&handle).unwrap());

        wait_for_single_object(&handle, INFINITE).unwrap();
        assert!(close_handle(handle).is_ok());
    }

    #[test]
    fn test_panicking_routine_reports_unhandled_exception() {
        let handle = create_thread(0, || panic!("routine failed"), CreationFlags::empty()).unwrap();

        wait_for_single_object(&handle, INFINITE).unwrap();
        assert_eq!(get_exit_code_thread(&handle).unwrap(), STATUS_UNHANDLED_EXCEPTION);
        assert!(close_handle(handle).is_ok());
    }

    #[cfg(feature = "thread-list")]
    #[test]
    fn test_unregistered_child_skips_start_routine() {
        subsystem();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let thread = Arc::new(KThread::new(
            allocate_thread_id(),
            0,
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
                5
            }),
        ));
        {
            let mut control = thread.lock_control();
            control.started = true;
            control.state = ThreadState::Running;
        }
        // Creator side finished the handshake without registering the child
        thread.start_permitted.set();

        let child = thread.clone();
        std::thread::spawn(move || thread_launcher(child)).join().unwrap();

        assert!(!ran.load(Ordering::SeqCst));
        assert!(!thread.has_start_routine());
        assert_eq!(thread.exit_code(), 0);
        assert!(thread.is_signaled());
        assert!(thread.ready.is_signaled());
        assert!(thread.apc.is_run_down());
        assert_eq!(thread.state(), ThreadState::Terminated);
    }

    #[test]
    fn test_remote_thread_not_implemented() {
        let process = create_event(true, false);
        let result = create_remote_thread(&process, 0, || 0, CreationFlags::empty());

        assert!(matches!(result, Err(ThreadError::NotImplemented)));
        assert_eq!(get_last_error(), win32_error::ERROR_CALL_NOT_IMPLEMENTED);
    }
}
