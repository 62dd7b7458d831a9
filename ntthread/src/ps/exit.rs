//! Thread Exit and Termination
//!
//! # Exit Path
//! Every native thread started by this crate leaves through
//! [`run_exit_path`], whether its entry routine returned, called
//! [`exit_thread`], was terminated, or panicked:
//! 1. Run down the APC queue (pending APCs are delivered, not dropped)
//! 2. Record the exit code unless exit/terminate already did
//! 3. Set the termination event
//! 4. Reclaim the thread's resources if the owner detached it
//!
//! # Termination
//! Native threads cannot be killed safely, so `terminate_thread` is
//! cooperative: the exit code is recorded and the event is set at once,
//! and the target unwinds the next time it reaches a cancellation point
//! ([`test_cancel`] or an alertable `sleep_ex`).
//!
//! # NT Compatibility
//! - `exit_thread` - Equivalent to ExitThread
//! - `terminate_thread` - Equivalent to TerminateThread

use std::panic;
use std::sync::Arc;

use super::current::{current_thread_object, managed_thread};
use super::dispose::reclaim;
use super::init::subsystem;
use crate::ke::{DisposalState, KThread, ThreadState};
use crate::ob::Handle;
use crate::rtl::{fail, ThreadError, ThreadResult};

/// Unwind payload carrying an explicit exit code to the launcher
pub(crate) struct ThreadExit(pub u32);

/// Common exit path, run on the exiting thread
pub(crate) fn run_exit_path(thread: &KThread, exit_code: u32) {
    let delivered = thread.apc.run_down();
    if delivered > 0 {
        log::trace!("[APC] Delivered {} APCs at exit of thread {}", delivered, thread.thread_id());
    }

    thread.record_exit(exit_code, false);

    #[cfg(feature = "debug-threads")]
    {
        *thread.exit_stack.lock() = Some(std::backtrace::Backtrace::force_capture());
    }

    thread.event.set();
    thread.ready.set();

    let reclaim_from = {
        let mut control = thread.lock_control();
        if control.state == ThreadState::Running {
            control.state = ThreadState::Terminated;
        }
        if control.detached {
            Some(DisposalState::DetachRequested)
        } else if !control.started {
            Some(DisposalState::Live)
        } else {
            None
        }
    };

    log::debug!("[PS] Thread {} exited with code {}", thread.thread_id(), thread.exit_code());

    if let Some(expected) = reclaim_from {
        reclaim(thread, expected);
    }
}

/// End the calling thread
///
/// Records `exit_code` and unwinds the calling thread's stack back to its
/// launcher, which then runs the exit path. Destructors of live locals run
/// on the way out.
pub fn exit_thread(exit_code: u32) -> ! {
    match managed_thread() {
        Some(thread) => {
            #[cfg(feature = "thread-list")]
            if let Some(native_id) = thread.native_id() {
                if !subsystem().thread_list().contains(native_id)
                    && thread.disposal_state() != DisposalState::Reclaimed
                {
                    log::error!(
                        "[PS] exit_thread: thread {} missing from thread list",
                        thread.thread_id()
                    );
                }
            }
            thread.record_exit(exit_code, true);
        }
        None => {
            let subsystem = subsystem();
            if subsystem.is_main_thread(std::thread::current().id()) {
                log::warn!("[PS] exit_thread called on the main thread");
                let main = subsystem.main_thread();
                main.record_exit(exit_code, true);
                main.event.set();
            } else {
                log::error!("[PS] exit_thread called on a thread not started by ntthread");
            }
        }
    }

    panic::resume_unwind(Box::new(ThreadExit(exit_code)))
}

/// Terminate a thread
///
/// # Arguments
/// * `handle` - Thread to terminate
/// * `exit_code` - Exit code reported for it
///
/// The exit code is visible and waiters are released before this returns.
/// The target itself stops at its next cancellation point; a thread that
/// never reaches one keeps running. Terminating the calling thread is
/// `exit_thread`.
pub fn terminate_thread(handle: &Handle, exit_code: u32) -> ThreadResult<()> {
    let Some(thread) = handle.thread() else {
        log::error!("[PS] terminate_thread on a {} handle", handle.object_type());
        return fail(ThreadError::InvalidHandle);
    };
    if !handle.ops().is_handled() {
        return fail(ThreadError::InvalidHandle);
    }

    if current_thread_object().is_some_and(|current| Arc::ptr_eq(&current, &thread)) {
        exit_thread(exit_code);
    }

    {
        let mut control = thread.lock_control();
        control.exit_code = exit_code;
        control.exited = true;
        if !control.started {
            control.state = ThreadState::Terminated;
        }
    }

    thread.request_cancel();
    thread.event.set();

    log::debug!("[PS] Thread {} terminated with code {}", thread.thread_id(), exit_code);
    Ok(())
}

/// Cancellation point
///
/// Unwinds the calling thread if `terminate_thread` was called on it.
pub fn test_cancel() {
    if let Some(thread) = managed_thread() {
        if thread.cancel_requested() {
            log::debug!("[PS] Thread {} reached a cancellation point", thread.thread_id());
            panic::resume_unwind(Box::new(ThreadExit(thread.exit_code())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ke::{create_event, sleep_ex, wait_for_single_object, WaitStatus, INFINITE, STILL_ACTIVE};
    use crate::ob::close_handle;
    use crate::ps::{create_thread, get_exit_code_thread, resume_thread, CreationFlags};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_exit_thread_unwinds_with_code() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let handle = create_thread(
            0,
            move || {
                let _guard = guard;
                exit_thread(77)
            },
            CreationFlags::empty(),
        )
        .unwrap();

        wait_for_single_object(&handle, INFINITE).unwrap();
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 77);
        assert!(dropped.load(Ordering::SeqCst));
        close_handle(handle).unwrap();
    }

    #[test]
    fn test_hundred_threads_exit_and_close() {
        let handles: Vec<Handle> = (0..100u32)
            .map(|index| create_thread(0, move || exit_thread(index), CreationFlags::empty()).unwrap())
            .collect();
        let threads: Vec<Arc<KThread>> = handles.iter().map(|h| h.thread().unwrap()).collect();

        for (index, handle) in handles.into_iter().enumerate() {
            if index % 2 == 0 {
                wait_for_single_object(&handle, INFINITE).unwrap();
                assert_eq!(get_exit_code_thread(&handle).unwrap(), index as u32);
            }
            // Odd ones race their own exit: either detach or join
            close_handle(handle).unwrap();
        }

        for (index, thread) in threads.iter().enumerate() {
            assert!(wait_until(|| thread.reclaim_count() == 1), "thread {} not reclaimed", index);
            assert_eq!(thread.exit_code(), index as u32);
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(threads.iter().all(|thread| thread.reclaim_count() == 1));
    }

    #[test]
    fn test_terminate_stops_at_cancellation_point() {
        let handle = create_thread(
            0,
            || loop {
                sleep_ex(INFINITE, true);
            },
            CreationFlags::empty(),
        )
        .unwrap();
        let thread = handle.thread().unwrap();

        terminate_thread(&handle, 0xDEAD).unwrap();
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 0xDEAD);
        assert!(thread.cancel_requested());

        assert!(wait_until(|| thread.state() == ThreadState::Terminated));
        assert_eq!(wait_for_single_object(&handle, INFINITE).unwrap(), WaitStatus::Object0);
        assert_eq!(thread.exit_code(), 0xDEAD);

        close_handle(handle).unwrap();
        assert_eq!(thread.reclaim_count(), 1);
    }

    #[test]
    fn test_terminate_suspended_thread_never_starts() {
        let handle = create_thread(0, || unreachable!(), CreationFlags::CREATE_SUSPENDED).unwrap();
        let thread = handle.thread().unwrap();

        assert_eq!(get_exit_code_thread(&handle).unwrap(), STILL_ACTIVE);
        terminate_thread(&handle, 9).unwrap();

        assert_eq!(thread.state(), ThreadState::Terminated);
        assert_eq!(resume_thread(&handle).unwrap(), 0);
        assert!(thread.native_id().is_none());
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 9);
        close_handle(handle).unwrap();
    }

    #[test]
    fn test_terminate_rejects_event_handle() {
        let event = create_event(true, false);
        assert!(matches!(terminate_thread(&event, 1), Err(ThreadError::InvalidHandle)));
    }

    #[test]
    fn test_test_cancel_without_request_returns() {
        let handle = create_thread(
            0,
            || {
                test_cancel();
                4
            },
            CreationFlags::empty(),
        )
        .unwrap();

        wait_for_single_object(&handle, INFINITE).unwrap();
        assert_eq!(get_exit_code_thread(&handle).unwrap(), 4);
        close_handle(handle).unwrap();
    }
}
