//! Wait Support
//!
//! Generic waits on any handle that exposes a waitable signal, and the
//! alertable delay that serves as the APC delivery point.
//!
//! # Wait Flow
//! 1. The handle's liveness check must pass
//! 2. Block on the object's signal (a zero timeout never blocks)
//! 3. On success, run the object's cleanup hook; for a thread this joins
//!    the native thread once it has finished
//!
//! # NT Compatibility
//! - `wait_for_single_object` - Equivalent to WaitForSingleObject
//! - `sleep_ex` - Equivalent to SleepEx / KeDelayExecutionThread

use std::thread;

use super::dispatcher::{timeout_from_ms, WaitStatus};
use crate::ob::Handle;
use crate::ps;
use crate::rtl::{fail, ThreadError, ThreadResult};

/// Wait for a single object
///
/// # Arguments
/// * `handle` - Any waitable handle (thread or event)
/// * `milliseconds` - Timeout, `INFINITE` to block until signaled
///
/// # Returns
/// * `WaitStatus::Object0` - Object was signaled
/// * `WaitStatus::Timeout` - Wait timed out
/// * `Err` - Invalid handle, or the cleanup hook failed (WAIT_FAILED)
pub fn wait_for_single_object(handle: &Handle, milliseconds: u32) -> ThreadResult<WaitStatus> {
    let ops = handle.ops();
    if !ops.is_handled() {
        log::error!("[KE] wait on invalid {} handle", ops.object_type());
        return fail(ThreadError::InvalidHandle);
    }

    let Some(event) = ops.waitable() else {
        return fail(ThreadError::InvalidHandle);
    };

    if !event.wait(timeout_from_ms(milliseconds)) {
        return Ok(WaitStatus::Timeout);
    }

    ops.cleanup().or_else(fail)
}

/// Suspend the calling thread for an interval
///
/// With `alertable` set on a thread known to this crate, the delay ends
/// early when a user APC is queued; all pending APCs are then delivered on
/// the calling thread. The alertable delay is also a cancellation point
/// for `terminate_thread`.
///
/// # Returns
/// * `WaitStatus::IoCompletion` - One or more APCs were delivered
/// * `WaitStatus::Timeout` - The interval elapsed (Win32 SleepEx reports 0)
pub fn sleep_ex(milliseconds: u32, alertable: bool) -> WaitStatus {
    let timeout = timeout_from_ms(milliseconds);

    if alertable {
        if let Some(thread) = ps::current_thread_object() {
            ps::test_cancel();

            let queued = thread
                .apc
                .wait_for_queued(timeout, || thread.cancel_requested());

            ps::test_cancel();

            if queued && thread.apc.deliver_pending() > 0 {
                return WaitStatus::IoCompletion;
            }
            return WaitStatus::Timeout;
        }
    }

    match timeout {
        Some(timeout) if timeout.is_zero() => thread::yield_now(),
        Some(timeout) => thread::sleep(timeout),
        None => loop {
            thread::park();
        },
    }

    WaitStatus::Timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ke::{create_event, set_event, INFINITE};
    use std::time::{Duration, Instant};

    #[test]
    fn test_wait_on_event_handle() {
        let event = create_event(true, false);

        assert_eq!(wait_for_single_object(&event, 0).unwrap(), WaitStatus::Timeout);

        set_event(&event).unwrap();
        assert_eq!(wait_for_single_object(&event, INFINITE).unwrap(), WaitStatus::Object0);
    }

    #[test]
    fn test_wait_on_closed_handle_fails() {
        use crate::ke::{wait_return_code, WAIT_FAILED};
        use crate::ob::close_handle;
        use crate::rtl::{get_last_error, win32_error, ThreadError};

        let event = create_event(true, true);
        close_handle(event.clone()).unwrap();

        let result = wait_for_single_object(&event, 0);
        assert!(matches!(result, Err(ThreadError::InvalidHandle)));
        assert_eq!(wait_return_code(&result), WAIT_FAILED);
        assert_eq!(get_last_error(), win32_error::ERROR_INVALID_HANDLE);
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let event = create_event(true, false);
        let start = Instant::now();

        assert_eq!(wait_for_single_object(&event, 0).unwrap(), WaitStatus::Timeout);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_ex_on_foreign_thread_just_sleeps() {
        ps::subsystem();

        let status = thread::spawn(|| sleep_ex(5, true)).join().unwrap();
        assert_eq!(status, WaitStatus::Timeout);
    }
}
