//! Dispatcher Definitions
//!
//! Constants and status values shared by every waitable object (events and
//! threads). A waitable object exposes a [`KEvent`](super::event::KEvent)
//! as its signal; the wait routines in [`super::wait`] block on it and
//! translate the outcome into a [`WaitStatus`].

use std::time::Duration;

use crate::rtl::ThreadResult;

/// Timeout value representing an infinite wait (Win32 INFINITE)
pub const INFINITE: u32 = 0xFFFF_FFFF;

/// Value reported by Win32 wait functions on failure (WAIT_FAILED)
pub const WAIT_FAILED: u32 = 0xFFFF_FFFF;

/// Wait status returned from wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WaitStatus {
    /// The object was signaled
    Object0 = 0,
    /// One or more user APCs were delivered during an alertable wait
    IoCompletion = 0xC0,
    /// The wait timed out
    Timeout = 0x102,
}

impl WaitStatus {
    /// Win32 numeric value (WAIT_OBJECT_0, WAIT_IO_COMPLETION, WAIT_TIMEOUT)
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Win32 return value of a wait
///
/// A successful wait reports its status code; a failed one reports
/// `WAIT_FAILED`, with the reason left in the last-error slot.
#[inline]
pub fn wait_return_code(result: &ThreadResult<WaitStatus>) -> u32 {
    match result {
        Ok(status) => status.code(),
        Err(_) => WAIT_FAILED,
    }
}

/// Convert a Win32 millisecond timeout into an optional duration
///
/// `INFINITE` becomes `None` (block forever).
#[inline]
pub fn timeout_from_ms(milliseconds: u32) -> Option<Duration> {
    if milliseconds == INFINITE {
        None
    } else {
        Some(Duration::from_millis(u64::from(milliseconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_timeout() {
        assert_eq!(timeout_from_ms(INFINITE), None);
        assert_eq!(timeout_from_ms(0), Some(Duration::ZERO));
        assert_eq!(timeout_from_ms(1500), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(WaitStatus::Object0.code(), 0);
        assert_eq!(WaitStatus::IoCompletion.code(), 0xC0);
        assert_eq!(WaitStatus::Timeout.code(), 0x102);
    }

    #[test]
    fn test_wait_return_code() {
        use crate::rtl::ThreadError;

        assert_eq!(wait_return_code(&Ok(WaitStatus::Object0)), 0);
        assert_eq!(wait_return_code(&Ok(WaitStatus::Timeout)), 0x102);
        assert_eq!(wait_return_code(&Err(ThreadError::WaitFailed)), WAIT_FAILED);
        assert_eq!(wait_return_code(&Err(ThreadError::InvalidHandle)), WAIT_FAILED);
    }
}
