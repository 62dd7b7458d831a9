//! Thread Subsystem Errors
//!
//! Every fallible public operation returns a [`ThreadError`] and, like the
//! Win32 API it models, also records the matching error code in the calling
//! thread's last-error slot. Callers that only care about the code can
//! ignore the `Result` payload and read [`get_last_error`].
//!
//! # NT Compatibility
//! - `set_last_error` - Equivalent to SetLastError / RtlSetLastWin32Error
//! - `get_last_error` - Equivalent to GetLastError

use core::cell::Cell;
use std::io;

/// Win32 error codes produced by the thread subsystem
pub mod win32_error {
    /// The operation completed successfully
    pub const ERROR_SUCCESS: u32 = 0;
    /// The handle is invalid
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    /// Not enough memory resources are available to process this command
    pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
    /// A device attached to the system is not functioning
    pub const ERROR_GEN_FAILURE: u32 = 31;
    /// The parameter is incorrect
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    /// This function is not supported on this system
    pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
}

/// Errors returned by thread and handle operations
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// Null, closed, or wrong-type handle
    #[error("the handle is invalid")]
    InvalidHandle,
    /// An argument was rejected (e.g. APC target is not a thread)
    #[error("the parameter is incorrect")]
    InvalidParameter,
    /// The operation cannot be expressed on top of native threads
    #[error("this function is not supported on this system")]
    NotImplemented,
    /// The native thread could not be created
    #[error("not enough resources to create a thread")]
    OutOfResources(#[source] io::Error),
    /// Joining the native thread failed
    #[error("the wait operation failed")]
    WaitFailed,
}

impl ThreadError {
    /// Win32 error code for this error
    pub fn win32_code(&self) -> u32 {
        match self {
            ThreadError::InvalidHandle => win32_error::ERROR_INVALID_HANDLE,
            ThreadError::InvalidParameter => win32_error::ERROR_INVALID_PARAMETER,
            ThreadError::NotImplemented => win32_error::ERROR_CALL_NOT_IMPLEMENTED,
            ThreadError::OutOfResources(_) => win32_error::ERROR_NOT_ENOUGH_MEMORY,
            ThreadError::WaitFailed => win32_error::ERROR_GEN_FAILURE,
        }
    }
}

pub type ThreadResult<T> = Result<T, ThreadError>;

thread_local! {
    static LAST_ERROR: Cell<u32> = const { Cell::new(win32_error::ERROR_SUCCESS) };
}

/// Set the calling thread's last-error code
pub fn set_last_error(code: u32) {
    // Ignore the write when called during TLS teardown
    let _ = LAST_ERROR.try_with(|slot| slot.set(code));
}

/// Get the calling thread's last-error code
pub fn get_last_error() -> u32 {
    LAST_ERROR
        .try_with(Cell::get)
        .unwrap_or(win32_error::ERROR_SUCCESS)
}

/// Record `error` as the last error and return it
#[inline]
pub fn fail<T>(error: ThreadError) -> ThreadResult<T> {
    set_last_error(error.win32_code());
    Err(error)
}
