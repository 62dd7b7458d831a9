//! Runtime Library (rtl)
//!
//! Support routines shared by the other subsystems:
//!
//! - **Errors**: `ThreadError` and the Win32 error codes it maps to
//! - **Last error**: per-thread last-error slot (SetLastError/GetLastError)

pub mod error;

pub use error::{
    fail, get_last_error, set_last_error, win32_error, ThreadError, ThreadResult,
};
