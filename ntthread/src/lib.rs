//! ntthread
//!
//! Windows NT style thread handles on top of native OS threads.
//!
//! # Architecture Overview
//!
//! The crate follows the NT subsystem split:
//!
//! - **rtl** - Runtime Library: error type, Win32 error codes, last error
//! - **ke** - Kernel Executive: events, APCs, the thread object, waits
//! - **ob** - Object Manager: handles and object types
//! - **ps** - Process Structure: creation, disposal, exit, control
//!
//! # Usage
//!
//! ```
//! use ntthread::{close_handle, create_thread, get_exit_code_thread, wait_for_single_object};
//! use ntthread::{CreationFlags, WaitStatus, INFINITE};
//!
//! let handle = create_thread(0, || 42, CreationFlags::CREATE_SUSPENDED).unwrap();
//! assert_eq!(wait_for_single_object(&handle, 0).unwrap(), WaitStatus::Object0);
//!
//! ntthread::resume_thread(&handle).unwrap();
//! wait_for_single_object(&handle, INFINITE).unwrap();
//! assert_eq!(get_exit_code_thread(&handle).unwrap(), 42);
//!
//! close_handle(handle).unwrap();
//! ```
//!
//! # Features
//!
//! - `thread-list` (default) - registry of live threads
//! - `debug-threads` - creation/exit backtraces and `dump_thread_handles`

pub mod ke;
pub mod ob;
pub mod ps;
pub mod rtl;

pub use ke::{
    create_event, reset_event, set_event, sleep_ex, wait_for_single_object, wait_return_code,
    ThreadState, WaitStatus, INFINITE, STATUS_UNHANDLED_EXCEPTION, STILL_ACTIVE, WAIT_FAILED,
};
pub use ob::{close_handle, Handle, ObjectType};
pub use ps::{
    create_remote_thread, create_thread, exit_thread, get_current_thread, get_current_thread_id,
    get_exit_code_thread, get_thread_id, initialize, queue_user_apc, resume_thread,
    set_thread_affinity_mask, set_thread_priority, suspend_thread, switch_to_thread,
    terminate_thread, test_cancel, CreationFlags, ThreadConfig, ThreadSubsystem,
};
pub use rtl::{get_last_error, set_last_error, win32_error, ThreadError, ThreadResult};

#[cfg(feature = "debug-threads")]
pub use ps::dump_thread_handles;
