//! Kernel Executive (ke)
//!
//! Low-level objects the thread subsystem is built from:
//!
//! - **Dispatcher**: wait status values and timeout conventions
//! - **Event**: KEVENT, the waitable signal behind every handle
//! - **APC**: Asynchronous Procedure Calls and the per-thread queue
//! - **Thread**: KTHREAD, state machine and disposal bookkeeping
//! - **Wait**: single-object wait and alertable delay
//!
//! # Key Structures
//!
//! - `KTHREAD`: Thread object
//! - `KEVENT`: Notification/synchronization event
//! - `KAPC`: Asynchronous procedure call

// Synchronization primitives
pub mod dispatcher;
pub mod event;

// Deferred execution
pub mod apc;

// Core objects
pub mod thread;

// Wait support
pub mod wait;

// Re-export dispatcher types
pub use dispatcher::{timeout_from_ms, wait_return_code, WaitStatus, INFINITE, WAIT_FAILED};
pub use event::{create_event, reset_event, set_event, EventType, KEvent};

// Re-export APC types
pub use apc::{ApcFlags, ApcRoutine, KApc, KApcState};

// Re-export thread types
pub use thread::{
    DisposalState, KThread, StartRoutine, ThreadState, STATUS_UNHANDLED_EXCEPTION, STILL_ACTIVE,
};

// Re-export wait functions
pub use wait::{sleep_ex, wait_for_single_object};
