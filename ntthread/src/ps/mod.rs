//! Process Structure (ps)
//!
//! The thread half of the process manager:
//!
//! - **Init**: subsystem context, configuration, main thread record
//! - **CID**: thread id allocation and the live-thread registry
//! - **Create**: thread creation and the startup rendezvous
//! - **Dispose**: close/exit race resolution and reclamation
//! - **Exit**: exit path, explicit exit, termination
//! - **Control**: resume, exit codes, APC queuing, scheduling stubs
//! - **Current**: current-thread lookup
//!
//! # Thread Lifecycle
//!
//! ```text
//! Created -> StartedSuspended -> Running -> Terminated -> Reclaimed
//!                                   \                        ^
//!                                    +----> Detached --------+
//! ```

// Submodules
pub mod cid;
pub mod control;
pub mod create;
pub mod current;
mod dispose;
pub mod exit;
pub mod init;

#[cfg(feature = "debug-threads")]
pub mod debug;

// Re-exports for convenience
pub use cid::allocate_thread_id;
#[cfg(feature = "thread-list")]
pub use cid::ThreadList;

pub use init::{initialize, subsystem, ThreadConfig, ThreadSubsystem, DEFAULT_RENDEZVOUS_TIMEOUT};

pub use create::{create_remote_thread, create_thread, CreationFlags};

pub use exit::{exit_thread, terminate_thread, test_cancel};

pub use control::{
    get_exit_code_thread, get_thread_id, queue_user_apc, resume_thread, set_thread_affinity_mask,
    set_thread_priority, suspend_thread, switch_to_thread,
};

pub use current::{get_current_thread, get_current_thread_id};
pub(crate) use current::current_thread_object;

#[cfg(feature = "debug-threads")]
pub use debug::dump_thread_handles;
