//! Object Manager (ob)
//!
//! Every resource handed out by this crate is reached through an opaque
//! [`Handle`]. A handle dispatches through the [`HandleOps`] capability
//! interface, which each object kind implements directly:
//!
//! - **Liveness/type check**: `is_handled`
//! - **Close**: `close`
//! - **Descriptor**: `waitable`, the signal generic waits block on
//! - **Pre-wait cleanup**: `cleanup`, run after a satisfied wait
//!
//! # Object Types
//! - Thread (`KThread`)
//! - Event (`KEvent`)

pub mod handle;
pub mod object_type;

pub use handle::{close_handle, Handle, HandleOps};
pub use object_type::ObjectType;
