//! Handle Implementation
//!
//! A [`Handle`] is an opaque, reference-counted pointer to an object that
//! implements [`HandleOps`]. Cloning a handle does not create a new object
//! reference in the NT sense; every clone names the same object, and
//! closing through any of them closes the object. The storage itself is
//! released when the last clone is dropped, so a stale clone can never
//! dangle; operations through it fail with `ERROR_INVALID_HANDLE` instead.
//!
//! # NT Compatibility
//! - `close_handle` - Equivalent to CloseHandle

use core::fmt;
use std::sync::Arc;

use super::object_type::ObjectType;
use crate::ke::{KEvent, KThread, WaitStatus};
use crate::rtl::{fail, ThreadError, ThreadResult};

/// Capability interface every handle kind implements
pub trait HandleOps: Send + Sync {
    /// Type tag of the object
    fn object_type(&self) -> ObjectType;

    /// Liveness check: the object is of the type it claims to be and has
    /// not been reclaimed
    fn is_handled(&self) -> bool;

    /// Close the object
    ///
    /// Called at most once per object by a well-behaved owner. A second
    /// close must fail rather than release anything twice.
    fn close(&self) -> ThreadResult<()>;

    /// The waitable signal backing this object, if it can be waited on
    fn waitable(&self) -> Option<&KEvent>;

    /// Hook run after a wait on the object was satisfied
    fn cleanup(&self) -> ThreadResult<WaitStatus>;

    /// Downcast to a thread object
    fn into_thread(self: Arc<Self>) -> Option<Arc<KThread>> {
        None
    }
}

/// Opaque handle to a kernel object
#[derive(Clone)]
pub struct Handle {
    object: Arc<dyn HandleOps>,
}

impl Handle {
    /// Wrap an object in a handle
    pub(crate) fn new(object: Arc<dyn HandleOps>) -> Self {
        Self { object }
    }

    /// Type tag of the referenced object
    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.object.object_type()
    }

    /// Check whether two handles name the same object
    #[inline]
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        // Compare data pointers only; vtable pointers may differ across codegen units
        Arc::as_ptr(&self.object) as *const () == Arc::as_ptr(&other.object) as *const ()
    }

    #[inline]
    pub(crate) fn ops(&self) -> &dyn HandleOps {
        &*self.object
    }

    /// Thread object behind this handle, if it is one
    pub(crate) fn thread(&self) -> Option<Arc<KThread>> {
        Arc::clone(&self.object).into_thread()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &self.object_type())
            .field("object", &(Arc::as_ptr(&self.object) as *const ()))
            .finish()
    }
}

/// Close a handle
///
/// For threads this runs the owner side of the disposal protocol: a thread
/// that is still running is detached and reclaims itself when it exits; a
/// finished thread is reclaimed immediately.
///
/// # Returns
/// `ERROR_INVALID_HANDLE` if the object was already closed or reclaimed
pub fn close_handle(handle: Handle) -> ThreadResult<()> {
    let ops = handle.ops();
    if !ops.is_handled() {
        log::error!("[OB] close_handle on invalid {} handle", ops.object_type());
        return fail(ThreadError::InvalidHandle);
    }

    ops.close().or_else(fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ke::create_event;

    #[test]
    fn test_clones_name_same_object() {
        let first = create_event(true, false);
        let second = first.clone();
        let other = create_event(true, false);

        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&other));
    }

    #[test]
    fn test_event_is_not_a_thread() {
        let handle = create_event(false, false);

        assert_eq!(handle.object_type(), ObjectType::Event);
        assert!(handle.thread().is_none());
        assert!(close_handle(handle).is_ok());
    }
}
