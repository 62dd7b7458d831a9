//! Client ID (CID) Allocation and Thread List
//!
//! Every thread known to the crate gets a unique thread id (TID). TIDs are
//! multiples of 4, like NT's handle-table derived client ids, and 0 is
//! never handed out.
//!
//! With the `thread-list` feature the subsystem also keeps a registry of
//! live native threads, keyed by native thread identity. The child
//! verifies its own registration during startup and `exit_thread` cross
//! checks it.
//!
//! # Locking
//! The registry lock is always taken after a thread's state mutex, never
//! before.

use core::sync::atomic::{AtomicU32, Ordering};

/// TID spacing
const CID_INCREMENT: u32 = 4;

/// Next TID to hand out
static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(CID_INCREMENT);

/// Allocate a thread ID
///
/// # Returns
/// A non-zero TID unique for the lifetime of the process (until the
/// 32-bit space wraps)
pub fn allocate_thread_id() -> u32 {
    loop {
        let tid = NEXT_THREAD_ID.fetch_add(CID_INCREMENT, Ordering::Relaxed);
        if tid != 0 {
            return tid;
        }
    }
}

#[cfg(feature = "thread-list")]
pub use registry::ThreadList;

#[cfg(feature = "thread-list")]
mod registry {
    use std::collections::HashMap;
    use std::sync::{Arc, Weak};
    use std::thread::ThreadId;

    use crate::ke::KThread;

    /// Registry of live native threads
    pub struct ThreadList {
        entries: spin::Mutex<HashMap<ThreadId, Weak<KThread>>>,
    }

    impl ThreadList {
        pub fn new() -> Self {
            Self {
                entries: spin::Mutex::new(HashMap::new()),
            }
        }

        /// Register a thread under its native identity
        ///
        /// # Returns
        /// false if an entry for `native_id` already existed (it is replaced)
        pub fn insert(&self, native_id: ThreadId, thread: &Arc<KThread>) -> bool {
            self.entries
                .lock()
                .insert(native_id, Arc::downgrade(thread))
                .is_none()
        }

        /// Remove a thread's entry
        pub fn remove(&self, native_id: ThreadId) -> bool {
            self.entries.lock().remove(&native_id).is_some()
        }

        /// Check if a native thread is registered
        pub fn contains(&self, native_id: ThreadId) -> bool {
            self.entries.lock().contains_key(&native_id)
        }

        /// Number of registered threads
        pub fn len(&self) -> usize {
            self.entries.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Strong references to all registered threads still alive
        ///
        /// The registry lock is released before the caller inspects them.
        pub fn snapshot(&self) -> Vec<Arc<KThread>> {
            self.entries
                .lock()
                .values()
                .filter_map(Weak::upgrade)
                .collect()
        }
    }

    impl Default for ThreadList {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_ids_are_unique_and_aligned() {
        let first = allocate_thread_id();
        let second = allocate_thread_id();

        assert_ne!(first, 0);
        assert_ne!(first, second);
        assert_eq!(first % CID_INCREMENT, 0);
        assert_eq!(second % CID_INCREMENT, 0);
    }

    #[cfg(feature = "thread-list")]
    #[test]
    fn test_thread_list_insert_remove() {
        use crate::ke::KThread;
        use std::sync::Arc;

        let list = ThreadList::new();
        let thread = Arc::new(KThread::new(allocate_thread_id(), 0, Box::new(|| 0)));
        let native_id = std::thread::current().id();

        assert!(list.is_empty());
        assert!(list.insert(native_id, &thread));
        assert!(list.contains(native_id));
        assert_eq!(list.snapshot().len(), 1);

        assert!(list.remove(native_id));
        assert!(!list.contains(native_id));
        assert!(!list.remove(native_id));
    }

    #[cfg(feature = "thread-list")]
    #[test]
    fn test_snapshot_skips_dropped_threads() {
        use crate::ke::KThread;
        use std::sync::Arc;

        let list = ThreadList::new();
        let native_id = std::thread::spawn(|| std::thread::current().id())
            .join()
            .unwrap();
        {
            let thread = Arc::new(KThread::new(allocate_thread_id(), 0, Box::new(|| 0)));
            list.insert(native_id, &thread);
        }

        assert!(list.contains(native_id));
        assert!(list.snapshot().is_empty());
    }
}
