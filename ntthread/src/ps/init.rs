//! Thread Subsystem Initialization
//!
//! Holds the process-wide state of the thread subsystem:
//! - Configuration (`ThreadConfig`)
//! - The record of the main thread
//! - The live-thread registry (`thread-list` feature)
//!
//! The subsystem is initialized once, either explicitly with
//! [`initialize`] or lazily with the default configuration on first use.
//! The thread that performs initialization is recorded as the process'
//! main thread.

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use super::cid::allocate_thread_id;
#[cfg(feature = "thread-list")]
use super::cid::ThreadList;
use crate::ke::KThread;
use crate::ob::Handle;

/// Default bound on each startup rendezvous wait
pub const DEFAULT_RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(1);

/// Thread subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Bound on each startup rendezvous wait, None = wait indefinitely
    pub rendezvous_timeout: Option<Duration>,
    /// Stack size used when a caller passes 0, 0 = platform default
    pub default_stack_size: usize,
    /// Name native threads `ntthread-<tid>`
    pub name_threads: bool,
}

impl ThreadConfig {
    pub const fn new() -> Self {
        Self {
            rendezvous_timeout: Some(DEFAULT_RENDEZVOUS_TIMEOUT),
            default_stack_size: 0,
            name_threads: true,
        }
    }

    pub fn with_rendezvous_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.rendezvous_timeout = timeout;
        self
    }

    pub fn with_default_stack_size(mut self, stack_size: usize) -> Self {
        self.default_stack_size = stack_size;
        self
    }

    pub fn with_thread_names(mut self, name_threads: bool) -> Self {
        self.name_threads = name_threads;
        self
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide thread subsystem state
pub struct ThreadSubsystem {
    config: ThreadConfig,
    main_thread: Arc<KThread>,
    main_native_id: ThreadId,
    #[cfg(feature = "thread-list")]
    thread_list: ThreadList,
}

impl ThreadSubsystem {
    fn new(config: ThreadConfig) -> Self {
        let main_native_id = std::thread::current().id();
        let main_thread = Arc::new(KThread::new_main(allocate_thread_id(), main_native_id));

        log::info!(
            "[PS] Thread subsystem initialized (main tid {}, rendezvous {:?})",
            main_thread.thread_id(),
            config.rendezvous_timeout
        );

        Self {
            config,
            main_thread,
            main_native_id,
            #[cfg(feature = "thread-list")]
            thread_list: ThreadList::new(),
        }
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    /// Record of the main thread
    #[inline]
    pub fn main_thread(&self) -> &Arc<KThread> {
        &self.main_thread
    }

    /// Pseudo-handle for the main thread
    pub fn main_thread_handle(&self) -> Handle {
        Handle::new(self.main_thread.clone())
    }

    /// Check if a native thread is the main thread
    #[inline]
    pub fn is_main_thread(&self, native_id: ThreadId) -> bool {
        native_id == self.main_native_id
    }

    /// Live-thread registry
    #[cfg(feature = "thread-list")]
    #[inline]
    pub fn thread_list(&self) -> &ThreadList {
        &self.thread_list
    }
}

static SUBSYSTEM: spin::Once<ThreadSubsystem> = spin::Once::new();

/// Initialize the thread subsystem
///
/// Must be called from the thread that should be treated as the main
/// thread. Calling it again has no effect beyond a warning.
///
/// # Returns
/// The process-wide subsystem
pub fn initialize(config: ThreadConfig) -> &'static ThreadSubsystem {
    let mut initialized = false;
    let subsystem = SUBSYSTEM.call_once(|| {
        initialized = true;
        ThreadSubsystem::new(config)
    });

    if !initialized {
        log::warn!("[PS] Thread subsystem already initialized, configuration ignored");
    }
    subsystem
}

/// Get the thread subsystem, initializing it with defaults if needed
pub fn subsystem() -> &'static ThreadSubsystem {
    SUBSYSTEM.call_once(|| ThreadSubsystem::new(ThreadConfig::default()))
}

/// Get the thread subsystem if it has been initialized
pub(crate) fn try_subsystem() -> Option<&'static ThreadSubsystem> {
    SUBSYSTEM.get()
}
