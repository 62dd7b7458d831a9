//! Kernel Thread (KTHREAD) implementation
//!
//! KTHREAD is this crate's representation of one execution unit backed by
//! exactly one native thread. It contains:
//! - Lifecycle state, exit code, and disposal bookkeeping
//! - The termination event generic waits block on
//! - The two startup rendezvous events
//! - The APC queue
//! - The entry routine until the native thread claims it
//!
//! Creation, startup, exit and disposal live in the `ps` subsystem; this
//! module only defines the object and its invariants.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use super::apc::KApcState;
use super::event::{EventType, KEvent};
use crate::ob::ObjectType;

/// Thread entry routine
///
/// The argument of the Win32 LPTHREAD_START_ROUTINE is whatever the closure
/// captures; the returned value becomes the exit code.
pub type StartRoutine = Box<dyn FnOnce() -> u32 + Send + 'static>;

/// Exit code reported while a thread has not terminated (STILL_ACTIVE)
pub const STILL_ACTIVE: u32 = 259;

/// Exit code of a thread whose entry routine panicked
pub const STATUS_UNHANDLED_EXCEPTION: u32 = 0xC000_0144;

/// Thread states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Object allocated, primitives initialized
    Created = 0,
    /// Created suspended: no native thread yet, termination event pre-set
    StartedSuspended = 1,
    /// Native thread spawned, entry routine running or about to
    Running = 2,
    /// Entry routine returned, or the thread was exited/terminated
    Terminated = 3,
    /// Owner closed the handle while the thread was live
    Detached = 4,
    /// Resources released
    Reclaimed = 5,
}

/// Who is entitled to reclaim the thread's resources
///
/// Transitions only forward, by compare-and-swap, so the owner closing the
/// handle and the thread exiting agree on exactly one reclaimer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisposalState {
    /// Owner holds the handle
    Live = 0,
    /// Owner closed a running thread; the thread reclaims itself on exit
    DetachRequested = 1,
    /// Resources released
    Reclaimed = 2,
}

impl DisposalState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DisposalState::Live,
            1 => DisposalState::DetachRequested,
            _ => DisposalState::Reclaimed,
        }
    }
}

/// Mutable thread fields guarded by the state mutex
pub(crate) struct ThreadControl {
    /// Lifecycle state
    pub state: ThreadState,
    /// Exit code, meaningful once `exited`
    pub exit_code: u32,
    /// Exit code was recorded (exit, terminate, or routine return)
    pub exited: bool,
    /// Launched through the startup path
    pub started: bool,
    /// Owner closed the handle while the thread was live
    pub detached: bool,
    /// Native thread was joined
    pub joined: bool,
    /// Join handle of the native thread, None once joined or detached
    pub native: Option<JoinHandle<()>>,
    /// Identity of the native thread, set once at spawn
    pub native_id: Option<ThreadId>,
}

/// Kernel Thread structure
///
/// This is modeled after Windows NT's KTHREAD structure.
pub struct KThread {
    /// Type tag checked by `is_handled`
    object_type: ObjectType,
    /// Client thread id
    thread_id: u32,
    /// Requested stack size in bytes, 0 = platform default
    stack_size: usize,
    /// Record of the process' main thread
    is_main: bool,

    /// State mutex
    control: Mutex<ThreadControl>,
    /// Entry routine, claimed by the native thread at startup
    start_routine: spin::Mutex<Option<StartRoutine>>,

    /// Termination event (signaled = not running)
    pub(crate) event: KEvent,
    /// Rendezvous: child reached its startup checkpoint
    pub(crate) ready: KEvent,
    /// Rendezvous: creator finished registration
    pub(crate) start_permitted: KEvent,

    /// User APC queue
    pub(crate) apc: KApcState,

    /// Disposal tri-state (`DisposalState`)
    disposal: AtomicU8,
    /// Set by terminate, observed at cancellation points
    cancel_requested: AtomicBool,
    /// Times resources were released; never exceeds 1
    reclaim_count: AtomicU32,

    #[cfg(feature = "debug-threads")]
    pub(crate) create_stack: std::backtrace::Backtrace,
    #[cfg(feature = "debug-threads")]
    pub(crate) exit_stack: spin::Mutex<Option<std::backtrace::Backtrace>>,
}

impl KThread {
    /// Create a thread object in the `Created` state
    ///
    /// No native thread exists until the object is started.
    pub fn new(thread_id: u32, stack_size: usize, start_routine: StartRoutine) -> Self {
        Self::with_control(thread_id, stack_size, false, None, Some(start_routine))
    }

    /// Create the record of the process' main thread
    ///
    /// The main thread is already running and is never started, joined, or
    /// reclaimed through this object.
    pub fn new_main(thread_id: u32, native_id: ThreadId) -> Self {
        let thread = Self::with_control(thread_id, 0, true, Some(native_id), None);
        thread.control.lock().state = ThreadState::Running;
        thread
    }

    fn with_control(
        thread_id: u32,
        stack_size: usize,
        is_main: bool,
        native_id: Option<ThreadId>,
        start_routine: Option<StartRoutine>,
    ) -> Self {
        Self {
            object_type: ObjectType::Thread,
            thread_id,
            stack_size,
            is_main,
            control: Mutex::new(ThreadControl {
                state: ThreadState::Created,
                exit_code: STILL_ACTIVE,
                exited: false,
                started: false,
                detached: false,
                joined: false,
                native: None,
                native_id,
            }),
            start_routine: spin::Mutex::new(start_routine),
            event: KEvent::new(EventType::Notification, false),
            ready: KEvent::new(EventType::Notification, false),
            start_permitted: KEvent::new(EventType::Notification, false),
            apc: KApcState::new(),
            disposal: AtomicU8::new(DisposalState::Live as u8),
            cancel_requested: AtomicBool::new(false),
            reclaim_count: AtomicU32::new(0),
            #[cfg(feature = "debug-threads")]
            create_stack: std::backtrace::Backtrace::force_capture(),
            #[cfg(feature = "debug-threads")]
            exit_stack: spin::Mutex::new(None),
        }
    }

    /// Get the client thread id
    #[inline]
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Get the requested stack size
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Check if this is the main thread record
    #[inline]
    pub fn is_main(&self) -> bool {
        self.is_main
    }

    /// Type tag stored in the object
    #[inline]
    pub fn header_type(&self) -> ObjectType {
        self.object_type
    }

    /// Current lifecycle state
    pub fn state(&self) -> ThreadState {
        self.control.lock().state
    }

    /// Current exit code (STILL_ACTIVE until the thread terminates)
    pub fn exit_code(&self) -> u32 {
        self.control.lock().exit_code
    }

    /// Identity of the native thread, once spawned
    pub fn native_id(&self) -> Option<ThreadId> {
        self.control.lock().native_id
    }

    /// Check whether the termination event is set
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.event.is_signaled()
    }

    /// Lock the state mutex
    #[inline]
    pub(crate) fn lock_control(&self) -> MutexGuard<'_, ThreadControl> {
        self.control.lock()
    }

    /// Claim the entry routine (once)
    pub(crate) fn take_start_routine(&self) -> Option<StartRoutine> {
        self.start_routine.lock().take()
    }

    /// Check whether the entry routine is still unclaimed
    pub fn has_start_routine(&self) -> bool {
        self.start_routine.lock().is_some()
    }

    // ------------------------------------------------------------------------
    // Exit bookkeeping
    // ------------------------------------------------------------------------

    /// Record the exit code
    ///
    /// Without `force`, a code already recorded by an explicit exit or
    /// terminate wins over the routine's return value.
    pub(crate) fn record_exit(&self, exit_code: u32, force: bool) {
        let mut control = self.control.lock();
        if force || !control.exited {
            control.exit_code = exit_code;
            control.exited = true;
        }
    }

    /// Check if cancellation was requested by `terminate_thread`
    #[inline]
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
        // Break an alertable wait so the request is observed promptly
        self.apc.alert();
    }

    // ------------------------------------------------------------------------
    // Disposal bookkeeping
    // ------------------------------------------------------------------------

    /// Current disposal state
    #[inline]
    pub fn disposal_state(&self) -> DisposalState {
        DisposalState::from_raw(self.disposal.load(Ordering::Acquire))
    }

    /// Move the disposal state from `current` to `new`
    ///
    /// # Returns
    /// true if this caller performed the transition
    pub(crate) fn transition_disposal(&self, current: DisposalState, new: DisposalState) -> bool {
        self.disposal
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Number of times resources were released
    #[inline]
    pub fn reclaim_count(&self) -> u32 {
        self.reclaim_count.load(Ordering::Acquire)
    }

    pub(crate) fn note_reclaimed(&self) {
        self.reclaim_count.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_thread_is_created_and_unsignaled() {
        let thread = KThread::new(4, 0, Box::new(|| 0));

        assert_eq!(thread.state(), ThreadState::Created);
        assert_eq!(thread.exit_code(), STILL_ACTIVE);
        assert_eq!(thread.disposal_state(), DisposalState::Live);
        assert_eq!(thread.header_type(), ObjectType::Thread);
        assert!(!thread.is_signaled());
        assert!(thread.has_start_routine());
        assert!(thread.native_id().is_none());
    }

    #[test]
    fn test_main_thread_record() {
        let thread = KThread::new_main(8, std::thread::current().id());

        assert!(thread.is_main());
        assert_eq!(thread.state(), ThreadState::Running);
        assert_eq!(thread.native_id(), Some(std::thread::current().id()));
        assert!(thread.take_start_routine().is_none());
    }

    #[test]
    fn test_record_exit_keeps_explicit_code() {
        let thread = KThread::new(4, 0, Box::new(|| 0));

        thread.record_exit(7, true);
        thread.record_exit(99, false);
        assert_eq!(thread.exit_code(), 7);

        thread.record_exit(11, true);
        assert_eq!(thread.exit_code(), 11);
    }

    #[test]
    fn test_disposal_transitions_once() {
        let thread = KThread::new(4, 0, Box::new(|| 0));

        assert!(thread.transition_disposal(DisposalState::Live, DisposalState::DetachRequested));
        assert!(!thread.transition_disposal(DisposalState::Live, DisposalState::Reclaimed));
        assert!(thread.transition_disposal(DisposalState::DetachRequested, DisposalState::Reclaimed));
        assert!(!thread.transition_disposal(DisposalState::DetachRequested, DisposalState::Reclaimed));
        assert_eq!(thread.disposal_state(), DisposalState::Reclaimed);
    }
}
