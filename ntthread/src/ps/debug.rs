//! Thread Diagnostics
//!
//! Available with the `debug-threads` feature. Every thread object then
//! carries the backtrace of its creation and, once it exits, of its exit.

use super::init::subsystem;
use crate::ke::ThreadState;

/// Log every registered thread with its creation backtrace and whether it
/// is running, suspended, or exited
///
/// # Returns
/// Number of threads dumped
pub fn dump_thread_handles() -> usize {
    // Snapshot first; the registry lock is not held while threads are inspected
    let threads = subsystem().thread_list().snapshot();

    log::debug!("---------------- Start Dumping thread handles -----------");
    log::debug!("Dumping {} thread handles", threads.len());

    for thread in &threads {
        log::debug!("Thread {} was created here:\n{}", thread.thread_id(), thread.create_stack);

        match thread.state() {
            ThreadState::StartedSuspended => {
                log::debug!("Thread {} is suspended", thread.thread_id());
            }
            ThreadState::Running | ThreadState::Detached if !thread.is_signaled() => {
                log::debug!("Thread {} is still running", thread.thread_id());
            }
            state => {
                log::debug!(
                    "Thread {} exited ({:?}, code {}) at:",
                    thread.thread_id(),
                    state,
                    thread.exit_code()
                );
                if let Some(exit_stack) = thread.exit_stack.lock().as_ref() {
                    log::debug!("{}", exit_stack);
                }
            }
        }
    }

    log::debug!("---------------- End Dumping thread handles -------------");
    threads.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ke::{create_event, set_event, wait_for_single_object, INFINITE};
    use crate::ob::close_handle;
    use crate::ps::{create_thread, CreationFlags};

    #[test]
    fn test_dump_includes_running_thread() {
        let gate = create_event(true, false);
        let gate_clone = gate.clone();
        let handle = create_thread(
            0,
            move || {
                wait_for_single_object(&gate_clone, INFINITE).ok();
                0
            },
            CreationFlags::empty(),
        )
        .unwrap();

        assert!(dump_thread_handles() >= 1);

        set_event(&gate).unwrap();
        wait_for_single_object(&handle, INFINITE).unwrap();
        assert!(handle.thread().unwrap().exit_stack.lock().is_some());
        close_handle(handle).unwrap();
    }
}
