//! The thread that initializes the subsystem is the main thread.
//!
//! Kept to a single test so the harness thread running it is the one that
//! initializes the subsystem.

use std::panic;

use ntthread::{
    close_handle, exit_thread, get_current_thread, get_current_thread_id, initialize,
    wait_for_single_object, ThreadConfig, WaitStatus, STILL_ACTIVE,
};

#[test]
fn test_main_thread_lookup_and_exit() {
    let subsystem = initialize(ThreadConfig::default());
    let main = subsystem.main_thread().clone();
    let main_handle = subsystem.main_thread_handle();

    assert!(main.is_main());
    assert!(subsystem.is_main_thread(std::thread::current().id()));

    // Resolved without the thread registry
    let current = get_current_thread().unwrap();
    assert!(current.ptr_eq(&main_handle));
    assert_eq!(get_current_thread_id(), main.thread_id());
    #[cfg(feature = "thread-list")]
    assert!(!subsystem.thread_list().contains(std::thread::current().id()));

    // Other native threads are not the main thread
    let foreign = std::thread::spawn(|| get_current_thread().is_none()).join().unwrap();
    assert!(foreign);

    // Closing the pseudo-handle does nothing
    assert!(close_handle(current).is_ok());
    assert!(close_handle(main_handle.clone()).is_ok());
    assert_eq!(main.exit_code(), STILL_ACTIVE);
    assert_eq!(wait_for_single_object(&main_handle, 0).unwrap(), WaitStatus::Timeout);

    // exit_thread on the main thread records the code and unwinds
    let result: std::thread::Result<()> = panic::catch_unwind(|| exit_thread(5));
    assert!(result.is_err());
    assert_eq!(main.exit_code(), 5);
    assert_eq!(wait_for_single_object(&main_handle, 0).unwrap(), WaitStatus::Object0);
}
