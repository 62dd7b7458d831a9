//! Startup with an unbounded rendezvous.

use ntthread::{
    close_handle, create_thread, get_exit_code_thread, initialize, resume_thread,
    wait_for_single_object, CreationFlags, Handle, ThreadConfig, INFINITE,
};

#[test]
fn test_threads_start_without_rendezvous_timeout() {
    let subsystem = initialize(
        ThreadConfig::new()
            .with_rendezvous_timeout(None)
            .with_thread_names(false),
    );
    assert_eq!(subsystem.config().rendezvous_timeout, None);

    let handles: Vec<Handle> = (0..16u32)
        .map(|index| {
            let flags = if index % 2 == 0 {
                CreationFlags::CREATE_SUSPENDED
            } else {
                CreationFlags::empty()
            };
            create_thread(0, move || index + 100, flags).unwrap()
        })
        .collect();

    for (index, handle) in handles.iter().enumerate() {
        if index % 2 == 0 {
            assert_eq!(resume_thread(handle).unwrap(), 1);
        }
    }

    for (index, handle) in handles.into_iter().enumerate() {
        wait_for_single_object(&handle, INFINITE).unwrap();
        assert_eq!(get_exit_code_thread(&handle).unwrap(), index as u32 + 100);
        close_handle(handle).unwrap();
    }
}
