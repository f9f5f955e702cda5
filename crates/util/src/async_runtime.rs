//! Async runtime helpers for blocking callers.
//!
//! This module provides a single entry point for executing async futures from
//! synchronous code paths, reusing the current Tokio runtime when it can.

use std::{future::Future, io, thread};

use tokio::{
    runtime::{Builder, Handle, RuntimeFlavor},
    task,
};

/// Execute an async future from synchronous code.
///
/// - Inside a multi-threaded runtime the current worker is parked with
///   `block_in_place` and the future runs on the existing runtime.
/// - Inside a current-thread runtime the future is driven on a helper thread
///   with its own runtime, since that flavor cannot block in place.
/// - Outside Tokio a single-threaded runtime is created for the call.
///
/// Returns an error only when a runtime cannot be built or the helper thread
/// panics.
pub fn block_on_future<F>(future: F) -> io::Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => Ok(task::block_in_place(|| handle.block_on(future))),
        Ok(_) => thread::spawn(move || current_thread_runtime().map(|runtime| runtime.block_on(future)))
            .join()
            .map_err(|_| io::Error::other("async helper thread panicked"))?,
        Err(_) => Ok(current_thread_runtime()?.block_on(future)),
    }
}

fn current_thread_runtime() -> io::Result<tokio::runtime::Runtime> {
    Builder::new_current_thread().enable_all().build()
}
