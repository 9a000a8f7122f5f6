//! Explicit execution context for blocking entry points.
//!
//! Synchronous callers either pass a [`Handle`] to a runtime they own, or
//! pass `None` and a runtime is built for the duration of the call. When
//! the caller is itself running inside a runtime, the work is moved to a
//! dedicated thread with its own runtime, because blocking a runtime worker
//! on a future would deadlock or panic.

use std::future::Future;
use std::thread;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tracing::{debug, warn};

/// Drives `future` to completion from synchronous code.
///
/// # Errors
///
/// Returns the I/O error from building a runtime when one has to be created.
pub fn block_on_with<F>(context: Option<&Handle>, future: F) -> Result<F::Output, std::io::Error>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_ok() {
        debug!("blocking call made inside a runtime; delegating to a dedicated thread");
        return thread::scope(|scope| {
            let worker = scope.spawn(move || owned_runtime().map(|rt| rt.block_on(future)));
            match worker.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });
    }

    match context {
        Some(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(handle.block_on(future))
        }
        Some(_) => {
            // A current-thread runtime's I/O driver only runs under its own
            // `Runtime::block_on`, so `Handle::block_on` would stall on sockets.
            warn!("supplied runtime is current-thread; using a dedicated runtime instead");
            Ok(owned_runtime()?.block_on(future))
        }
        None => Ok(owned_runtime()?.block_on(future)),
    }
}

fn owned_runtime() -> Result<Runtime, std::io::Error> {
    Builder::new_multi_thread().enable_all().build()
}
