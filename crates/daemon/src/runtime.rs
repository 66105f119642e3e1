//! Runtime driver for the `rmount` binary
//!
//! A mount that outlives its unmount grace leaves the serve loop parked on
//! the blocking pool. Dropping a runtime waits for blocking tasks forever,
//! so the binary drives its future here and shuts down with a deadline.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Builder;

/// How long shutdown waits for blocking tasks before abandoning them
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run `future` to completion on a fresh multi-threaded runtime
///
/// Blocking tasks still running afterwards get [`SHUTDOWN_TIMEOUT`] to
/// finish and are then left behind.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    Ok(output)
}
