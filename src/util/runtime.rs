//! Runtime driver for the binary.

use std::future::Future;

use crate::core::Result;

/// Runs `future` to completion on a current-thread runtime.
///
/// The runtime is shut down without waiting on the blocking pool, so a
/// pending stdin read does not keep the process alive after the node quits.
pub fn block_on_detached<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
