//! This module provides utilities relating to async tasks in unit tests

use std::{future::Future, time::Duration};

use tokio::{runtime::Builder, select, task::LocalSet};

/// Run the supplied future on a single-threaded runtime, with time paused
pub fn block_on_locally<T>(f: impl Future<Output = T>) -> T {
    LocalSet::new().block_on(
        &Builder::new_current_thread().enable_time().start_paused(true).build().unwrap(),
        async move {
            select! {
                t = f => t,
                // NOTE: this time should be LARGER than any meaningful delay in the stack
                _ = tokio::time::sleep(Duration::from_secs(100000)) => {
                    panic!("test appears to be stuck");
                },
            }
        },
    )
}

/// Let every spawned task run until all of them are blocked. Command batches
/// and transports complete through spawned tasks, so tests call this after
/// each operation before asserting.
///
/// MUST only be run in an environment where time is mocked.
pub async fn run_until_idle() {
    // time only advances once every task is blocked, so the sleep resolves
    // after all pending work has run
    tokio::time::sleep(Duration::from_millis(10)).await;
}
