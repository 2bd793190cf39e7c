use std::{future::Future, time::Duration};

use bluetooth_advertising::core::logging::init_logging;
use tokio::task::LocalSet;

pub fn start_test(f: impl Future<Output = ()>) {
    tokio_test::block_on(async move {
        init_logging();
        // run_until_idle() relies on the clock only advancing once every task
        // is blocked
        tokio::time::pause();
        LocalSet::new().run_until(f).await;
    });
}

/// Let command batches and transports run until every task is blocked
pub async fn run_until_idle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
