#![cfg(test)]

use std::sync::Once;

mod dataset;
mod harness;
mod utils;
mod stubs {
    pub mod mem;
}
mod tests;

use dataset::Dataset;
use harness::{FsHarness, Harness};

static LOG_INIT: Once = Once::new();

fn init_log() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Harness over a stub reporting content hashes in listings
async fn harness<D: Into<Dataset>>(dataset: D) -> Harness {
    init_log();
    Harness::new(dataset.into(), true).await
}

/// Harness over a stub unable to report content hashes
async fn harness_without_hashes<D: Into<Dataset>>(dataset: D) -> Harness {
    init_log();
    Harness::new(dataset.into(), false).await
}

async fn fs_harness<D: Into<Dataset>>(dataset: D) -> FsHarness {
    init_log();
    FsHarness::new(dataset.into()).await
}
