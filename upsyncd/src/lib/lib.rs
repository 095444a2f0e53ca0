use futures::future::{self, BoxFuture};

pub mod diff;
pub mod local;
pub mod provider;
pub mod service;
pub mod storage;
pub mod upload;

pub use crate::provider::{CompareFile, Provider};
pub use crate::service::Service;
pub use crate::upload::{Progress, Scheduler};

pub trait Shutdown: Sync + Send + 'static {
    fn shutdown(&self) -> BoxFuture<'_, upsync::Result<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

/// Join a root-relative directory path and a child name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[test]
fn test_join_path() {
    assert_eq!(join_path("", "a"), "a");
    assert_eq!(join_path("a/b", "c"), "a/b/c");
}
