#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, Once};

use futures::executor::block_on;
use settle_once::{scheduler, Promise};
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a fmt subscriber once per test binary. Filter with `RUST_LOG`.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Drives this thread's queue until `promise` settles and returns its
/// outcome.
pub fn outcome<T, E>(promise: &Promise<T, E>) -> Result<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    scheduler::run_until(promise);
    block_on(promise.clone().into_future())
}

/// Shared log of events, for asserting on ordering.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
