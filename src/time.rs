//! Timer-backed promises.
//!
//! Each timer sleeps on its own thread and then settles its promise. The
//! promise keeps the scheduler current at creation, so handlers chained onto
//! it still run on the creating thread's queue.
//!
//! There is no timeout primitive: race the work against [`delay_reject`]
//! with [`join::first`](crate::join::first).
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::{Promise, Resolver};

fn after<T, E, F>(duration: Duration, settle: F) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: FnOnce(Resolver<T, E>) + Send + 'static,
{
    Promise::new(move |resolver| {
        thread::spawn(move || {
            thread::sleep(duration);
            trace!(?duration, "timer elapsed");
            settle(resolver);
        });
        Ok(())
    })
}

/// A promise that fulfills with `()` once `duration` has elapsed.
pub fn sleep<E>(duration: Duration) -> Promise<(), E>
where
    E: Clone + Send + 'static,
{
    delay(duration, ())
}

/// A promise that fulfills with `value` once `duration` has elapsed.
pub fn delay<T, E>(duration: Duration, value: T) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    after(duration, move |resolver| resolver.resolve(value))
}

/// A promise that rejects with `error` once `duration` has elapsed.
pub fn delay_reject<T, E>(duration: Duration, error: E) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    after(duration, move |resolver| resolver.reject(error))
}
