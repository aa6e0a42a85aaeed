//! `.await` support for [`Promise`].
//!
//! The adapter registers its observer directly on the promise rather than
//! through the deferred queue: waking a task never runs caller code inline,
//! so an awaiting task needs nobody to drain a [`MicrotaskQueue`].
//!
//! [`MicrotaskQueue`]: crate::scheduler::MicrotaskQueue
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::Promise;

/// Future returned by `Promise::into_future`, resolving to the promise's
/// outcome.
///
/// ```
/// use settle_once::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (resolver, promise) = Promise::<String, String>::pending();
/// let task = thread::spawn(move || block_on(async { promise.await }));
/// resolver.resolve("🍓".into());
/// assert_eq!(task.join().unwrap(), Ok("🍓".to_string()));
/// ```
#[derive(Debug)]
pub struct PromiseFuture<T, E> {
    promise: Option<Promise<T, E>>,
    inner: Arc<Mutex<Inner<T, E>>>,
}

#[derive(Debug)]
struct Inner<T, E> {
    outcome: Option<Result<T, E>>,
    waker: Option<Waker>,
}

fn deliver<T, E>(inner: &Mutex<Inner<T, E>>, outcome: Result<T, E>) {
    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
    inner.outcome = Some(outcome);
    let waker = inner.waker.take();
    drop(inner);
    if let Some(waker) = waker {
        waker.wake();
    }
}

impl<T, E> Future for PromiseFuture<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let mut inner = this.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(outcome) = inner.outcome.take() {
                return Poll::Ready(outcome);
            }
            inner.waker = Some(cx.waker().clone());
        }

        if let Some(promise) = this.promise.take() {
            let (fulfilled, rejected) = (this.inner.clone(), this.inner.clone());
            promise.subscribe(
                Box::new(move |value| deliver(&fulfilled, Ok(value))),
                Box::new(move |error| deliver(&rejected, Err(error))),
            );
            // Already settled promises deliver during `subscribe`.
            let mut inner = this.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(outcome) = inner.outcome.take() {
                return Poll::Ready(outcome);
            }
        }
        Poll::Pending
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = PromiseFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        PromiseFuture {
            promise: Some(self),
            inner: Arc::new(Mutex::new(Inner {
                outcome: None,
                waker: None,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use std::future::IntoFuture;
    use std::thread;
    use std::time::Duration;

    use crate::Promise;

    #[test]
    fn test_await_settled_promise() {
        let promise = Promise::<i32, ()>::resolved(3);
        assert_eq!(block_on(promise.into_future()), Ok(3));
    }

    #[test]
    fn test_await_rejection() {
        let promise = Promise::<i32, &str>::rejected("nope");
        assert_eq!(block_on(async { promise.await }), Err("nope"));
    }

    #[test]
    fn test_await_settled_from_other_thread() {
        let (resolver, promise) = Promise::<String, ()>::pending();
        let task = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            resolver.resolve("late".into());
        });
        assert_eq!(block_on(promise.into_future()), Ok("late".to_string()));
        task.join().expect("The resolver thread has panicked");
    }

    #[test]
    fn test_many_awaiters() {
        let (resolver, promise) = Promise::<u32, ()>::pending();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let promise = promise.clone();
                thread::spawn(move || block_on(promise.into_future()))
            })
            .collect();
        resolver.resolve(8);
        for task in tasks {
            assert_eq!(task.join().expect("The awaiting thread has panicked"), Ok(8));
        }
    }
}
