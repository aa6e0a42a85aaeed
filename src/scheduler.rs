//! Deferred execution of chained handlers.
//!
//! Every handler registered through [`Promise::then`](crate::Promise::then)
//! and friends is submitted to a [`Schedule`] instead of being invoked inline,
//! so settling a promise never re-enters the caller's code.
//!
//! Each thread owns a default [`MicrotaskQueue`]. A promise captures the
//! scheduler that is current when it is created, and every promise chained
//! from it inherits that scheduler. Use [`enter`] to run a block of code with
//! a different scheduler installed.
//!
//! # Examples
//!
//! ```
//! use settle_once::{scheduler, Promise};
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(None));
//! let slot = seen.clone();
//! Promise::<i32, ()>::resolved(1).then(move |v| {
//!     *slot.lock().unwrap() = Some(v);
//!     Ok(())
//! });
//! // Nothing ran yet: the handler waits on the thread's queue.
//! assert_eq!(*seen.lock().unwrap(), None);
//! scheduler::run_until_idle();
//! assert_eq!(*seen.lock().unwrap(), Some(1));
//! ```
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

use crate::Promise;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler, as captured by every promise.
pub type Scheduler = Arc<dyn Schedule>;

/// Something that runs [`Job`]s after the current synchronous code returns.
pub trait Schedule: Send + Sync {
    /// Submits `job` for later execution.
    ///
    /// Implementations must never run `job` before returning.
    fn schedule(&self, job: Job);
}

thread_local! {
    /// Scheduler installed by [`enter`], if any.
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };

    /// The thread's default queue.
    static LOCAL: MicrotaskQueue = MicrotaskQueue::new();
}

/// Returns the scheduler new promises on this thread will capture.
pub fn current() -> Scheduler {
    match CURRENT.with(|current| current.borrow().clone()) {
        Some(scheduler) => scheduler,
        None => Arc::new(local_queue()),
    }
}

/// Returns a handle to this thread's default [`MicrotaskQueue`].
pub fn local_queue() -> MicrotaskQueue {
    LOCAL.with(MicrotaskQueue::clone)
}

/// Drains this thread's default queue. See [`MicrotaskQueue::run_until_idle`].
pub fn run_until_idle() -> usize {
    local_queue().run_until_idle()
}

/// Drives this thread's default queue until `promise` settles. See
/// [`MicrotaskQueue::run_until`].
pub fn run_until<T, E>(promise: &Promise<T, E>)
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    local_queue().run_until(promise)
}

/// Runs `f` with `scheduler` installed as the current scheduler.
///
/// Promises created inside `f` (and everything chained from them) schedule
/// their handlers on `scheduler`. The previous scheduler is restored when `f`
/// returns, including on unwind.
pub fn enter<R>(scheduler: Scheduler, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Scheduler>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let prev = self.0.take();
            CURRENT.with(|current| *current.borrow_mut() = prev);
        }
    }

    let prev = CURRENT.with(|current| current.replace(Some(scheduler)));
    let _restore = Restore(prev);
    f()
}

/// A cooperative FIFO of deferred jobs.
///
/// Jobs accumulate until some thread drains the queue with
/// [`run_until_idle`](Self::run_until_idle) or
/// [`run_until`](Self::run_until). Any thread may push jobs; handles are
/// cheap to clone and all refer to the same queue.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    ready: Condvar,
}

impl Shared {
    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let pending = self
            .jobs
            .get_mut()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |jobs| jobs.len());
        if pending > 0 {
            warn!(pending, "microtask queue dropped with undrained jobs");
        }
    }
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to run.
    pub fn len(&self) -> usize {
        self.shared.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop(&self) -> Option<Job> {
        self.shared.jobs().pop_front()
    }

    /// Runs queued jobs in FIFO order until the queue is empty, including
    /// jobs enqueued by the jobs themselves. Returns how many jobs ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.pop() {
            job();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "microtask queue idle");
        }
        ran
    }

    /// Runs jobs until `promise` has settled and the handlers it had at that
    /// point have run, parking the thread while the queue is empty.
    ///
    /// `promise` must schedule its handlers on this queue, otherwise this
    /// blocks forever. Settlement may come from another thread.
    pub fn run_until<T, E>(&self, promise: &Promise<T, E>)
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        promise.finally(move || flag.store(true, Ordering::Release));

        loop {
            self.run_until_idle();
            if done.load(Ordering::Acquire) {
                return;
            }
            let mut jobs = self.shared.jobs();
            while jobs.is_empty() {
                jobs = self
                    .shared
                    .ready
                    .wait(jobs)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

impl Schedule for MicrotaskQueue {
    fn schedule(&self, job: Job) {
        self.shared.jobs().push_back(job);
        self.shared.ready.notify_all();
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(feature = "thread-pool")]
pub use futures::executor::ThreadPool;

/// Runs each job as a task on the pool. Handlers never run inline, but jobs
/// may run concurrently on different workers, so FIFO order is not kept.
#[cfg(feature = "thread-pool")]
impl Schedule for ThreadPool {
    fn schedule(&self, job: Job) {
        self.spawn_ok(async move { job() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let queue = MicrotaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            queue.schedule(Box::new(move || order.lock().unwrap().push(i)));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.run_until_idle(), 5);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_jobs_scheduled_while_draining_run_in_same_pass() {
        let queue = MicrotaskQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        let (q, c) = (queue.clone(), count.clone());
        queue.schedule(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            let c = c.clone();
            q.schedule(Box::new(move || {
                c.fetch_add(10, Ordering::SeqCst);
            }));
        }));
        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_enter_restores_previous_scheduler() {
        let queue = MicrotaskQueue::new();
        let inner: Scheduler = Arc::new(queue.clone());
        enter(inner.clone(), || {
            assert!(Arc::ptr_eq(&current(), &inner));
        });
        assert!(!Arc::ptr_eq(&current(), &inner));
    }

    #[test]
    fn test_enter_restores_on_panic() {
        let inner: Scheduler = Arc::new(MicrotaskQueue::new());
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            enter(inner.clone(), || panic!("boom"));
        }));
        assert!(caught.is_err());
        assert!(!Arc::ptr_eq(&current(), &inner));
    }

    #[test]
    fn test_local_queue_is_per_thread() {
        local_queue().schedule(Box::new(|| {}));
        let other = std::thread::spawn(|| local_queue().len()).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(run_until_idle(), 1);
    }
}
