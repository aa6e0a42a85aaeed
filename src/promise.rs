use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::resolution::{IntoResolution, Resolution};
use crate::scheduler::{self, Scheduler};

pub(crate) type Observer<V> = Box<dyn FnOnce(V) + Send + 'static>;

/// Where a promise is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Pending => "pending",
            State::Fulfilled => "fulfilled",
            State::Rejected => "rejected",
        })
    }
}

/// A single-assignment container for the eventual outcome of a computation.
///
/// Cloning a `Promise` clones the handle, not the outcome: every clone
/// observes the same settlement.
///
/// # Examples
///
/// ```
/// use settle_once::{scheduler, Promise};
/// use std::sync::{Arc, Mutex};
///
/// let result = Arc::new(Mutex::new(String::new()));
/// let out = result.clone();
/// let chain = Promise::<i32, String>::resolved(1)
///     .then(|v| Ok(v + 1))
///     .then(|v| Ok(v * 2))
///     .then(move |v| {
///         *out.lock().unwrap() = v.to_string();
///         Ok(())
///     });
/// scheduler::run_until(&chain);
/// assert_eq!(*result.lock().unwrap(), "4");
/// ```
pub struct Promise<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Scheduler,
}

/// The settle capability of a [`Promise`].
///
/// Only the first `resolve`, `resolve_with` or `reject` across all clones of a
/// resolver takes effect; later calls are ignored.
pub struct Resolver<T, E> {
    promise: Promise<T, E>,
}

struct Inner<T, E> {
    slot: Slot<T, E>,
    // Set by the first resolver call; blocks later calls while an adopted
    // promise is still pending.
    locked: bool,
}

enum Slot<T, E> {
    Pending {
        on_fulfilled: Vec<Observer<T>>,
        on_rejected: Vec<Observer<E>>,
    },
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Slot<T, E> {
    fn pending() -> Self {
        Slot::Pending {
            on_fulfilled: Vec::new(),
            on_rejected: Vec::new(),
        }
    }

    fn state(&self) -> State {
        match self {
            Slot::Pending { .. } => State::Pending,
            Slot::Fulfilled(_) => State::Fulfilled,
            Slot::Rejected(_) => State::Rejected,
        }
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &self.promise.state())
            .field("locked", &self.promise.lock().locked)
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_slot(slot: Slot<T, E>, scheduler: Scheduler) -> Self {
        let locked = !matches!(slot, Slot::Pending { .. });
        Self {
            inner: Arc::new(Mutex::new(Inner { slot, locked })),
            scheduler,
        }
    }

    pub fn state(&self) -> State {
        self.lock().slot.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == State::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The scheduler this promise runs its handlers on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a promise and runs `initializer` synchronously with its
    /// resolver.
    ///
    /// If `initializer` returns `Err`, the promise is rejected with that
    /// error unless the initializer already settled it.
    ///
    /// ```
    /// use settle_once::Promise;
    ///
    /// let failed = Promise::<i32, &str>::new(|_| Err("no input"));
    /// assert!(failed.is_rejected());
    ///
    /// let settled = Promise::<i32, &str>::new(|resolver| {
    ///     resolver.resolve(1);
    ///     Err("too late")
    /// });
    /// assert!(settled.is_fulfilled());
    /// ```
    pub fn new<F>(initializer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (resolver, promise) = Self::pending();
        if let Err(error) = initializer(resolver.clone()) {
            resolver.reject(error);
        }
        promise
    }

    /// Creates a pending promise together with its resolver.
    ///
    /// ```
    /// use settle_once::{Promise, State};
    ///
    /// let (resolver, promise) = Promise::<String, ()>::pending();
    /// assert_eq!(promise.state(), State::Pending);
    /// resolver.resolve("done".into());
    /// assert_eq!(promise.state(), State::Fulfilled);
    /// ```
    pub fn pending() -> (Resolver<T, E>, Self) {
        Self::pending_on(scheduler::current())
    }

    pub(crate) fn pending_on(scheduler: Scheduler) -> (Resolver<T, E>, Self) {
        let promise = Self::with_slot(Slot::pending(), scheduler);
        (
            Resolver {
                promise: promise.clone(),
            },
            promise,
        )
    }

    /// A promise already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        Self::with_slot(Slot::Fulfilled(value), scheduler::current())
    }

    /// A promise already rejected with `error`.
    pub fn rejected(error: E) -> Self {
        Self::with_slot(Slot::Rejected(error), scheduler::current())
    }

    /// Normalizes anything resolvable into a promise.
    ///
    /// A promise is returned unchanged; `Ok` and `Err` become an already
    /// fulfilled or rejected promise.
    pub fn from_resolution<R>(resolution: R) -> Self
    where
        R: IntoResolution<E, Value = T>,
    {
        match resolution.into_resolution() {
            Resolution::Fulfill(value) => Self::resolved(value),
            Resolution::Reject(error) => Self::rejected(error),
            Resolution::Adopt(promise) => promise,
        }
    }

    /// Settles a pending promise. Returns `false` if it was already settled.
    fn complete(&self, outcome: Result<T, E>) -> bool {
        let mut inner = self.lock();
        let (on_fulfilled, on_rejected) = match &mut inner.slot {
            Slot::Pending {
                on_fulfilled,
                on_rejected,
            } => (mem::take(on_fulfilled), mem::take(on_rejected)),
            _ => return false,
        };
        inner.locked = true;
        inner.slot = match &outcome {
            Ok(value) => Slot::Fulfilled(value.clone()),
            Err(error) => Slot::Rejected(error.clone()),
        };
        drop(inner);

        match outcome {
            Ok(value) => {
                trace!(observers = on_fulfilled.len(), "promise fulfilled");
                for observer in on_fulfilled {
                    observer(value.clone());
                }
            }
            Err(error) => {
                trace!(observers = on_rejected.len(), "promise rejected");
                for observer in on_rejected {
                    observer(error.clone());
                }
            }
        }
        true
    }

    /// Registers raw observers. They run inline at settlement, or right away
    /// if the promise is already settled.
    pub(crate) fn subscribe(&self, on_fulfilled: Observer<T>, on_rejected: Observer<E>) {
        let mut inner = self.lock();
        match &mut inner.slot {
            Slot::Pending {
                on_fulfilled: fulfilled,
                on_rejected: rejected,
            } => {
                fulfilled.push(on_fulfilled);
                rejected.push(on_rejected);
            }
            Slot::Fulfilled(value) => {
                let value = value.clone();
                drop(inner);
                on_fulfilled(value);
            }
            Slot::Rejected(error) => {
                let error = error.clone();
                drop(inner);
                on_rejected(error);
            }
        }
    }

    fn chain<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Resolution<U, E> + Send + 'static,
        R: FnOnce(E) -> Resolution<U, E> + Send + 'static,
    {
        let (resolver, next) = Promise::pending_on(self.scheduler.clone());
        let (fulfilled_on, rejected_on) = (self.scheduler.clone(), self.scheduler.clone());
        let fulfilled_resolver = resolver.clone();
        self.subscribe(
            Box::new(move |value| {
                fulfilled_on.schedule(Box::new(move || {
                    fulfilled_resolver.settle(on_fulfilled(value));
                }));
            }),
            Box::new(move |error| {
                rejected_on.schedule(Box::new(move || {
                    resolver.settle(on_rejected(error));
                }));
            }),
        );
        next
    }

    /// Chains a fulfillment handler. A rejection passes through unchanged.
    ///
    /// The handler runs on the deferred queue, never before this call
    /// returns. It returns `Ok` to fulfill the new promise, `Err` to reject
    /// it, or another promise to adopt.
    pub fn then<R, F>(&self, on_fulfilled: F) -> Promise<R::Value, E>
    where
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<E>,
        R::Value: Clone + Send + 'static,
    {
        self.chain(
            move |value| on_fulfilled(value).into_resolution(),
            Resolution::Reject,
        )
    }

    /// Chains a rejection handler. A fulfillment passes through unchanged.
    ///
    /// ```
    /// use settle_once::{scheduler, Promise};
    ///
    /// let recovered = Promise::<String, String>::rejected("err".into())
    ///     .catch(|e| Ok(format!("recovered:{e}")));
    /// scheduler::run_until(&recovered);
    /// assert!(recovered.is_fulfilled());
    /// ```
    pub fn catch<R, F>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> R + Send + 'static,
        R: IntoResolution<E, Value = T>,
    {
        self.chain(Resolution::Fulfill, move |error| {
            on_rejected(error).into_resolution()
        })
    }

    /// Chains one handler per outcome.
    pub fn then_or_else<R1, R2, F1, F2>(
        &self,
        on_fulfilled: F1,
        on_rejected: F2,
    ) -> Promise<R1::Value, E>
    where
        F1: FnOnce(T) -> R1 + Send + 'static,
        F2: FnOnce(E) -> R2 + Send + 'static,
        R1: IntoResolution<E>,
        R2: IntoResolution<E, Value = R1::Value>,
        R1::Value: Clone + Send + 'static,
    {
        self.chain(
            move |value| on_fulfilled(value).into_resolution(),
            move |error| on_rejected(error).into_resolution(),
        )
    }

    /// Runs `f` once this promise settles, either way, and passes the
    /// outcome through.
    pub fn finally<F>(&self, f: F) -> Promise<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        let f = Arc::new(Mutex::new(Some(f)));
        let g = f.clone();
        let run = |f: &Mutex<Option<F>>| {
            let f = f.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(f) = f {
                f();
            }
        };
        self.chain(
            move |value| {
                run(f.as_ref());
                Resolution::Fulfill(value)
            },
            move |error| {
                run(g.as_ref());
                Resolution::Reject(error)
            },
        )
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Takes the one-shot right to settle. Fails if another call already did.
    fn claim(&self) -> bool {
        let mut inner = self.promise.lock();
        if inner.locked {
            return false;
        }
        inner.locked = true;
        true
    }

    /// Fulfills the promise with `value`.
    pub fn resolve(&self, value: T) {
        if self.claim() {
            self.promise.complete(Ok(value));
        }
    }

    /// Rejects the promise with `error`.
    pub fn reject(&self, error: E) {
        if self.claim() {
            self.promise.complete(Err(error));
        }
    }

    /// Resolves the promise with another promise: this one settles however
    /// `other` settles, instead of fulfilling with a promise.
    ///
    /// ```
    /// use settle_once::Promise;
    ///
    /// let (inner, inner_promise) = Promise::<u8, ()>::pending();
    /// let (outer, outer_promise) = Promise::<u8, ()>::pending();
    /// outer.resolve_with(inner_promise);
    /// outer.resolve(1); // locked onto the inner promise
    /// assert!(outer_promise.is_pending());
    /// inner.reject(());
    /// assert!(outer_promise.is_rejected());
    /// ```
    pub fn resolve_with(&self, other: Promise<T, E>) {
        if !self.claim() {
            return;
        }
        if self.promise.ptr_eq(&other) {
            trace!("promise resolved with itself; it will never settle");
            return;
        }
        trace!(source = %other.state(), "promise adopting another");
        let (fulfilled, rejected) = (self.promise.clone(), self.promise.clone());
        other.subscribe(
            Box::new(move |value| {
                fulfilled.complete(Ok(value));
            }),
            Box::new(move |error| {
                rejected.complete(Err(error));
            }),
        );
    }

    /// Settles with anything resolvable: a value, an error, or a promise to
    /// adopt.
    pub fn settle<R>(&self, resolution: R)
    where
        R: IntoResolution<E, Value = T>,
    {
        match resolution.into_resolution() {
            Resolution::Fulfill(value) => self.resolve(value),
            Resolution::Reject(error) => self.reject(error),
            Resolution::Adopt(promise) => self.resolve_with(promise),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.promise.is_settled()
    }
}
