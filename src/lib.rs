//! Settle-once promises.
//!
//! A [`Promise`] holds the eventual outcome of a computation: a value of type
//! `T` or an error of type `E`. It leaves the pending state exactly once, and
//! every handler chained onto it runs on a deferred queue after the code that
//! registered or settled it has returned.
//!
//! ```
//! use settle_once::{scheduler, Promise};
//!
//! let (resolver, promise) = Promise::<i32, String>::pending();
//! let doubled = promise.then(|v| Ok(v * 2));
//! resolver.resolve(21);
//! resolver.resolve(99); // ignored, first settlement wins
//!
//! scheduler::run_until(&doubled);
//! assert!(doubled.is_fulfilled());
//! ```
//!
//! The [`join`] module composes several promises into one, and [`time`]
//! offers timer-backed promises for racing against deadlines.
mod error;
mod future;
mod promise;
mod resolution;

pub mod join;
pub mod scheduler;
pub mod time;

pub use error::AggregateError;
pub use future::PromiseFuture;
pub use promise::{Promise, Resolver, State};
pub use resolution::{IntoResolution, Resolution};
