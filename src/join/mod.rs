//! Composing many promises into one.
//!
//! | Function        | Fulfills with                | Rejects with                   |
//! | ---             | ---                          | ---                            |
//! | [`all`]         | every value, in input order  | the first error                |
//! | [`all_settled`] | every outcome, in input order| never                          |
//! | [`first`]       | the first value              | the first error                |
//! | [`any`]         | the first value              | every error, once all rejected |
//!
//! Inputs are anything [`IntoResolution`](crate::IntoResolution): promises,
//! plain `Ok`/`Err` results, or [`Resolution`](crate::Resolution)s. Results
//! are treated as already settled promises.
//!
//! The combinators observe their inputs through ordinary chaining, so the
//! composite settles on the deferred queue like any other handler.
mod all;
mod all_settled;
mod any;
mod first;

pub use all::all;
pub use all_settled::{all_settled, Settled};
pub use any::any;
pub use first::first;

use crate::{IntoResolution, Promise};

fn normalize<I, T, E>(inputs: I) -> Vec<Promise<T, E>>
where
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    inputs.into_iter().map(Promise::from_resolution).collect()
}
