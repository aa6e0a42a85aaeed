use std::convert::Infallible;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{IntoResolution, Promise};

/// Outcome of one input of [`all_settled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            Settled::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(error) => Err(error),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled(value),
            Err(error) => Settled::Rejected(error),
        }
    }
}

struct Gather<T, E> {
    outcomes: Vec<Option<Settled<T, E>>>,
    remaining: usize,
}

impl<T, E> Gather<T, E> {
    /// Records one outcome, returning all of them once the last arrives.
    fn record(&mut self, index: usize, outcome: Settled<T, E>) -> Option<Vec<Settled<T, E>>> {
        self.outcomes[index] = Some(outcome);
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }
        Some(mem::take(&mut self.outcomes).into_iter().flatten().collect())
    }
}

/// Waits for every input to settle, either way. Never rejects.
///
/// Fulfills with one [`Settled`] per input, at the input's index. An empty
/// input fulfills with an empty `Vec`.
pub fn all_settled<I, T, E>(inputs: I) -> Promise<Vec<Settled<T, E>>, Infallible>
where
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let inputs = super::normalize(inputs);
    let (resolver, joined) = Promise::pending();
    if inputs.is_empty() {
        resolver.resolve(Vec::new());
        return joined;
    }

    let gather = Arc::new(Mutex::new(Gather {
        outcomes: inputs.iter().map(|_| None).collect(),
        remaining: inputs.len(),
    }));
    for (index, input) in inputs.into_iter().enumerate() {
        let (on_value, on_error) = (gather.clone(), gather.clone());
        let (fulfilled, rejected) = (resolver.clone(), resolver.clone());
        input.then_or_else(
            move |value| {
                let done = on_value
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(index, Settled::Fulfilled(value));
                if let Some(outcomes) = done {
                    debug!(count = outcomes.len(), "join::all_settled fulfilled");
                    fulfilled.resolve(outcomes);
                }
                Ok(())
            },
            move |error| {
                let done = on_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(index, Settled::Rejected(error));
                if let Some(outcomes) = done {
                    debug!(count = outcomes.len(), "join::all_settled fulfilled");
                    rejected.resolve(outcomes);
                }
                Ok(())
            },
        );
    }
    joined
}
