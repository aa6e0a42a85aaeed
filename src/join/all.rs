use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{IntoResolution, Promise};

struct Gather<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Waits for every input to fulfill.
///
/// Fulfills with the values in input order, whatever order they arrive in.
/// Rejects with the first error observed; later errors are ignored. An empty
/// input fulfills with an empty `Vec`.
///
/// ```
/// use settle_once::{join, scheduler, Promise};
///
/// let (later, pending) = Promise::<u8, ()>::pending();
/// let all = join::all(vec![pending, Promise::resolved(2), Promise::resolved(3)]);
/// later.resolve(1);
/// scheduler::run_until(&all);
/// assert!(all.is_fulfilled());
/// ```
pub fn all<I, T, E>(inputs: I) -> Promise<Vec<T>, E>
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
        values: inputs.iter().map(|_| None).collect(),
        remaining: inputs.len(),
    }));
    for (index, input) in inputs.into_iter().enumerate() {
        let gather = gather.clone();
        let (fulfilled, rejected) = (resolver.clone(), resolver.clone());
        input.then_or_else(
            move |value| {
                let mut gather = gather.lock().unwrap_or_else(PoisonError::into_inner);
                gather.values[index] = Some(value);
                gather.remaining -= 1;
                if gather.remaining == 0 {
                    let values: Vec<T> = mem::take(&mut gather.values)
                        .into_iter()
                        .flatten()
                        .collect();
                    drop(gather);
                    debug!(count = values.len(), "join::all fulfilled");
                    fulfilled.resolve(values);
                }
                Ok(())
            },
            move |error| {
                debug!(index, "join::all input rejected");
                rejected.reject(error);
                Ok(())
            },
        );
    }
    joined
}
