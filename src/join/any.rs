use std::fmt::Debug;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{AggregateError, IntoResolution, Promise};

struct Gather<E> {
    errors: Vec<Option<E>>,
    remaining: usize,
}

/// Fulfills with the first input to fulfill.
///
/// Rejects only once every input rejected, with an [`AggregateError`]
/// holding the errors in input order. An empty input rejects with an empty
/// aggregate.
///
/// ```
/// use settle_once::{join, scheduler, Promise};
/// use futures::executor::block_on;
///
/// let inputs = vec![Promise::<u8, &str>::rejected("a"), Promise::rejected("b")];
/// let any = join::any(inputs);
/// scheduler::run_until(&any);
/// let err = block_on(async { any.await }).unwrap_err();
/// assert_eq!(err.errors(), &["a", "b"]);
/// ```
pub fn any<I, T, E>(inputs: I) -> Promise<T, AggregateError<E>>
where
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
    T: Clone + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    let inputs = super::normalize(inputs);
    let (resolver, joined) = Promise::pending();
    if inputs.is_empty() {
        resolver.reject(AggregateError::new(Vec::new()));
        return joined;
    }

    let gather = Arc::new(Mutex::new(Gather {
        errors: inputs.iter().map(|_| None).collect(),
        remaining: inputs.len(),
    }));
    for (index, input) in inputs.into_iter().enumerate() {
        let gather = gather.clone();
        let (fulfilled, rejected) = (resolver.clone(), resolver.clone());
        input.then_or_else(
            move |value| {
                fulfilled.resolve(value);
                Ok(())
            },
            move |error| {
                let mut gather = gather.lock().unwrap_or_else(PoisonError::into_inner);
                gather.errors[index] = Some(error);
                gather.remaining -= 1;
                if gather.remaining == 0 {
                    let errors: Vec<E> = mem::take(&mut gather.errors)
                        .into_iter()
                        .flatten()
                        .collect();
                    drop(gather);
                    debug!(count = errors.len(), "join::any rejected by every input");
                    rejected.reject(AggregateError::new(errors));
                }
                Ok(())
            },
        );
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::any;
    use crate::scheduler::run_until_idle;
    use crate::{AggregateError, Promise};
    use futures::executor::block_on;
    use std::future::IntoFuture;

    #[test]
    fn test_all_rejected_aggregates_in_input_order() {
        let (r1, p1) = Promise::<u8, &str>::pending();
        let joined = any(vec![p1, Promise::rejected("B")]);
        run_until_idle();
        assert!(joined.is_pending());
        r1.reject("A");
        run_until_idle();
        assert_eq!(
            block_on(joined.into_future()),
            Err(AggregateError::new(vec!["A", "B"]))
        );
    }

    #[test]
    fn test_single_fulfillment_short_circuits() {
        let (_never, never) = Promise::<u8, &str>::pending();
        let joined = any(vec![never, Promise::rejected("x"), Promise::resolved(5)]);
        run_until_idle();
        assert_eq!(block_on(joined.into_future()), Ok(5));
    }

    #[test]
    fn test_empty_input_rejects_with_empty_aggregate() {
        let joined = any(Vec::<Result<u8, ()>>::new());
        assert!(joined.is_rejected());
        let err = block_on(joined.into_future()).unwrap_err();
        assert!(err.is_empty());
    }
}
