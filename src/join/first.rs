use crate::{IntoResolution, Promise};

/// Settles like whichever input settles first, fulfilled or rejected.
///
/// Later settlements are observed and discarded. An empty input never
/// settles.
///
/// Racing against a timer turns any promise into one with a deadline:
///
/// ```
/// use settle_once::{join, scheduler, time, Promise};
/// use std::time::Duration;
///
/// let (_slow, never) = Promise::<u8, &str>::pending();
/// let deadline = time::delay_reject(Duration::from_millis(5), "timed out");
/// let bounded = join::first(vec![never, deadline]);
/// scheduler::run_until(&bounded);
/// assert!(bounded.is_rejected());
/// ```
pub fn first<I, T, E>(inputs: I) -> Promise<T, E>
where
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let (resolver, raced) = Promise::pending();
    for input in super::normalize(inputs) {
        let (fulfilled, rejected) = (resolver.clone(), resolver.clone());
        input.then_or_else(
            move |value| {
                fulfilled.resolve(value);
                Ok(())
            },
            move |error| {
                rejected.reject(error);
                Ok(())
            },
        );
    }
    raced
}

#[cfg(test)]
mod tests {
    use super::first;
    use crate::scheduler::run_until_idle;
    use crate::Promise;
    use futures::executor::block_on;
    use std::future::IntoFuture;

    #[test]
    fn test_first_fulfillment_wins() {
        let (r1, p1) = Promise::<&str, &str>::pending();
        let (r2, p2) = Promise::<&str, &str>::pending();
        let raced = first(vec![p1, p2]);
        r2.resolve("two");
        run_until_idle();
        r1.reject("one");
        run_until_idle();
        assert_eq!(block_on(raced.into_future()), Ok("two"));
    }

    #[test]
    fn test_first_rejection_wins() {
        let (r1, p1) = Promise::<&str, &str>::pending();
        let raced = first(vec![p1, Promise::rejected("fast")]);
        run_until_idle();
        r1.resolve("slow");
        run_until_idle();
        assert_eq!(block_on(raced.into_future()), Err("fast"));
    }

    #[test]
    fn test_empty_input_stays_pending() {
        let raced = first(Vec::<Promise<(), ()>>::new());
        run_until_idle();
        assert!(raced.is_pending());
    }
}
