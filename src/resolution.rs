use crate::Promise;

/// How to settle a promise.
#[derive(Debug, Clone)]
pub enum Resolution<T, E> {
    /// Fulfill with a value.
    Fulfill(T),
    /// Reject with an error.
    Reject(E),
    /// Follow another promise and settle the same way it does.
    Adopt(Promise<T, E>),
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resolution::Fulfill(value),
            Err(error) => Resolution::Reject(error),
        }
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Adopt(promise)
    }
}

/// Values a handler or a combinator input can settle a promise with.
///
/// Implemented for `Result<T, E>` (`Err` is how a handler signals failure),
/// for `Promise<T, E>` (adopted rather than nested) and for [`Resolution`].
pub trait IntoResolution<E> {
    type Value;

    fn into_resolution(self) -> Resolution<Self::Value, E>;
}

impl<T, E> IntoResolution<E> for Resolution<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        self
    }
}

impl<T, E> IntoResolution<E> for Result<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        self.into()
    }
}

impl<T, E> IntoResolution<E> for Promise<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Adopt(self)
    }
}
