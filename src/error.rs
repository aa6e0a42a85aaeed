use std::fmt::Debug;

use thiserror::Error;

/// Rejection of [`join::any`](crate::join::any) when every input rejected.
///
/// Holds the individual errors in input order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {} promises were rejected", .errors.len())]
pub struct AggregateError<E>
where
    E: Debug,
{
    errors: Vec<E>,
}

impl<E: Debug> AggregateError<E> {
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: Debug> IntoIterator for AggregateError<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::AggregateError;

    #[test]
    fn test_display_counts_errors() {
        let err = AggregateError::new(vec!["a", "b"]);
        assert_eq!(err.to_string(), "all 2 promises were rejected");
        assert_eq!(err.errors(), &["a", "b"]);
        assert_eq!(err.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        let err = AggregateError::new(vec![std::io::ErrorKind::Other]);
        assert_error(&err);
        assert!(!err.is_empty());
    }
}
