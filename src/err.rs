use std::error::Error;
use std::fmt;

/// `Computation` is the thunk's own failure; the other variants come from the
/// cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ForceError<E> {
    Computation(E),
    Recursive,
    Poisoned,
}

impl<E> ForceError<E> {
    pub fn is_recursive(&self) -> bool {
        matches!(self, ForceError::Recursive)
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self, ForceError::Poisoned)
    }

    pub fn computation(&self) -> Option<&E> {
        match self {
            ForceError::Computation(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_computation(self) -> Option<E> {
        match self {
            ForceError::Computation(e) => Some(e),
            _ => None,
        }
    }

    pub fn map<F, G: FnOnce(E) -> F>(self, f: G) -> ForceError<F> {
        match self {
            ForceError::Computation(e) => ForceError::Computation(f(e)),
            ForceError::Recursive => ForceError::Recursive,
            ForceError::Poisoned => ForceError::Poisoned,
        }
    }
}

impl<E: fmt::Debug + fmt::Display> Error for ForceError<E> {}

impl<E: fmt::Display> fmt::Display for ForceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForceError::Computation(e) => write!(f, "Computation failed: {e}"),
            ForceError::Recursive => write!(f, "Deferred value forced while it was being computed"),
            ForceError::Poisoned => write!(f, "Deferred computation panicked"),
        }
    }
}
