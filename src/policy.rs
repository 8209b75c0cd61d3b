use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// What a cell does when its thunk fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailurePolicy {
    /// Keep the failure. Every later force returns the same payload and the
    /// thunk is never called again.
    #[default]
    Memoize,
    /// Keep the thunk. The next force calls it again.
    Retry,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Memoize => write!(f, "memoize"),
            FailurePolicy::Retry => write!(f, "retry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError(String);

impl Error for ParsePolicyError {}

impl fmt::Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown failure policy: {} (expected memoize or retry)",
            self.0
        )
    }
}

impl FromStr for FailurePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memoize" => Ok(FailurePolicy::Memoize),
            "retry" => Ok(FailurePolicy::Retry),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}
