use core::fmt;

/// Where an offending argument sits in a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPosition {
    /// A positional argument, counted from zero.
    Positional(usize),
    /// A keyword argument, by name.
    Keyword(String),
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPosition::Positional(index) => write!(f, "positional argument {index}"),
            ArgPosition::Keyword(name) => write!(f, "keyword argument `{name}`"),
        }
    }
}

/// The arguments of a call could not be turned into a cache key.
///
/// Raised when the call is made and never stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// An argument has no stable notion of equality.
    #[error("{position} cannot form a stable cache key: {reason}")]
    Unhashable {
        /// The argument which was rejected.
        position: ArgPosition,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The same keyword argument was supplied twice.
    #[error("keyword argument `{0}` was supplied more than once")]
    DuplicateKeyword(String),
}
