use thiserror::Error;

/// Errors produced by the seeding and harmonization core.
///
/// Per-query errors propagate to the query caller and never contaminate
/// other in-flight queries. None of these are retried: they are either
/// deterministic bugs or resource exhaustion.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("invariant violation in {component}: {message}")]
    InvariantViolation {
        component: &'static str,
        message: String,
    },

    #[error("query cancelled")]
    Cancelled,

    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl MapError {
    /// Records a programming bug with enough context for post-mortem
    /// analysis, then returns the error. Never recovered from; the current
    /// query is aborted.
    pub fn invariant(component: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("invariant violation in {component}: {message}");
        MapError::InvariantViolation { component, message }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = MapError::CorruptIndex("bad magic".into());
        assert_eq!(e.to_string(), "corrupt index: bad magic");
        let e = MapError::invariant("harmonizer", "bridging seed");
        assert_eq!(
            e.to_string(),
            "invariant violation in harmonizer: bridging seed"
        );
    }
}
