//! Error types for the aggregation pass.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a whole aggregation pass. Individual malformed lines never
/// produce one of these; they are skipped.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to open results file: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read results stream at line {line}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let err = AggregateError::Open {
            path: PathBuf::from("missing.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "Failed to open results file: missing.json");
        assert!(err.source().is_some());

        let err = AggregateError::Read {
            line: 3,
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8"),
        };
        assert!(err.to_string().contains("line 3"));
    }
}
