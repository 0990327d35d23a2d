use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexonError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Failed to write PDF: {0}")]
    SerializeError(String),

    #[error("{failed} split outputs failed, {succeeded} succeeded")]
    PartialSplitFailure { succeeded: usize, failed: usize },

    #[error("Merge failed: {0}")]
    MergeError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Conversion unavailable: {0}")]
    ConversionUnavailable(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
}

/// Stable, caller-facing name of an error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ParseError,
    InvalidRange,
    SerializeError,
    PartialSplitFailure,
    MergeError,
    InvalidRequest,
    UnsupportedInput,
    ConversionUnavailable,
    ConversionFailed,
}

impl HexonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HexonError::ParseError(_) => ErrorKind::ParseError,
            HexonError::InvalidRange(_) => ErrorKind::InvalidRange,
            HexonError::SerializeError(_) => ErrorKind::SerializeError,
            HexonError::PartialSplitFailure { .. } => ErrorKind::PartialSplitFailure,
            HexonError::MergeError(_) => ErrorKind::MergeError,
            HexonError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            HexonError::UnsupportedInput(_) => ErrorKind::UnsupportedInput,
            HexonError::ConversionUnavailable(_) => ErrorKind::ConversionUnavailable,
            HexonError::ConversionFailed(_) => ErrorKind::ConversionFailed,
        }
    }

    /// True for errors caused by the caller's input rather than by this crate
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ParseError
                | ErrorKind::InvalidRange
                | ErrorKind::MergeError
                | ErrorKind::InvalidRequest
                | ErrorKind::UnsupportedInput
        )
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::InvalidRange => "InvalidRange",
            ErrorKind::SerializeError => "SerializeError",
            ErrorKind::PartialSplitFailure => "PartialSplitFailure",
            ErrorKind::MergeError => "MergeError",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::UnsupportedInput => "UnsupportedInput",
            ErrorKind::ConversionUnavailable => "ConversionUnavailable",
            ErrorKind::ConversionFailed => "ConversionFailed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message_counts_both() {
        let err = HexonError::PartialSplitFailure {
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(err.to_string(), "1 split outputs failed, 2 succeeded");
    }

    #[test]
    fn test_kind_serializes_as_variant_name() {
        let json = serde_json::to_string(&ErrorKind::InvalidRange).unwrap();
        assert_eq!(json, r#""InvalidRange""#);
        assert_eq!(ErrorKind::InvalidRange.as_str(), "InvalidRange");
    }

    #[test]
    fn test_client_errors() {
        assert!(HexonError::InvalidRange("x".into()).is_client_error());
        assert!(HexonError::ParseError("x".into()).is_client_error());
        assert!(!HexonError::SerializeError("x".into()).is_client_error());
        assert!(!HexonError::ConversionUnavailable("x".into()).is_client_error());
    }
}
