use thiserror::Error;

#[derive(Error, Debug)]
pub enum BottleError {
    #[error("Network error: {}", error_chain(.0))]
    NetworkError(#[from] reqwest::Error),

    #[error("Failed to fetch {name}: {status}")]
    FetchError { name: String, status: String },

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("No bottle available for {0}")]
    NoArtifactError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Formula name must not be empty")]
    InvalidFormulaName,

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl BottleError {
    /// Build a `FetchError` from a non-success HTTP status.
    pub fn from_status(name: &str, status: reqwest::StatusCode) -> Self {
        BottleError::FetchError {
            name: name.to_string(),
            status: status.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BottleError>;

/// Render an error followed by each of its causes, joined with ": ".
/// Causes whose text is already present are skipped.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_carries_status_text() {
        let err = BottleError::from_status("nope", reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Failed to fetch nope: 404 Not Found");
    }

    #[test]
    fn test_io_error_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
        let err = BottleError::from(io);
        assert!(err.to_string().contains("connection reset by peer"));
    }

    #[derive(Debug, Error)]
    #[error("error decoding response body")]
    struct Decode(#[source] std::io::Error);

    #[test]
    fn test_error_chain_includes_causes() {
        let io = std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "end of file before message length reached",
        );
        assert_eq!(
            error_chain(&Decode(io)),
            "error decoding response body: end of file before message length reached"
        );
    }

    #[test]
    fn test_error_chain_skips_repeated_text() {
        let io = std::io::Error::other("body");
        let err = BottleError::from(io);
        assert_eq!(error_chain(&err), "IO error: body");
    }
}
