//! Error types for kv-cache-bench.

use thiserror::Error;

/// Result type alias for kv-cache-bench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kv-cache-bench.
#[derive(Error, Debug)]
pub enum Error {
    /// Text could not be tokenized, or tokenized to nothing.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A token id fell outside the vocabulary.
    #[error("token id {token_id} outside vocabulary of size {vocab_size}")]
    Decoding { token_id: u32, vocab_size: usize },

    /// The model failed to produce a next-token distribution.
    #[error("inference error: {0}")]
    Inference(String),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] values.
///
/// The three generation-time kinds are terminal for a run and surface to the
/// caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Encoding,
    Decoding,
    Inference,
    Other,
}

impl Error {
    /// Wraps any displayable failure from the model as an inference error.
    pub fn inference(err: impl std::fmt::Display) -> Self {
        Self::Inference(err.to_string())
    }

    /// Wraps any displayable failure from the tokenizer as an encoding error.
    pub fn encoding(err: impl std::fmt::Display) -> Self {
        Self::Encoding(err.to_string())
    }

    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Decoding { .. } => ErrorKind::Decoding,
            Self::Inference(_) => ErrorKind::Inference,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Encoding("x".into()).kind(), ErrorKind::Encoding);
        assert_eq!(
            Error::Decoding {
                token_id: 9,
                vocab_size: 4
            }
            .kind(),
            ErrorKind::Decoding
        );
        assert_eq!(Error::inference("oom").kind(), ErrorKind::Inference);
        assert_eq!(Error::Config("bad".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_decoding_message() {
        let err = Error::Decoding {
            token_id: 12,
            vocab_size: 10,
        };
        assert_eq!(err.to_string(), "token id 12 outside vocabulary of size 10");
    }
}
