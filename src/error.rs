use std::io;

use thiserror::Error;

/// Per-document extraction failures. A failing document is skipped and reported;
/// the rest of the batch keeps going.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{tool} is not available: {source}")]
    ToolUnavailable {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{tool} returned non-zero exit status: {stderr}")]
    ToolFailed { tool: &'static str, stderr: String },
    #[error("{tool} exceeded the parse budget of {timeout_ms} ms")]
    Timeout { tool: &'static str, timeout_ms: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("embedder returned {got} vectors for {expected} inputs")]
    BatchSizeMismatch { expected: usize, got: usize },
}
