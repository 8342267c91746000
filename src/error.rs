use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the chat wrapper and its provider.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Provider response contained no reply")]
    EmptyResponse,

    #[error("Provider returned {got} embeddings for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("Cache I/O failed at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache shard {}: {source}", path.display())]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No API key configured; set OPENAI_API_KEY or store one with chatmgr-keys")]
    MissingApiKey,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

impl ChatError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }
}
