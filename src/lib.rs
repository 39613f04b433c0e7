use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClipseekError>;

#[derive(Error, Debug)]
pub enum ClipseekError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcript provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embeddings::EmbeddingError),

    #[error("Vector index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod transcript;
