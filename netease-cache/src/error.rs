use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cache key {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
