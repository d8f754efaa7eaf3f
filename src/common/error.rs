use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum SiltError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Buffer pool exhausted, no evictable frames available")]
    PoolExhausted,

    #[error("Disk scheduler error: {0}")]
    Scheduler(String),
}

pub type Result<T> = std::result::Result<T, SiltError>;
