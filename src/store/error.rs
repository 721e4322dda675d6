use std::io;
use thiserror::Error;

use super::{PageId, RecordId, SlotId};

/// Errors that can occur during page store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid record size: {0}")]
    InvalidRecordSize(usize),

    #[error("Record size mismatch: expected {expected}, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Invalid slot: page_id={0}, slot_id={1}")]
    InvalidSlot(PageId, SlotId),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Page full: page_id={0}")]
    PageFull(PageId),

    #[error("Corrupted store: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
