//! Error types for bufcore.

use thiserror::Error;

use crate::shared::FrameId;

/// Result type alias using BufError.
pub type Result<T> = std::result::Result<T, BufError>;

/// Caller-contract violations and configuration problems.
///
/// Lookups that miss, and evictions with no candidate, are not errors: they
/// come back as `Option`/`bool`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufError {
    #[error("Invalid frame {frame_id}: replacer tracks frames 0..{capacity}")]
    InvalidFrame { frame_id: FrameId, capacity: usize },

    #[error("Cannot remove non-evictable frame {frame_id}")]
    RemoveNonEvictable { frame_id: FrameId },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}
