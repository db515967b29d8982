//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or parsing wire structures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid device token: {0}")]
    InvalidToken(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(u8),

    #[error("reserved payload field: {0}")]
    ReservedField(String),

    #[error("invalid command format: {0}")]
    InvalidCommandFormat(u8),

    #[error("payload does not fit in {max} characters and cannot be cropped")]
    PayloadTooLarge { max: usize },

    #[error("payload of {size} bytes exceeds the {max} byte length field")]
    PayloadLengthOverflow { size: usize, max: usize },

    #[error("truncated {what}: need {needed} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("unknown command byte: {0}")]
    UnknownCommand(u8),

    #[error("unexpected frame item {id} with length {length}")]
    UnexpectedItem { id: u8, length: usize },

    #[error("missing frame item: {0}")]
    MissingItem(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The alert body cannot be shortened any further.
///
/// Returned by [`AlertItem::crop`](crate::AlertItem::crop) when the requested
/// length is at or below the item's minimum body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot crop alert body to {target} characters (minimum {minimum})")]
pub struct CannotCropBody {
    pub target: usize,
    pub minimum: usize,
}
