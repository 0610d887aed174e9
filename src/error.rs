use thiserror::Error;

use crate::model::BindingKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Offset outside the source text, or not on a character boundary.
    #[error("offset {offset} is outside the source text (length {len})")]
    InvalidOffset { offset: u32, len: u32 },

    #[error("invalid range {start}..{end}")]
    InvalidRange { start: u32, end: u32 },

    /// A kind-specific handler received a binding of another kind.
    #[error("{context}: expected a {expected:?} binding, found {found:?}")]
    UnexpectedBinding {
        context: &'static str,
        expected: BindingKind,
        found: BindingKind,
    },

    #[error("request cancelled")]
    Cancelled,

    /// The request panicked; only that request is affected.
    #[error("request failed: {0}")]
    Internal(String),
}

impl EngineError {
    /// Caller mistakes, as opposed to failures inside the engine.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidOffset { .. } | Self::InvalidRange { .. })
    }
}
