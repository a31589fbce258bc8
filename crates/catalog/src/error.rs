//! Error types for the catalog crate

use crate::types::EntityId;
use thiserror::Error;

/// Syntax problems found while parsing a reference expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSyntaxError {
    /// The expression was empty (or only whitespace)
    #[error("empty reference expression")]
    Empty,

    /// Fewer segments than `type.name` (or `data.type.name`)
    #[error("expected `type.name` or `data.type.name`, found {found} segment(s)")]
    TooShort { found: usize },

    /// A segment contained characters outside the identifier alphabet
    #[error("invalid segment `{segment}`")]
    InvalidSegment { segment: String },

    /// A `${` interpolation without its closing brace
    #[error("unterminated interpolation starting at byte {offset}")]
    Unterminated { offset: usize },
}

/// Errors that can occur while loading a catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Two declarations share the same id
    #[error("duplicate entity id: {id}")]
    DuplicateId { id: EntityId },

    /// A reference expression is not syntactically resolvable
    #[error("malformed reference in {entity} at `{attribute}`: `{text}` ({reason})")]
    MalformedReference {
        entity: EntityId,
        attribute: String,
        text: String,
        #[source]
        reason: ReferenceSyntaxError,
    },
}

impl Error {
    /// The entity the error is about
    pub fn entity(&self) -> &EntityId {
        match self {
            Error::DuplicateId { id } => id,
            Error::MalformedReference { entity, .. } => entity,
        }
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;
