//! Error types for planning.
//!
//! Every error is fatal to the planning run and carries the offending
//! entity ids (and, for cycles, the full path) so callers can render an
//! actionable diagnostic. Errors are categorized the same way for display.

use crate::types::Action;
use catalog::EntityId;
use std::fmt;

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of planning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declarations themselves are invalid.
    Declaration,
    /// A reference points somewhere it cannot.
    Reference,
    /// Lifecycle policies are inconsistent with the dependency graph.
    Lifecycle,
    /// Entities depend on each other in a loop.
    Cycle,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid declaration",
            Self::Reference => "Invalid reference",
            Self::Lifecycle => "Lifecycle policy conflict",
            Self::Cycle => "Dependency cycle",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Declaration => "Fix the declaration syntax and re-run planning",
            Self::Reference => "Check that the referenced entity is declared and is not the entity itself",
            Self::Lifecycle => {
                "Set create_before_destroy on every resource the flagged resource depends on"
            }
            Self::Cycle => "Break the loop by removing one of the listed references",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while planning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Catalog loading failed (duplicate id, malformed reference).
    #[error(transparent)]
    Catalog(#[from] catalog::Error),

    /// A reference names an entity that is not in the catalog.
    #[error("{entity} references unknown entity `{reference}` at `{attribute}`")]
    UnknownReference {
        /// Entity holding the reference.
        entity: EntityId,
        /// Attribute path the reference was found at.
        attribute: String,
        /// Reference text as written.
        reference: String,
    },

    /// An entity references itself.
    #[error("{entity} references itself at `{attribute}`: `{reference}`")]
    SelfDependency {
        /// Entity holding the reference.
        entity: EntityId,
        /// Attribute path the reference was found at.
        attribute: String,
        /// Reference text as written.
        reference: String,
    },

    /// A create-before-destroy entity depends on one that is destroyed first.
    #[error(
        "{dependent} has create_before_destroy but depends on {dependency}, which does not; \
         destroying {dependency} before {dependent} is recreated would break {dependent} \
         (via {})",
        render_path(.path)
    )]
    LifecyclePolicyViolation {
        /// The create-before-destroy entity.
        dependent: EntityId,
        /// The managed dependency lacking the flag.
        dependency: EntityId,
        /// Dependency chain from `dependent` to `dependency`.
        path: Vec<EntityId>,
    },

    /// Entities depend on each other in a loop.
    #[error("dependency cycle: {}", render_path(.path))]
    Cycle {
        /// Cycle as a closed chain; the first id is repeated at the end.
        path: Vec<EntityId>,
        /// `references[i]` lists the attributes on `path[i]` that reference `path[i + 1]`.
        references: Vec<String>,
    },

    /// An entity with `prevent_destroy` would be destroyed or replaced.
    #[error("{entity} has prevent_destroy but the plan would {action} it")]
    PreventDestroy {
        /// The protected entity.
        entity: EntityId,
        /// The action that was requested.
        action: Action,
    },
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Catalog(_) => ErrorCategory::Declaration,
            Error::UnknownReference { .. } | Error::SelfDependency { .. } => {
                ErrorCategory::Reference
            }
            Error::LifecyclePolicyViolation { .. } | Error::PreventDestroy { .. } => {
                ErrorCategory::Lifecycle
            }
            Error::Cycle { .. } => ErrorCategory::Cycle,
        }
    }

    /// Entity ids the error is about, in the order they are reported.
    pub fn entities(&self) -> Vec<&EntityId> {
        match self {
            Error::Catalog(e) => vec![e.entity()],
            Error::UnknownReference { entity, .. }
            | Error::SelfDependency { entity, .. }
            | Error::PreventDestroy { entity, .. } => vec![entity],
            Error::LifecyclePolicyViolation {
                dependent,
                dependency,
                ..
            } => vec![dependent, dependency],
            Error::Cycle { path, .. } => path.iter().collect(),
        }
    }

    /// Cycle-shaped errors expose their full path
    pub fn path(&self) -> Option<&[EntityId]> {
        match self {
            Error::LifecyclePolicyViolation { path, .. } | Error::Cycle { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Render `a -> b -> c`
pub(crate) fn render_path(path: &[EntityId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
