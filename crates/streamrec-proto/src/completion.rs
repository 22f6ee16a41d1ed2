//! Terminal events.
//!
//! A publisher ends each subscription with at most one [`Completion`]: either
//! it finished normally or it failed with an error value.

use serde::{Deserialize, Serialize};

/// The single event that ends a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum Completion<E> {
    /// The publisher finished normally.
    Finished,

    /// The publisher terminated with an error.
    Failure(E),
}

impl<E> Completion<E> {
    /// Returns true for [`Completion::Finished`].
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true for [`Completion::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the error carried by a failure.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Finished => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Converts to a `Result`, mapping `Finished` to `Ok(())`.
    pub fn into_result(self) -> Result<(), E> {
        match self {
            Self::Finished => Ok(()),
            Self::Failure(error) => Err(error),
        }
    }

    /// Short name used in log fields and exports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Failure(_) => "failure",
        }
    }

    /// Borrows the error, if any.
    pub fn as_ref(&self) -> Completion<&E> {
        match self {
            Self::Finished => Completion::Finished,
            Self::Failure(error) => Completion::Failure(error),
        }
    }
}
