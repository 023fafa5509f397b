//! The module contains the error the engine can throw.
//!
//! Errors fall in three families:
//!
//! - bad input: [`KeyNotFound`], [`ExistingKey`], [`InvalidCategory`],
//!   [`InvalidPost`]. The request is rejected before anything is written.
//! - conflict: [`Conflict`], a write touched a different number of rows than
//!   the snapshot predicted. The surrounding transaction is rolled back.
//! - infrastructure: [`Database`], any failure of the backing store.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`InvalidCategory`]: EngineError::InvalidCategory
//!  [`InvalidPost`]: EngineError::InvalidPost
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Invalid post: {0}")]
    InvalidPost(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// The request itself was wrong; retrying it unchanged will fail again.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound(_)
                | Self::ExistingKey(_)
                | Self::InvalidCategory(_)
                | Self::InvalidPost(_)
        )
    }

    /// Another writer changed the rows this operation relied on.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::InvalidPost(a), Self::InvalidPost(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
