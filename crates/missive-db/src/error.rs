use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("message {0} was modified concurrently")]
    ConcurrentModification(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    pub fn user_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "user", id }
    }

    pub fn message_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "message", id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
