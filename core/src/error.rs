use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown building '{id}'")]
    UnknownBuilding { id: String },

    #[error("Unknown upgrade '{id}'")]
    UnknownUpgrade { id: String },

    #[error("Incompatible save schema: expected {expected}, found {found}")]
    IncompatibleSchema { expected: String, found: String },

    #[error("Malformed save record: {0}")]
    MalformedRecord(String),

    #[error("Malformed save text: {0}")]
    MalformedText(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Engine lock poisoned by a panicking holder")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// True for errors that mean the caller referenced something the
    /// catalog does not define. These are caller defects, not gameplay.
    pub fn is_unknown_identifier(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownBuilding { .. } | EngineError::UnknownUpgrade { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
