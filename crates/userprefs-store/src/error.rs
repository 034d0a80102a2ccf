use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {field} name '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Record store error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
