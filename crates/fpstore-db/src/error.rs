//! Error kinds surfaced by every storage operation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// A uniqueness, foreign-key, not-null or check constraint rejected a write
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A state transition addressed a row that does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The backend could not be reached or refused to serve the request
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other backend failure
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid hex value {value:?}: {reason}")]
    InvalidHex { value: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        let message = postgres_message(&err);

        // SQLSTATE class 23 is "integrity constraint violation"
        if let Some(state) = err.code() {
            if state.code().starts_with("23") {
                return DbError::ConstraintViolation(message);
            }
        }

        if err.is_closed() || err.as_db_error().is_none() {
            DbError::StorageUnavailable(message)
        } else {
            DbError::Storage(message)
        }
    }
}

/// Server-reported text for a PostgreSQL error
///
/// `tokio_postgres::Error`'s own Display is only "db error"; the message,
/// detail and constraint live on the inner `DbError` or the source.
fn postgres_message(err: &tokio_postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        let mut message = db.to_string();
        if let Some(constraint) = db.constraint() {
            if !message.contains(constraint) {
                message.push_str(&format!(" (constraint {})", constraint));
            }
        }
        return message;
    }

    match std::error::Error::source(err) {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    }
}

impl From<deadpool_postgres::PoolError> for DbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        DbError::StorageUnavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => DbError::ConstraintViolation(err.to_string()),
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure => DbError::StorageUnavailable(err.to_string()),
                _ => DbError::Storage(err.to_string()),
            },
            _ => DbError::Storage(err.to_string()),
        }
    }
}
