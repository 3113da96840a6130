use crate::data::DoctorId;
use thiserror::Error;

/// Malformed optimization input, raised before any model is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no doctors found in department: {0}")]
    NoDoctors(String),

    #[error("no rooms supplied for department: {0}")]
    NoRooms(String),

    #[error("no days supplied for department: {0}")]
    NoDays(String),

    #[error("unknown department: {0}")]
    UnknownDepartment(String),
}

/// Persistence store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("corrupt {column} value in store: {value}")]
    CorruptValue { column: &'static str, value: String },

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    StoreError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    StoreError::ForeignKeyViolation(msg)
                } else {
                    StoreError::Query(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                entity: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the scheduling service.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("doctor not found: {0}")]
    UnknownDoctor(DoctorId),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_surface_verbatim() {
        let err: SchedulerError = ConfigurationError::NoDoctors("Cardiology".into()).into();
        assert_eq!(err.to_string(), "no doctors found in department: Cardiology");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
