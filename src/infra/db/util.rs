use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            ErrorKind::ForeignKeyViolation => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => RepoError::Integrity {
                message: db.message().to_string(),
            },
            _ if db.message().contains("invalid input syntax") => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            _ if db.message().contains("canceling statement due to") => RepoError::Timeout,
            _ => RepoError::from_persistence(db),
        },
        other => RepoError::from_persistence(other),
    }
}
