use thiserror::Error;

/// Failures while wiring up process resources: the pool, the listener, upload storage.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("could not connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("failed to prepare {resource}: {source}")]
    Io {
        resource: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn io(resource: &'static str, source: std::io::Error) -> Self {
        Self::Io { resource, source }
    }
}
