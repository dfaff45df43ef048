use thiserror::Error;

use crate::infra::uploads::UploadStorageError;

/// Failures while wiring the survey service to its database, uploads and logs.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("upload directory unavailable: {0}")]
    UploadRoot(#[from] std::io::Error),
    #[error("upload storage unavailable: {0}")]
    Uploads(#[from] UploadStorageError),
}
