use std::error::Error as StdError;
use std::iter;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Failure details carried on an error response so the tracing layer can log them.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Module that produced the response, e.g. `api::run`.
    pub origin: &'static str,
    pub status: StatusCode,
    /// Outermost error first, then each `source()`.
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(origin: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let chain = iter::successors(Some(error), |&current| current.source())
            .map(ToString::to_string)
            .collect();
        Self {
            origin,
            status,
            chain,
        }
    }

    pub fn from_message(origin: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            origin,
            status,
            chain: vec![message.into()],
        }
    }

    pub fn summary(&self) -> &str {
        self.chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Why the `surveyor` process stopped.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("invalid setting: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
