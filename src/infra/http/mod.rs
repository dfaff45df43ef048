pub mod api;
mod middleware;

pub use api::{ApiState, ServiceOptions, build_api_router};
pub use middleware::{REQUEST_ID_HEADER, RequestId};

use async_trait::async_trait;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware as axum_middleware};
use sqlx::Error as SqlxError;
use std::sync::Arc;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;

/// Liveness probe for the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), SqlxError>;
}

#[async_trait]
impl HealthCheck for PostgresRepositories {
    async fn check(&self) -> Result<(), SqlxError> {
        self.health_check().await
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn health(State(health): State<Arc<dyn HealthCheck>>) -> Response {
    db_health_response(health.check().await)
}

/// Full application router: health probe plus the authenticated JSON API.
pub fn build_router(state: ApiState, max_request_bytes: usize) -> Router {
    let health_router = Router::new()
        .route("/health", get(health))
        .with_state(state.health.clone());

    Router::new()
        .merge(health_router)
        .merge(build_api_router(state))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::trace_requests))
}
