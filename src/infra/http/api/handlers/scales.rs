//! Ordinal scale handlers

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::design::scales::CreateScaleCommand;

use super::design_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::ScaleCreateRequest;
use crate::infra::http::api::state::ApiState;

pub async fn list_scales(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let scales = state
        .scales
        .list(&principal.user)
        .await
        .map_err(design_to_api)?;

    Ok(Json(scales))
}

pub async fn create_scale(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ScaleCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateScaleCommand {
        name: payload.name,
        kind: payload.kind,
        labels: payload.labels,
    };

    let scale = state
        .scales
        .create(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(scale)))
}
