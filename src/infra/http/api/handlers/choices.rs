//! Choice handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::design::choices::{CreateChoiceCommand, UpdateChoiceCommand};

use super::design_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::ChoiceRequest;
use crate::infra::http::api::state::ApiState;

pub async fn create_choice(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(field_id): Path<Uuid>,
    Json(payload): Json<ChoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateChoiceCommand {
        field_id,
        label: payload.label,
        target_id: payload.target_id,
    };

    let choice = state
        .choices
        .create(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(choice)))
}

pub async fn update_choice(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateChoiceCommand {
        id,
        label: payload.label,
        target_id: payload.target_id,
    };

    let choice = state
        .choices
        .update(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok(Json(choice))
}

pub async fn delete_choice(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .choices
        .delete(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
