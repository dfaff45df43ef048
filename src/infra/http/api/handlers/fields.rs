//! Field handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::design::MoveDirection;
use crate::application::design::fields::{CreateFieldCommand, UpdateFieldCommand};
use crate::domain::entities::FieldRecord;

use super::design_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::{
    FieldCreateRequest, FieldDetailResponse, FieldUpdateRequest,
};
use crate::infra::http::api::state::ApiState;

/// Create a field placed on a page.
pub async fn create_page_field(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(page_id): Path<Uuid>,
    Json(payload): Json<FieldCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .pages
        .detail(&principal.user, page_id)
        .await
        .map_err(design_to_api)?;

    let command = CreateFieldCommand {
        survey_id: detail.page.survey_id,
        page_id: Some(page_id),
        ordinal: payload.ordinal,
        draft: payload.field.into(),
    };
    let field = state
        .fields
        .create(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(field)))
}

/// Create an off-page field, shown only when a choice targets it.
pub async fn create_survey_field(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<FieldCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateFieldCommand {
        survey_id,
        page_id: None,
        ordinal: payload.ordinal,
        draft: payload.field.into(),
    };
    let field = state
        .fields
        .create(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(field)))
}

pub async fn get_field(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .fields
        .detail(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(Json(FieldDetailResponse::from(detail)))
}

pub async fn update_field(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FieldUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateFieldCommand {
        id,
        page_id: payload.page_id,
        draft: payload.field.into(),
    };
    let field = state
        .fields
        .update(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok(Json(field))
}

pub async fn delete_field(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .fields
        .delete(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_field_up(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_field(state, principal, id, MoveDirection::Up).await
}

pub async fn move_field_down(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_field(state, principal, id, MoveDirection::Down).await
}

async fn move_field(
    state: ApiState,
    principal: Principal,
    id: Uuid,
    direction: MoveDirection,
) -> Result<Json<FieldRecord>, ApiError> {
    let field = state
        .fields
        .move_field(&principal.user, id, direction)
        .await
        .map_err(design_to_api)?;

    Ok(Json(field))
}
