//! Page handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::design::MoveDirection;
use crate::application::design::pages::{CreatePageCommand, UpdatePageCommand};
use crate::domain::entities::PageRecord;

use super::design_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::{PageCreateRequest, PageDetailResponse, PageUpdateRequest};
use crate::infra::http::api::state::ApiState;

pub async fn create_page(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<PageCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreatePageCommand {
        survey_id,
        page_num: payload.page_num,
        subtitle: payload.subtitle,
        target_id: payload.target_id,
    };

    let page = state
        .pages
        .create(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn get_page(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .pages
        .detail(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(Json(PageDetailResponse::from(detail)))
}

pub async fn update_page(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdatePageCommand {
        id,
        subtitle: payload.subtitle,
        target_id: payload.target_id,
    };

    let page = state
        .pages
        .update(&principal.user, command)
        .await
        .map_err(design_to_api)?;

    Ok(Json(page))
}

pub async fn delete_page(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .pages
        .delete(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_page_up(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_page(state, principal, id, MoveDirection::Up).await
}

pub async fn move_page_down(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_page(state, principal, id, MoveDirection::Down).await
}

async fn move_page(
    state: ApiState,
    principal: Principal,
    id: Uuid,
    direction: MoveDirection,
) -> Result<Json<PageRecord>, ApiError> {
    let page = state
        .pages
        .move_page(&principal.user, id, direction)
        .await
        .map_err(design_to_api)?;

    Ok(Json(page))
}
