//! Survey handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::design::surveys::CreateSurveyCommand;
use crate::application::pagination::{PageRequest, SurveyCursor};

use super::{ListQuery, cursor_to_api, design_to_api, duplication_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::{
    SurveyCreateRequest, SurveyDetailResponse, SurveyRenameRequest,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_surveys(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(SurveyCursor::decode)
        .transpose()
        .map_err(cursor_to_api)?;

    let page = state
        .surveys
        .list(&principal.user, PageRequest::new(query.limit(), cursor))
        .await
        .map_err(design_to_api)?;

    Ok(Json(page))
}

pub async fn create_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SurveyCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let survey = state
        .surveys
        .create(
            &principal.user,
            CreateSurveyCommand { name: payload.name },
        )
        .await
        .map_err(design_to_api)?;

    Ok((StatusCode::CREATED, Json(survey)))
}

pub async fn get_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let graph = state
        .surveys
        .detail(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(Json(SurveyDetailResponse::from(graph)))
}

pub async fn rename_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SurveyRenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let survey = state
        .surveys
        .rename(&principal.user, id, &payload.name)
        .await
        .map_err(design_to_api)?;

    Ok(Json(survey))
}

pub async fn publish_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let survey = state
        .surveys
        .publish(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(Json(survey))
}

pub async fn duplicate_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let copy = state
        .duplication
        .duplicate(&principal.user, id)
        .await
        .map_err(duplication_to_api)?;

    Ok((StatusCode::CREATED, Json(copy)))
}

pub async fn delete_survey(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .surveys
        .delete(&principal.user, id)
        .await
        .map_err(design_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
