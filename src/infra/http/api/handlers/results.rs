//! Result listing handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, ResultCursor};

use super::{ListQuery, cursor_to_api, results_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::ResultResponse;
use crate::infra::http::api::state::ApiState;

pub async fn list_results(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = query
        .cursor
        .as_deref()
        .map(ResultCursor::decode)
        .transpose()
        .map_err(cursor_to_api)?;

    let page = state
        .results
        .list(
            &principal.user,
            survey_id,
            PageRequest::new(query.limit(), cursor),
        )
        .await
        .map_err(results_to_api)?;

    Ok(Json(page.map(ResultResponse::from)))
}
