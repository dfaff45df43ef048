//! Answer remapping handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::remap::ApplyMappingCommand;

use super::remap_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::{
    MappingOutcomeResponse, RemapApplyRequest, RemapOverviewResponse,
};
use crate::infra::http::api::state::ApiState;

/// Free-text answers not yet mapped, plus the mapping grouped by canonical label.
pub async fn get_remap(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(field_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let overview = state
        .remap
        .overview(&principal.user, field_id)
        .await
        .map_err(remap_to_api)?;

    Ok(Json(RemapOverviewResponse::from(overview)))
}

pub async fn apply_remap(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(field_id): Path<Uuid>,
    Json(payload): Json<RemapApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = ApplyMappingCommand {
        field_id,
        tokens: payload.tokens,
        canonical_label: payload.canonical_label,
    };

    let outcome = state
        .remap
        .apply_mapping(&principal.user, command)
        .await
        .map_err(remap_to_api)?;

    Ok(Json(MappingOutcomeResponse::from(outcome)))
}
