use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::api::models::FieldTypeResponse;
use crate::infra::http::api::state::ApiState;

pub async fn list_field_types(State(state): State<ApiState>) -> impl IntoResponse {
    let types: Vec<FieldTypeResponse> = state
        .fields
        .catalog()
        .enabled()
        .iter()
        .copied()
        .map(FieldTypeResponse::from)
        .collect();

    Json(types)
}
