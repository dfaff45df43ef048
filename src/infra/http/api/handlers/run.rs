//! Respondent handlers: walking a survey and answering it.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::Multipart;
use futures::StreamExt;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::types::AnswerShape;
use crate::infra::uploads::{UploadSlot, UploadStorageError};

use super::{answers_to_api, flow_to_api, upload_storage_to_api};
use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::api::middleware::Principal;
use crate::infra::http::api::models::{
    AnswerRequest, PageSubmissionResponse, PageSubmitRequest, RunStepResponse,
    UploadAnswerResponse,
};
use crate::infra::http::api::state::ApiState;

const SOURCE: &str = "surveyor::http::run";

/// The page the respondent should see next, or where to go once finished.
pub async fn get_run_step(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let step = state
        .flow
        .next_page(&principal.user, survey_id)
        .await
        .map_err(flow_to_api)?;

    Ok(Json(RunStepResponse::from(step)))
}

pub async fn submit_run_page(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<PageSubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = state
        .answers
        .submit_page(&principal.user, survey_id, payload.page_id, payload.answers)
        .await
        .map_err(answers_to_api)?;

    Ok(Json(PageSubmissionResponse::from(submission)))
}

pub async fn save_run_answer(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path((survey_id, field_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .answers
        .save_result(
            &principal.user,
            survey_id,
            field_id,
            payload.answer,
            payload.page_id,
        )
        .await
        .map_err(answers_to_api)?;

    Ok(Json(saved))
}

/// Store a file answer. Expects a `file` part and an optional `page_id` part sent before
/// it. A previous upload for the same field is removed once the new one is recorded.
pub async fn upload_run_answer(
    State(state): State<ApiState>,
    Extension(principal): Extension<Principal>,
    Path((survey_id, field_id)): Path<(Uuid, Uuid)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let context = state
        .flow
        .context(&principal.user, survey_id)
        .await
        .map_err(flow_to_api)?;
    let field = context
        .graph
        .field(field_id)
        .ok_or_else(|| ApiError::not_found("field not found"))?;
    if field.field_type.answer_shape() != AnswerShape::Upload {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Field does not accept uploads",
            Some(field.field_type.as_str().to_string()),
        ));
    }
    let previous = context
        .result_for(field_id)
        .map(|result| result.upload.clone())
        .filter(|upload| !upload.is_empty());

    let mut page_id = None;
    let mut file = None;
    while let Some(part) = multipart.next_field().await.map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large",
                Some(err.to_string()),
            )
        } else {
            ApiError::bad_request("invalid multipart payload", Some(err.to_string()))
        }
    })? {
        match part.name() {
            Some("page_id") => {
                let raw = part.text().await.map_err(|err| {
                    ApiError::bad_request("invalid page_id", Some(err.to_string()))
                })?;
                let parsed = Uuid::parse_str(raw.trim())
                    .map_err(|err| ApiError::bad_request("invalid page_id", Some(err.to_string())))?;
                page_id = Some(parsed);
            }
            Some("file") => {
                file = Some(part);
                break;
            }
            _ => continue,
        }
    }
    let part = file.ok_or_else(|| ApiError::bad_request("missing file", None))?;

    let filename = part
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "upload.bin".to_string());
    let stream = part.map(|chunk| {
        chunk.map_err(|err| {
            if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                UploadStorageError::TooLarge(Box::new(err))
            } else {
                UploadStorageError::Interrupted(Box::new(err))
            }
        })
    });

    let stored = state
        .upload_storage
        .store_stream(
            UploadSlot {
                survey_id,
                field_id,
            },
            &filename,
            stream,
        )
        .await
        .map_err(upload_storage_to_api)?;

    let saved = match state
        .answers
        .save_upload(
            &principal.user,
            survey_id,
            field_id,
            &stored.stored_path,
            page_id,
        )
        .await
    {
        Ok(saved) => saved,
        Err(err) => {
            if let Err(cleanup) = state.upload_storage.remove(&stored.stored_path).await {
                error!(
                    target = SOURCE,
                    path = %stored.stored_path,
                    error = %cleanup,
                    "failed to remove orphaned upload"
                );
            }
            return Err(answers_to_api(err));
        }
    };

    if let Some(previous) = previous.filter(|path| *path != stored.stored_path) {
        if let Err(err) = state.upload_storage.remove(&previous).await {
            warn!(
                target = SOURCE,
                path = %previous,
                error = %err,
                "failed to remove replaced upload"
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadAnswerResponse {
            result: saved,
            checksum: stored.checksum,
            size_bytes: stored.size_bytes,
        }),
    ))
}
