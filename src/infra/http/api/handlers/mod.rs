//! API handlers organized by resource type.
//!
//! Error conversions shared by the submodules live here.

mod choices;
mod fields;
mod field_types;
mod pages;
mod remap;
mod results;
mod run;
mod scales;
mod surveys;

pub use choices::*;
pub use field_types::*;
pub use fields::*;
pub use pages::*;
pub use remap::*;
pub use results::*;
pub use run::*;
pub use scales::*;
pub use surveys::*;

// ----- Shared query structs -----

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

impl ListQuery {
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

// ----- Shared error conversions -----

use std::error::Error as _;

use axum::http::StatusCode;

use crate::application::answers::AnswerServiceError;
use crate::application::design::DesignError;
use crate::application::duplication::DuplicationError;
use crate::application::flow::FlowError;
use crate::application::pagination::PaginationError;
use crate::application::permissions::PermissionDenied;
use crate::application::remap::RemapError;
use crate::application::repos::RepoError;
use crate::application::results::ResultsError;
use crate::domain::error::DomainError;
use crate::infra::uploads::UploadStorageError;

use super::error::{ApiError, codes};

pub(crate) fn cursor_to_api(err: PaginationError) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        codes::INVALID_CURSOR,
        "Invalid cursor",
        Some(err.to_string()),
    )
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::Pagination(p) => cursor_to_api(p),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

fn forbidden_to_api(denied: PermissionDenied) -> ApiError {
    ApiError::forbidden(Some(denied.to_string()))
}

fn constraint_to_api(message: &'static str, field: &'static str) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        codes::INVALID_INPUT,
        message,
        Some(field.to_string()),
    )
}

pub(crate) fn design_to_api(err: DesignError) -> ApiError {
    match err {
        DesignError::ConstraintViolation(field) => constraint_to_api("Invalid input", field),
        DesignError::Domain(DomainError::NotFound { entity }) => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(entity.to_string()),
        ),
        DesignError::Domain(err @ DomainError::Validation { .. }) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(err.to_string()),
        ),
        DesignError::Domain(err @ DomainError::Invariant { .. }) => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Survey structure conflict",
            Some(err.to_string()),
        ),
        DesignError::Forbidden(denied) => forbidden_to_api(denied),
        DesignError::Repo(repo) => repo_to_api(repo),
    }
}

fn not_published(survey_id: uuid::Uuid) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        codes::NOT_PUBLISHED,
        "Survey is not published",
        Some(survey_id.to_string()),
    )
}

pub(crate) fn flow_to_api(err: FlowError) -> ApiError {
    match err {
        FlowError::NotPublished(id) => not_published(id),
        FlowError::Forbidden(denied) => forbidden_to_api(denied),
        FlowError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn answers_to_api(err: AnswerServiceError) -> ApiError {
    match err {
        AnswerServiceError::ConstraintViolation(field) => {
            constraint_to_api("Invalid answer", field)
        }
        AnswerServiceError::Invalid { field_id, source } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_ANSWER,
            "Invalid answer",
            Some(format!("{field_id}: {source}")),
        ),
        AnswerServiceError::InvalidPage { errors } => ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            codes::INVALID_ANSWERS,
            "Some answers were rejected",
            None,
        )
        .with_fields(
            errors
                .into_iter()
                .map(|(field_id, message)| (field_id.to_string(), message))
                .collect(),
        ),
        AnswerServiceError::NotPublished(id) => not_published(id),
        AnswerServiceError::Forbidden(denied) => forbidden_to_api(denied),
        AnswerServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn duplication_to_api(err: DuplicationError) -> ApiError {
    match err {
        DuplicationError::Forbidden(denied) => forbidden_to_api(denied),
        DuplicationError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn remap_to_api(err: RemapError) -> ApiError {
    match err {
        RemapError::ConstraintViolation(field) => constraint_to_api("Invalid mapping", field),
        RemapError::Forbidden(denied) => forbidden_to_api(denied),
        RemapError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn results_to_api(err: ResultsError) -> ApiError {
    match err {
        ResultsError::Forbidden(denied) => forbidden_to_api(denied),
        ResultsError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn upload_storage_to_api(err: UploadStorageError) -> ApiError {
    let hint = err.source().map(ToString::to_string);
    let (status, code, message) = match &err {
        UploadStorageError::TooLarge(_) | UploadStorageError::SizeOverflow => (
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::PAYLOAD_TOO_LARGE,
            "Uploaded file is too large",
        ),
        UploadStorageError::Interrupted(_) => {
            (StatusCode::BAD_REQUEST, codes::UPLOAD, "Upload was interrupted")
        }
        UploadStorageError::EmptyPayload => {
            (StatusCode::BAD_REQUEST, codes::UPLOAD, "Uploaded file is empty")
        }
        UploadStorageError::InvalidPath => {
            (StatusCode::BAD_REQUEST, codes::UPLOAD, "Invalid upload path")
        }
        UploadStorageError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::UPLOAD,
            "Failed to store upload",
        ),
    };
    let hint = hint.or_else(|| matches!(err, UploadStorageError::Io(_)).then(|| err.to_string()));
    ApiError::new(status, code, message, hint)
}
