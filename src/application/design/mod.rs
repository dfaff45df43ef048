//! Designer-facing services: surveys, pages, fields, choices and scales.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::permissions::{Permission, PermissionDenied, PermissionPolicy};
use crate::application::repos::{RepoError, SurveysRepo};
use crate::domain::entities::SurveyRecord;
use crate::domain::error::DomainError;
use crate::domain::types::FieldType;

pub mod choices;
pub mod fields;
pub mod pages;
pub mod scales;
pub mod surveys;

pub use choices::ChoiceDesignService;
pub use fields::FieldDesignService;
pub use pages::PageDesignService;
pub use scales::ScaleService;
pub use surveys::SurveyDesignService;

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Field types designers may use, read from configuration at startup.
#[derive(Debug, Clone)]
pub struct FieldTypeCatalog {
    enabled: Vec<FieldType>,
}

impl FieldTypeCatalog {
    pub fn new(enabled: Vec<FieldType>) -> Self {
        Self { enabled }
    }

    pub fn all() -> Self {
        Self::new(FieldType::ALL.to_vec())
    }

    pub fn enabled(&self) -> &[FieldType] {
        &self.enabled
    }

    pub fn is_enabled(&self, field_type: FieldType) -> bool {
        self.enabled.contains(&field_type)
    }
}

impl Default for FieldTypeCatalog {
    fn default() -> Self {
        Self::all()
    }
}

/// Resolves the survey owning an object and checks the actor against it.
#[derive(Clone)]
pub struct SurveyAccess {
    surveys: Arc<dyn SurveysRepo>,
    policy: Arc<dyn PermissionPolicy>,
}

impl SurveyAccess {
    pub fn new(surveys: Arc<dyn SurveysRepo>, policy: Arc<dyn PermissionPolicy>) -> Self {
        Self { surveys, policy }
    }

    pub fn policy(&self) -> &dyn PermissionPolicy {
        self.policy.as_ref()
    }

    /// Load the survey and require `permission` on it.
    pub async fn survey(
        &self,
        actor: &str,
        permission: Permission,
        survey_id: Uuid,
    ) -> Result<SurveyRecord, DesignError> {
        let survey = self
            .surveys
            .find_survey(survey_id)
            .await?
            .ok_or(DesignError::Repo(RepoError::NotFound))?;
        self.policy.ensure(actor, permission, Some(&survey))?;
        Ok(survey)
    }

    /// Require a permission that is not bound to a survey.
    pub fn global(&self, actor: &str, permission: Permission) -> Result<(), DesignError> {
        self.policy.ensure(actor, permission, None)?;
        Ok(())
    }
}

pub(crate) fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DesignError> {
    if value.trim().is_empty() {
        return Err(DesignError::ConstraintViolation(field));
    }
    Ok(())
}

pub(crate) fn not_found<T>(value: Option<T>) -> Result<T, DesignError> {
    value.ok_or(DesignError::Repo(RepoError::NotFound))
}
