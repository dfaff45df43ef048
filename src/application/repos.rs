//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{
    CursorPage, PageRequest, PaginationError, ResultCursor, SurveyCursor,
};
use crate::domain::answers::StoredAnswer;
use crate::domain::duplicate::SurveyCopyPlan;
use crate::domain::entities::{
    AuditLogRecord, FieldChoiceRecord, FieldRecord, FieldResultRecord, OrdinalScaleRecord,
    PageRecord, SurveyRecord, SurveyResultRecord,
};
use crate::domain::graph::SurveyGraph;
use crate::domain::types::{FieldType, ScaleKind};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateSurveyParams {
    pub name: String,
    pub creator: String,
}

#[async_trait]
pub trait SurveysRepo: Send + Sync {
    /// Surveys created by `creator`, newest first.
    async fn list_surveys(
        &self,
        creator: &str,
        page: PageRequest<SurveyCursor>,
    ) -> Result<CursorPage<SurveyRecord>, RepoError>;

    async fn find_survey(&self, id: Uuid) -> Result<Option<SurveyRecord>, RepoError>;

    /// Survey with every page, field and choice it owns.
    async fn load_graph(&self, survey_id: Uuid) -> Result<Option<SurveyGraph>, RepoError>;
}

#[async_trait]
pub trait SurveysWriteRepo: Send + Sync {
    /// Inserts the survey together with its first page.
    async fn create_survey(&self, params: CreateSurveyParams) -> Result<SurveyRecord, RepoError>;

    async fn rename_survey(&self, id: Uuid, name: &str) -> Result<SurveyRecord, RepoError>;

    /// Sets `published_at` unless it is already set.
    async fn publish_survey(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<SurveyRecord, RepoError>;

    async fn delete_survey(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePageParams {
    pub survey_id: Uuid,
    /// Next free number when `None`.
    pub page_num: Option<i32>,
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePageParams {
    pub id: Uuid,
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    async fn find_page(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError>;

    /// Pages of the survey ordered by `page_num`.
    async fn list_pages(&self, survey_id: Uuid) -> Result<Vec<PageRecord>, RepoError>;
}

#[async_trait]
pub trait PagesWriteRepo: Send + Sync {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError>;

    /// Returns the lowest-numbered page, inserting page 1 when the survey has none.
    async fn ensure_first_page(&self, survey_id: Uuid) -> Result<PageRecord, RepoError>;

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError>;

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError>;

    /// Exchange the page numbers of two pages of the same survey atomically.
    async fn swap_page_numbers(&self, first: Uuid, second: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateFieldParams {
    pub survey_id: Uuid,
    pub page_id: Option<Uuid>,
    pub label: String,
    pub help_text: String,
    pub field_type: FieldType,
    /// Next ordinal among fields sharing the page (or among off-page fields) when `None`.
    pub ordinal: Option<i32>,
    pub maximum_choices: Option<i32>,
    pub required: bool,
    pub expected_answers: i32,
    pub scale_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateFieldParams {
    pub id: Uuid,
    pub page_id: Option<Uuid>,
    pub label: String,
    pub help_text: String,
    pub field_type: FieldType,
    pub ordinal: i32,
    pub maximum_choices: Option<i32>,
    pub required: bool,
    pub expected_answers: i32,
    pub scale_id: Option<Uuid>,
}

#[async_trait]
pub trait FieldsRepo: Send + Sync {
    async fn find_field(&self, id: Uuid) -> Result<Option<FieldRecord>, RepoError>;

    /// Fields of the survey ordered by `(ordinal, id)`.
    async fn list_fields(&self, survey_id: Uuid) -> Result<Vec<FieldRecord>, RepoError>;
}

#[async_trait]
pub trait FieldsWriteRepo: Send + Sync {
    async fn create_field(&self, params: CreateFieldParams) -> Result<FieldRecord, RepoError>;

    async fn update_field(&self, params: UpdateFieldParams) -> Result<FieldRecord, RepoError>;

    async fn delete_field(&self, id: Uuid) -> Result<(), RepoError>;

    async fn swap_ordinals(&self, first: Uuid, second: Uuid) -> Result<(), RepoError>;

    /// Point `tokens` at `canonical_label` in the field's stored mapping and recompute
    /// `mapped_answer` for every result of the field. The mapping is read, changed and
    /// written back in one transaction holding the field row.
    async fn apply_mapping(
        &self,
        field_id: Uuid,
        tokens: &[String],
        canonical_label: &str,
    ) -> Result<MappingUpdate, RepoError>;
}

/// Effect of one mapping application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingUpdate {
    /// Tokens newly pointed at the label.
    pub mapped_tokens: usize,
    pub results_updated: u64,
}

#[derive(Debug, Clone)]
pub struct CreateChoiceParams {
    pub field_id: Uuid,
    pub label: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateChoiceParams {
    pub id: Uuid,
    pub label: String,
    pub target_id: Option<Uuid>,
}

#[async_trait]
pub trait ChoicesRepo: Send + Sync {
    async fn find_choice(&self, id: Uuid) -> Result<Option<FieldChoiceRecord>, RepoError>;

    async fn list_choices(&self, field_id: Uuid) -> Result<Vec<FieldChoiceRecord>, RepoError>;
}

#[async_trait]
pub trait ChoicesWriteRepo: Send + Sync {
    async fn create_choice(
        &self,
        params: CreateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError>;

    async fn update_choice(
        &self,
        params: UpdateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError>;

    async fn delete_choice(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateScaleParams {
    pub name: String,
    pub kind: ScaleKind,
    /// Labels with their scores, in display order.
    pub choices: Vec<(String, i32)>,
}

#[async_trait]
pub trait ScalesRepo: Send + Sync {
    async fn list_scales(&self) -> Result<Vec<OrdinalScaleRecord>, RepoError>;

    async fn find_scale(&self, id: Uuid) -> Result<Option<OrdinalScaleRecord>, RepoError>;
}

#[async_trait]
pub trait ScalesWriteRepo: Send + Sync {
    async fn create_scale(
        &self,
        params: CreateScaleParams,
    ) -> Result<OrdinalScaleRecord, RepoError>;
}

/// One answer to persist for a respondent.
#[derive(Debug, Clone)]
pub struct FieldAnswerParams {
    pub question_id: Uuid,
    pub page_id: Uuid,
    pub stored: StoredAnswer,
}

#[async_trait]
pub trait ResultsRepo: Send + Sync {
    async fn find_result(
        &self,
        survey_id: Uuid,
        respondent: &str,
    ) -> Result<Option<SurveyResultRecord>, RepoError>;

    async fn list_field_results(
        &self,
        result_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError>;

    /// Results of a survey, most recently submitted first.
    async fn list_results(
        &self,
        survey_id: Uuid,
        page: PageRequest<ResultCursor>,
    ) -> Result<CursorPage<SurveyResultRecord>, RepoError>;

    /// Every stored answer to one question.
    async fn list_answers_for_field(
        &self,
        field_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError>;
}

#[async_trait]
pub trait ResultsWriteRepo: Send + Sync {
    /// Get or create the respondent's survey result, then upsert each answer keyed by
    /// `(result, question)`. All answers are written in one transaction.
    async fn save_answers(
        &self,
        survey_id: Uuid,
        respondent: &str,
        answers: Vec<FieldAnswerParams>,
    ) -> Result<Vec<FieldResultRecord>, RepoError>;
}

#[async_trait]
pub trait SurveyCopyRepo: Send + Sync {
    /// Persist a copy plan: rows first, then target links, in a single transaction.
    async fn insert_copy(&self, plan: &SurveyCopyPlan) -> Result<SurveyRecord, RepoError>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;
}
