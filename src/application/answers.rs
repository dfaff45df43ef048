//! Answer capture: single-field upserts, whole-page submissions and upload answers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::flow::{FlowError, FlowService, FlowStep, RunContext};
use crate::application::permissions::PermissionDenied;
use crate::application::repos::{
    FieldAnswerParams, RepoError, ResultsWriteRepo, ScalesRepo,
};
use crate::domain::answers::{AnswerError, StoredAnswer, clean};
use crate::domain::entities::{FieldRecord, FieldResultRecord};
use crate::domain::flow::RespondentProgress;
use crate::domain::types::AnswerShape;

const METRIC_ANSWERS_SAVED: &str = "surveyor_answers_saved_total";

#[derive(Debug, Error)]
pub enum AnswerServiceError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("answer for `{field_id}` rejected: {source}")]
    Invalid {
        field_id: Uuid,
        #[source]
        source: AnswerError,
    },
    #[error("{} answers rejected", errors.len())]
    InvalidPage { errors: BTreeMap<Uuid, String> },
    #[error("survey `{0}` is not published")]
    NotPublished(Uuid),
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FlowError> for AnswerServiceError {
    fn from(error: FlowError) -> Self {
        match error {
            FlowError::NotPublished(id) => Self::NotPublished(id),
            FlowError::Forbidden(denied) => Self::Forbidden(denied),
            FlowError::Repo(err) => Self::Repo(err),
        }
    }
}

/// Outcome of a page submission: the stored answers and where to go next.
#[derive(Debug, Clone)]
pub struct PageSubmission {
    pub saved: Vec<FieldResultRecord>,
    pub next: FlowStep,
}

#[derive(Clone)]
pub struct AnswerService {
    flow: FlowService,
    results: Arc<dyn ResultsWriteRepo>,
    scales: Arc<dyn ScalesRepo>,
}

impl AnswerService {
    pub fn new(
        flow: FlowService,
        results: Arc<dyn ResultsWriteRepo>,
        scales: Arc<dyn ScalesRepo>,
    ) -> Self {
        Self {
            flow,
            results,
            scales,
        }
    }

    /// Choice ids an answer to `field` may reference.
    async fn allowed_choices(
        &self,
        context: &RunContext,
        field: &FieldRecord,
    ) -> Result<HashSet<Uuid>, AnswerServiceError> {
        if field.field_type.uses_scale() {
            let Some(scale_id) = field.scale_id else {
                return Ok(HashSet::new());
            };
            let scale = self.scales.find_scale(scale_id).await?;
            return Ok(scale
                .map(|scale| scale.choices.iter().map(|choice| choice.id).collect())
                .unwrap_or_default());
        }
        Ok(context
            .graph
            .choices_for(field.id)
            .map(|choice| choice.id)
            .collect())
    }

    /// Page recorded for an answer: the field's own page, or the page it was
    /// revealed on for off-page fields.
    fn result_page(
        context: &RunContext,
        field: &FieldRecord,
        visited_page: Option<Uuid>,
    ) -> Result<Uuid, AnswerServiceError> {
        if let Some(page_id) = field.page_id {
            return Ok(page_id);
        }
        visited_page
            .filter(|page_id| context.graph.page(*page_id).is_some())
            .ok_or(AnswerServiceError::ConstraintViolation("page_id"))
    }

    async fn persist(
        &self,
        survey_id: Uuid,
        respondent: &str,
        answers: Vec<FieldAnswerParams>,
    ) -> Result<Vec<FieldResultRecord>, AnswerServiceError> {
        if answers.is_empty() {
            return Ok(Vec::new());
        }
        let count = answers.len() as u64;
        let saved = self
            .results
            .save_answers(survey_id, respondent, answers)
            .await?;
        counter!(METRIC_ANSWERS_SAVED).increment(count);
        debug!(
            target = "surveyor::answers",
            survey_id = %survey_id,
            saved = count,
            "answers stored"
        );
        Ok(saved)
    }

    /// Validate and upsert one answer for `respondent`.
    pub async fn save_result(
        &self,
        respondent: &str,
        survey_id: Uuid,
        field_id: Uuid,
        raw: Value,
        visited_page: Option<Uuid>,
    ) -> Result<FieldResultRecord, AnswerServiceError> {
        let context = self.flow.context(respondent, survey_id).await?;
        let field = context
            .graph
            .field(field_id)
            .ok_or(RepoError::NotFound)?
            .clone();
        if field.field_type.answer_shape() == AnswerShape::Upload {
            return Err(AnswerServiceError::ConstraintViolation("field_type"));
        }

        let page_id = Self::result_page(&context, &field, visited_page)?;
        let allowed = self.allowed_choices(&context, &field).await?;
        let cleaned = clean(&field, &allowed, &raw).map_err(|source| {
            AnswerServiceError::Invalid {
                field_id: field.id,
                source,
            }
        })?;

        let saved = self
            .persist(
                survey_id,
                respondent,
                vec![FieldAnswerParams {
                    question_id: field.id,
                    page_id,
                    stored: StoredAnswer::for_field(&field, cleaned),
                }],
            )
            .await?;
        saved
            .into_iter()
            .next()
            .ok_or(AnswerServiceError::Repo(RepoError::NotFound))
    }

    /// Record a stored upload as the answer to a media field.
    pub async fn save_upload(
        &self,
        respondent: &str,
        survey_id: Uuid,
        field_id: Uuid,
        stored_path: &str,
        visited_page: Option<Uuid>,
    ) -> Result<FieldResultRecord, AnswerServiceError> {
        let context = self.flow.context(respondent, survey_id).await?;
        let field = context
            .graph
            .field(field_id)
            .ok_or(RepoError::NotFound)?
            .clone();
        if field.field_type.answer_shape() != AnswerShape::Upload {
            return Err(AnswerServiceError::ConstraintViolation("field_type"));
        }
        let page_id = Self::result_page(&context, &field, visited_page)?;

        let saved = self
            .persist(
                survey_id,
                respondent,
                vec![FieldAnswerParams {
                    question_id: field.id,
                    page_id,
                    stored: StoredAnswer::for_field(&field, Value::String(stored_path.to_string())),
                }],
            )
            .await?;
        saved
            .into_iter()
            .next()
            .ok_or(AnswerServiceError::Repo(RepoError::NotFound))
    }

    /// Validate every field shown on `page_id` and store the answers only if all are valid.
    ///
    /// Off-page fields count as shown when the submission selects the choice revealing
    /// them. Upload fields keep whatever was uploaded before; they are answered through
    /// [`AnswerService::save_upload`].
    pub async fn submit_page(
        &self,
        respondent: &str,
        survey_id: Uuid,
        page_id: Uuid,
        submitted: HashMap<Uuid, Value>,
    ) -> Result<PageSubmission, AnswerServiceError> {
        let context = self.flow.context(respondent, survey_id).await?;
        let graph = &context.graph;
        if graph.page(page_id).is_none() {
            return Err(AnswerServiceError::Repo(RepoError::NotFound));
        }

        let mut errors = BTreeMap::new();
        let mut answers = Vec::new();
        let mut selections = RespondentProgress::new();

        let on_page: Vec<FieldRecord> = graph.fields_on_page(page_id).cloned().collect();
        for field in &on_page {
            match self.clean_submitted(&context, field, &submitted).await? {
                Ok(cleaned) => {
                    selections.record(page_id, field.id, cleaned.clone());
                    answers.push(FieldAnswerParams {
                        question_id: field.id,
                        page_id,
                        stored: StoredAnswer::for_field(field, cleaned),
                    });
                }
                Err(err) => {
                    errors.insert(field.id, err.to_string());
                }
            }
        }

        let revealed: Vec<(Uuid, FieldRecord)> = graph
            .revealed_fields(page_id)
            .map(|(choice, hidden)| (choice.id, hidden.clone()))
            .collect();
        let mut seen = HashSet::new();
        for (choice_id, hidden) in &revealed {
            let revealing = graph
                .choice(*choice_id)
                .and_then(|choice| graph.field(choice.field_id));
            let shown = revealing.is_some_and(|field| selections.selected(field, *choice_id));
            if !shown || !seen.insert(hidden.id) {
                continue;
            }
            match self.clean_submitted(&context, hidden, &submitted).await? {
                Ok(cleaned) => answers.push(FieldAnswerParams {
                    question_id: hidden.id,
                    page_id,
                    stored: StoredAnswer::for_field(hidden, cleaned),
                }),
                Err(err) => {
                    errors.insert(hidden.id, err.to_string());
                }
            }
        }

        if !errors.is_empty() {
            return Err(AnswerServiceError::InvalidPage { errors });
        }

        let saved = self.persist(survey_id, respondent, answers).await?;
        let refreshed = self.flow.context(respondent, survey_id).await?;
        let next = self.flow.step(&refreshed).await?;
        Ok(PageSubmission { saved, next })
    }

    async fn clean_submitted(
        &self,
        context: &RunContext,
        field: &FieldRecord,
        submitted: &HashMap<Uuid, Value>,
    ) -> Result<Result<Value, AnswerError>, AnswerServiceError> {
        let raw = if field.field_type.answer_shape() == AnswerShape::Upload {
            context
                .result_for(field.id)
                .map(|result| Value::String(result.upload.clone()))
                .unwrap_or(Value::Null)
        } else {
            submitted.get(&field.id).cloned().unwrap_or(Value::Null)
        };
        let allowed = self.allowed_choices(context, field).await?;
        Ok(clean(field, &allowed, &raw))
    }
}
