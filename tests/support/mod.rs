//! In-memory repositories mirroring the Postgres adapter closely enough for service and
//! router tests: cascades, unique keys, upserts and cursor ordering behave the same.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderName;
use serde_json::Value;
use sqlx::Error as SqlxError;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use surveyor::application::completion::TemplateRedirect;
use surveyor::application::design::FieldTypeCatalog;
use surveyor::application::design::choices::CreateChoiceCommand;
use surveyor::application::design::fields::{CreateFieldCommand, FieldDraft, UpdateFieldCommand};
use surveyor::application::design::pages::{CreatePageCommand, UpdatePageCommand};
use surveyor::application::design::surveys::CreateSurveyCommand;
use surveyor::application::flow::FlowStep;
use surveyor::application::pagination::{
    CursorPage, PageRequest, ResultCursor, SurveyCursor,
};
use surveyor::application::repos::{
    AuditRepo, ChoicesRepo, ChoicesWriteRepo, CreateChoiceParams, CreateFieldParams,
    CreatePageParams, CreateScaleParams, CreateSurveyParams, FieldAnswerParams, FieldsRepo,
    FieldsWriteRepo, MappingUpdate, PagesRepo, PagesWriteRepo, RepoError, ResultsRepo,
    ResultsWriteRepo, ScalesRepo, ScalesWriteRepo, SurveyCopyRepo, SurveysRepo,
    SurveysWriteRepo, UpdateChoiceParams, UpdateFieldParams, UpdatePageParams,
};
use surveyor::domain::duplicate::SurveyCopyPlan;
use surveyor::domain::entities::{
    AuditLogRecord, FieldChoiceRecord, FieldRecord, FieldResultRecord, OrdinalChoiceRecord,
    OrdinalScaleRecord, PageRecord, SurveyRecord, SurveyResultRecord,
};
use surveyor::domain::graph::SurveyGraph;
use surveyor::domain::remapping::{AnswerMapping, canonicalize};
use surveyor::domain::types::FieldType;
use surveyor::infra::http::{ApiState, HealthCheck, ServiceOptions};
use surveyor::infra::uploads::UploadStorage;

pub const USER_HEADER: &str = "x-remote-user";

#[derive(Default)]
struct Store {
    clock: i64,
    surveys: Vec<SurveyRecord>,
    pages: Vec<PageRecord>,
    fields: Vec<FieldRecord>,
    choices: Vec<FieldChoiceRecord>,
    scales: Vec<OrdinalScaleRecord>,
    results: Vec<SurveyResultRecord>,
    field_results: Vec<FieldResultRecord>,
    audit: Vec<AuditLogRecord>,
}

impl Store {
    /// Strictly increasing timestamps so ordering by time is deterministic.
    fn now(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::milliseconds(self.clock)
    }

    fn touch_survey(&mut self, survey_id: Uuid) {
        let now = self.now();
        if let Some(survey) = self.surveys.iter_mut().find(|s| s.id == survey_id) {
            survey.updated_at = now;
        }
    }

    fn next_page_num(&self, survey_id: Uuid) -> i32 {
        self.pages
            .iter()
            .filter(|p| p.survey_id == survey_id)
            .map(|p| p.page_num)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn next_ordinal(&self, survey_id: Uuid, page_id: Option<Uuid>) -> i32 {
        self.fields
            .iter()
            .filter(|f| f.survey_id == survey_id && f.page_id == page_id)
            .map(|f| f.ordinal)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn insert_page(
        &mut self,
        survey_id: Uuid,
        page_num: i32,
        subtitle: String,
        target_id: Option<Uuid>,
    ) -> Result<PageRecord, RepoError> {
        if !self.surveys.iter().any(|s| s.id == survey_id) {
            return Err(RepoError::Integrity {
                message: "survey does not exist".to_string(),
            });
        }
        if self
            .pages
            .iter()
            .any(|p| p.survey_id == survey_id && p.page_num == page_num)
        {
            return Err(RepoError::Duplicate {
                constraint: "survey_pages_survey_page_num_key".to_string(),
            });
        }
        let page = PageRecord {
            id: Uuid::new_v4(),
            survey_id,
            page_num,
            subtitle,
            target_id,
            created_at: self.now(),
        };
        self.pages.push(page.clone());
        Ok(page)
    }

    fn remove_field_cascade(&mut self, field_ids: &[Uuid]) {
        self.fields.retain(|f| !field_ids.contains(&f.id));
        self.choices.retain(|c| !field_ids.contains(&c.field_id));
        for choice in &mut self.choices {
            if choice.target_id.is_some_and(|t| field_ids.contains(&t)) {
                choice.target_id = None;
            }
        }
        self.field_results
            .retain(|r| !field_ids.contains(&r.question_id));
    }

    fn remove_page_cascade(&mut self, page_ids: &[Uuid]) {
        self.pages.retain(|p| !page_ids.contains(&p.id));
        for page in &mut self.pages {
            if page.target_id.is_some_and(|t| page_ids.contains(&t)) {
                page.target_id = None;
            }
        }
        let fields: Vec<Uuid> = self
            .fields
            .iter()
            .filter(|f| f.page_id.is_some_and(|p| page_ids.contains(&p)))
            .map(|f| f.id)
            .collect();
        self.remove_field_cascade(&fields);
        self.field_results.retain(|r| !page_ids.contains(&r.page_id));
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    store: Arc<Mutex<Store>>,
}

impl InMemoryRepositories {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn audit_actions(&self) -> Vec<String> {
        self.store
            .lock()
            .await
            .audit
            .iter()
            .map(|entry| entry.action.clone())
            .collect()
    }

    pub async fn all_surveys(&self) -> Vec<SurveyRecord> {
        self.store.lock().await.surveys.clone()
    }

    pub async fn field_results(&self) -> Vec<FieldResultRecord> {
        self.store.lock().await.field_results.clone()
    }

    pub async fn survey_results(&self) -> Vec<SurveyResultRecord> {
        self.store.lock().await.results.clone()
    }
}

#[async_trait]
impl SurveysRepo for InMemoryRepositories {
    async fn list_surveys(
        &self,
        creator: &str,
        page: PageRequest<SurveyCursor>,
    ) -> Result<CursorPage<SurveyRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut items: Vec<SurveyRecord> = store
            .surveys
            .iter()
            .filter(|s| s.creator == creator)
            .filter(|s| match page.cursor {
                Some(cursor) => (s.created_at, s.id) < (cursor.created_at(), cursor.id()),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let limit = page.limit.clamp(1, 200) as usize;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items
                .last()
                .map(|last| SurveyCursor::new(last.created_at, last.id).encode())
        } else {
            None
        };
        Ok(CursorPage::new(items, next_cursor))
    }

    async fn find_survey(&self, id: Uuid) -> Result<Option<SurveyRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.surveys.iter().find(|s| s.id == id).cloned())
    }

    async fn load_graph(&self, survey_id: Uuid) -> Result<Option<SurveyGraph>, RepoError> {
        let store = self.store.lock().await;
        let Some(survey) = store.surveys.iter().find(|s| s.id == survey_id).cloned() else {
            return Ok(None);
        };
        let pages = store
            .pages
            .iter()
            .filter(|p| p.survey_id == survey_id)
            .cloned()
            .collect();
        let fields: Vec<FieldRecord> = store
            .fields
            .iter()
            .filter(|f| f.survey_id == survey_id)
            .cloned()
            .collect();
        let choices = store
            .choices
            .iter()
            .filter(|c| fields.iter().any(|f| f.id == c.field_id))
            .cloned()
            .collect();
        Ok(Some(SurveyGraph::new(survey, pages, fields, choices)))
    }
}

#[async_trait]
impl SurveysWriteRepo for InMemoryRepositories {
    async fn create_survey(&self, params: CreateSurveyParams) -> Result<SurveyRecord, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let survey = SurveyRecord {
            id: Uuid::new_v4(),
            name: params.name,
            creator: params.creator,
            created_at: now,
            updated_at: now,
            published_at: None,
        };
        store.surveys.push(survey.clone());
        store.insert_page(survey.id, 1, String::new(), None)?;
        Ok(survey)
    }

    async fn rename_survey(&self, id: Uuid, name: &str) -> Result<SurveyRecord, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let survey = store
            .surveys
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepoError::NotFound)?;
        survey.name = name.to_string();
        survey.updated_at = now;
        Ok(survey.clone())
    }

    async fn publish_survey(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<SurveyRecord, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let survey = store
            .surveys
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepoError::NotFound)?;
        if survey.published_at.is_none() {
            survey.published_at = Some(at);
        }
        survey.updated_at = now;
        Ok(survey.clone())
    }

    async fn delete_survey(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        if !store.surveys.iter().any(|s| s.id == id) {
            return Err(RepoError::NotFound);
        }
        store.surveys.retain(|s| s.id != id);
        let pages: Vec<Uuid> = store
            .pages
            .iter()
            .filter(|p| p.survey_id == id)
            .map(|p| p.id)
            .collect();
        store.remove_page_cascade(&pages);
        let fields: Vec<Uuid> = store
            .fields
            .iter()
            .filter(|f| f.survey_id == id)
            .map(|f| f.id)
            .collect();
        store.remove_field_cascade(&fields);
        store.results.retain(|r| r.survey_id != id);
        store.field_results.retain(|r| r.survey_id != id);
        Ok(())
    }
}

#[async_trait]
impl PagesRepo for InMemoryRepositories {
    async fn find_page(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.pages.iter().find(|p| p.id == id).cloned())
    }

    async fn list_pages(&self, survey_id: Uuid) -> Result<Vec<PageRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut pages: Vec<PageRecord> = store
            .pages
            .iter()
            .filter(|p| p.survey_id == survey_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_num);
        Ok(pages)
    }
}

#[async_trait]
impl PagesWriteRepo for InMemoryRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let mut store = self.store.lock().await;
        let page_num = params
            .page_num
            .unwrap_or_else(|| store.next_page_num(params.survey_id));
        let page = store.insert_page(
            params.survey_id,
            page_num,
            params.subtitle,
            params.target_id,
        )?;
        store.touch_survey(params.survey_id);
        Ok(page)
    }

    async fn ensure_first_page(&self, survey_id: Uuid) -> Result<PageRecord, RepoError> {
        let mut store = self.store.lock().await;
        let existing = store
            .pages
            .iter()
            .filter(|p| p.survey_id == survey_id)
            .min_by_key(|p| p.page_num)
            .cloned();
        match existing {
            Some(page) => Ok(page),
            None => store.insert_page(survey_id, 1, String::new(), None),
        }
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let mut store = self.store.lock().await;
        let page = store
            .pages
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;
        page.subtitle = params.subtitle;
        page.target_id = params.target_id;
        let page = page.clone();
        store.touch_survey(page.survey_id);
        Ok(page)
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        let survey_id = store
            .pages
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.survey_id)
            .ok_or(RepoError::NotFound)?;
        store.remove_page_cascade(&[id]);
        store.touch_survey(survey_id);
        Ok(())
    }

    async fn swap_page_numbers(&self, first: Uuid, second: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        let a = store.pages.iter().position(|p| p.id == first);
        let b = store.pages.iter().position(|p| p.id == second);
        let (Some(a), Some(b)) = (a, b) else {
            return Err(RepoError::NotFound);
        };
        if store.pages[a].survey_id != store.pages[b].survey_id {
            return Err(RepoError::NotFound);
        }
        let num_a = store.pages[a].page_num;
        store.pages[a].page_num = store.pages[b].page_num;
        store.pages[b].page_num = num_a;
        let survey_id = store.pages[a].survey_id;
        store.touch_survey(survey_id);
        Ok(())
    }
}

#[async_trait]
impl FieldsRepo for InMemoryRepositories {
    async fn find_field(&self, id: Uuid) -> Result<Option<FieldRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.fields.iter().find(|f| f.id == id).cloned())
    }

    async fn list_fields(&self, survey_id: Uuid) -> Result<Vec<FieldRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut fields: Vec<FieldRecord> = store
            .fields
            .iter()
            .filter(|f| f.survey_id == survey_id)
            .cloned()
            .collect();
        fields.sort_by_key(|f| (f.ordinal, f.id));
        Ok(fields)
    }
}

#[async_trait]
impl FieldsWriteRepo for InMemoryRepositories {
    async fn create_field(&self, params: CreateFieldParams) -> Result<FieldRecord, RepoError> {
        let mut store = self.store.lock().await;
        let ordinal = params
            .ordinal
            .unwrap_or_else(|| store.next_ordinal(params.survey_id, params.page_id));
        let now = store.now();
        let field = FieldRecord {
            id: Uuid::new_v4(),
            survey_id: params.survey_id,
            page_id: params.page_id,
            label: params.label,
            help_text: params.help_text,
            field_type: params.field_type,
            ordinal,
            maximum_choices: params.maximum_choices,
            required: params.required,
            expected_answers: params.expected_answers,
            scale_id: params.scale_id,
            mapping: AnswerMapping::default(),
            created_at: now,
            updated_at: now,
        };
        store.fields.push(field.clone());
        store.touch_survey(params.survey_id);
        Ok(field)
    }

    async fn update_field(&self, params: UpdateFieldParams) -> Result<FieldRecord, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let field = store
            .fields
            .iter_mut()
            .find(|f| f.id == params.id)
            .ok_or(RepoError::NotFound)?;
        field.page_id = params.page_id;
        field.label = params.label;
        field.help_text = params.help_text;
        field.field_type = params.field_type;
        field.ordinal = params.ordinal;
        field.maximum_choices = params.maximum_choices;
        field.required = params.required;
        field.expected_answers = params.expected_answers;
        field.scale_id = params.scale_id;
        field.updated_at = now;
        let field = field.clone();
        store.touch_survey(field.survey_id);
        Ok(field)
    }

    async fn delete_field(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        let survey_id = store
            .fields
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.survey_id)
            .ok_or(RepoError::NotFound)?;
        store.remove_field_cascade(&[id]);
        store.touch_survey(survey_id);
        Ok(())
    }

    async fn swap_ordinals(&self, first: Uuid, second: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        let a = store.fields.iter().position(|f| f.id == first);
        let b = store.fields.iter().position(|f| f.id == second);
        let (Some(a), Some(b)) = (a, b) else {
            return Err(RepoError::NotFound);
        };
        let ordinal_a = store.fields[a].ordinal;
        store.fields[a].ordinal = store.fields[b].ordinal;
        store.fields[b].ordinal = ordinal_a;
        let survey_id = store.fields[a].survey_id;
        store.touch_survey(survey_id);
        Ok(())
    }

    async fn apply_mapping(
        &self,
        field_id: Uuid,
        tokens: &[String],
        canonical_label: &str,
    ) -> Result<MappingUpdate, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let field = store
            .fields
            .iter_mut()
            .find(|f| f.id == field_id)
            .ok_or(RepoError::NotFound)?;
        let mapped_tokens = field.mapping.reassign(tokens, canonical_label);
        field.updated_at = now;
        let mapping = field.mapping.clone();

        let mut updated = 0;
        for result in store
            .field_results
            .iter_mut()
            .filter(|r| r.question_id == field_id)
        {
            result.mapped_answer = result
                .answer
                .get("answer")
                .and_then(|value| canonicalize(value, &mapping));
            result.updated_at = now;
            updated += 1;
        }
        Ok(MappingUpdate {
            mapped_tokens,
            results_updated: updated,
        })
    }
}

#[async_trait]
impl ChoicesRepo for InMemoryRepositories {
    async fn find_choice(&self, id: Uuid) -> Result<Option<FieldChoiceRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.choices.iter().find(|c| c.id == id).cloned())
    }

    async fn list_choices(&self, field_id: Uuid) -> Result<Vec<FieldChoiceRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut choices: Vec<FieldChoiceRecord> = store
            .choices
            .iter()
            .filter(|c| c.field_id == field_id)
            .cloned()
            .collect();
        choices.sort_by_key(|c| (c.created_at, c.id));
        Ok(choices)
    }
}

#[async_trait]
impl ChoicesWriteRepo for InMemoryRepositories {
    async fn create_choice(
        &self,
        params: CreateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError> {
        let mut store = self.store.lock().await;
        let survey_id = store
            .fields
            .iter()
            .find(|f| f.id == params.field_id)
            .map(|f| f.survey_id)
            .ok_or(RepoError::NotFound)?;
        let choice = FieldChoiceRecord {
            id: Uuid::new_v4(),
            field_id: params.field_id,
            label: params.label,
            target_id: params.target_id,
            created_at: store.now(),
        };
        store.choices.push(choice.clone());
        store.touch_survey(survey_id);
        Ok(choice)
    }

    async fn update_choice(
        &self,
        params: UpdateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError> {
        let mut store = self.store.lock().await;
        let choice = store
            .choices
            .iter_mut()
            .find(|c| c.id == params.id)
            .ok_or(RepoError::NotFound)?;
        choice.label = params.label;
        choice.target_id = params.target_id;
        Ok(choice.clone())
    }

    async fn delete_choice(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        if !store.choices.iter().any(|c| c.id == id) {
            return Err(RepoError::NotFound);
        }
        store.choices.retain(|c| c.id != id);
        Ok(())
    }
}

#[async_trait]
impl ScalesRepo for InMemoryRepositories {
    async fn list_scales(&self) -> Result<Vec<OrdinalScaleRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.scales.clone())
    }

    async fn find_scale(&self, id: Uuid) -> Result<Option<OrdinalScaleRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.scales.iter().find(|s| s.id == id).cloned())
    }
}

#[async_trait]
impl ScalesWriteRepo for InMemoryRepositories {
    async fn create_scale(
        &self,
        params: CreateScaleParams,
    ) -> Result<OrdinalScaleRecord, RepoError> {
        let mut store = self.store.lock().await;
        let id = Uuid::new_v4();
        let mut choices: Vec<OrdinalChoiceRecord> = params
            .choices
            .into_iter()
            .map(|(label, score)| OrdinalChoiceRecord {
                id: Uuid::new_v4(),
                scale_id: id,
                label,
                score,
            })
            .collect();
        choices.sort_by_key(|c| c.score);
        let scale = OrdinalScaleRecord {
            id,
            name: params.name,
            kind: params.kind,
            created_at: store.now(),
            choices,
        };
        store.scales.push(scale.clone());
        Ok(scale)
    }
}

#[async_trait]
impl ResultsRepo for InMemoryRepositories {
    async fn find_result(
        &self,
        survey_id: Uuid,
        respondent: &str,
    ) -> Result<Option<SurveyResultRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store
            .results
            .iter()
            .find(|r| r.survey_id == survey_id && r.respondent == respondent)
            .cloned())
    }

    async fn list_field_results(
        &self,
        result_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store
            .field_results
            .iter()
            .filter(|r| r.result_id == result_id)
            .cloned()
            .collect())
    }

    async fn list_results(
        &self,
        survey_id: Uuid,
        page: PageRequest<ResultCursor>,
    ) -> Result<CursorPage<SurveyResultRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut items: Vec<SurveyResultRecord> = store
            .results
            .iter()
            .filter(|r| r.survey_id == survey_id)
            .filter(|r| match page.cursor {
                Some(cursor) => {
                    (r.date_submitted, r.id) < (cursor.date_submitted(), cursor.id())
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.date_submitted, b.id).cmp(&(a.date_submitted, a.id)));

        let limit = page.limit.clamp(1, 200) as usize;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items
                .last()
                .map(|last| ResultCursor::new(last.date_submitted, last.id).encode())
        } else {
            None
        };
        Ok(CursorPage::new(items, next_cursor))
    }

    async fn list_answers_for_field(
        &self,
        field_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store
            .field_results
            .iter()
            .filter(|r| r.question_id == field_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultsWriteRepo for InMemoryRepositories {
    async fn save_answers(
        &self,
        survey_id: Uuid,
        respondent: &str,
        answers: Vec<FieldAnswerParams>,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let mut store = self.store.lock().await;
        let now = store.now();
        let result_id = match store
            .results
            .iter_mut()
            .find(|r| r.survey_id == survey_id && r.respondent == respondent)
        {
            Some(existing) => {
                existing.updated_at = now;
                existing.id
            }
            None => {
                let record = SurveyResultRecord {
                    id: Uuid::new_v4(),
                    survey_id,
                    respondent: respondent.to_string(),
                    date_submitted: now,
                    updated_at: now,
                };
                let id = record.id;
                store.results.push(record);
                id
            }
        };

        let mut saved = Vec::with_capacity(answers.len());
        for answer in answers {
            let existing = store
                .field_results
                .iter_mut()
                .find(|r| r.result_id == result_id && r.question_id == answer.question_id);
            let record = match existing {
                Some(row) => {
                    row.page_id = answer.page_id;
                    row.answer = answer.stored.answer;
                    row.upload = answer.stored.upload;
                    row.mapped_answer = answer.stored.mapped_answer;
                    row.updated_at = now;
                    row.clone()
                }
                None => {
                    let row = FieldResultRecord {
                        id: Uuid::new_v4(),
                        survey_id,
                        page_id: answer.page_id,
                        result_id,
                        question_id: answer.question_id,
                        answer: answer.stored.answer,
                        upload: answer.stored.upload,
                        mapped_answer: answer.stored.mapped_answer,
                        created_at: now,
                        updated_at: now,
                    };
                    store.field_results.push(row.clone());
                    row
                }
            };
            saved.push(record);
        }
        Ok(saved)
    }
}

#[async_trait]
impl SurveyCopyRepo for InMemoryRepositories {
    async fn insert_copy(&self, plan: &SurveyCopyPlan) -> Result<SurveyRecord, RepoError> {
        let mut store = self.store.lock().await;
        store.surveys.push(plan.survey.clone());
        store.pages.extend(plan.pages.iter().cloned());
        store.fields.extend(plan.fields.iter().cloned());
        store.choices.extend(plan.choices.iter().cloned());
        for link in &plan.page_targets {
            let page = store
                .pages
                .iter_mut()
                .find(|p| p.id == link.source)
                .ok_or(RepoError::NotFound)?;
            page.target_id = Some(link.target);
        }
        for link in &plan.choice_targets {
            let choice = store
                .choices
                .iter_mut()
                .find(|c| c.id == link.source)
                .ok_or(RepoError::NotFound)?;
            choice.target_id = Some(link.target);
        }
        Ok(plan.survey.clone())
    }
}

#[async_trait]
impl AuditRepo for InMemoryRepositories {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.store.lock().await.audit.push(record);
        Ok(())
    }
}

/// Health probe that always reports the store as reachable.
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn check(&self) -> Result<(), SqlxError> {
        Ok(())
    }
}

/// Health probe reporting the store as unreachable.
pub struct Unhealthy;

#[async_trait]
impl HealthCheck for Unhealthy {
    async fn check(&self) -> Result<(), SqlxError> {
        Err(SqlxError::PoolTimedOut)
    }
}

pub fn build_state(
    repositories: Arc<InMemoryRepositories>,
    uploads_root: std::path::PathBuf,
    health: Arc<dyn HealthCheck>,
) -> ApiState {
    let upload_storage =
        UploadStorage::new(uploads_root).expect("upload root should be creatable");
    ApiState::assemble(
        repositories,
        health,
        Arc::new(upload_storage),
        ServiceOptions {
            user_header: HeaderName::from_static(USER_HEADER),
            field_types: FieldTypeCatalog::all(),
            completion: TemplateRedirect::new("/surveys/{survey_id}/complete"),
        },
    )
}

/// Extracts the stored `answer` value of a field result.
pub fn stored_answer(record: &FieldResultRecord) -> Option<&Value> {
    record.answer.get("answer")
}

// ----- Design helpers -----

pub const DESIGNER: &str = "alice";
pub const RESPONDENT: &str = "bob";

pub fn draft(label: &str, field_type: FieldType) -> FieldDraft {
    FieldDraft {
        label: label.to_string(),
        help_text: String::new(),
        field_type,
        maximum_choices: None,
        required: false,
        expected_answers: None,
        scale_id: None,
    }
}

pub fn required(label: &str, field_type: FieldType) -> FieldDraft {
    FieldDraft {
        required: true,
        ..draft(label, field_type)
    }
}

fn draft_of(field: &FieldRecord) -> FieldDraft {
    FieldDraft {
        label: field.label.clone(),
        help_text: field.help_text.clone(),
        field_type: field.field_type,
        maximum_choices: field.maximum_choices,
        required: field.required,
        expected_answers: Some(field.expected_answers),
        scale_id: field.scale_id,
    }
}

/// Creates a survey owned by [`DESIGNER`] and returns it with its automatic first page.
pub async fn new_survey(state: &ApiState, name: &str) -> (SurveyRecord, PageRecord) {
    let survey = state
        .surveys
        .create(
            DESIGNER,
            CreateSurveyCommand {
                name: name.to_string(),
            },
        )
        .await
        .expect("create survey");
    let graph = state
        .surveys
        .detail(DESIGNER, survey.id)
        .await
        .expect("load survey");
    let first = graph.first_page().cloned().expect("first page");
    (survey, first)
}

pub async fn add_page(state: &ApiState, survey_id: Uuid) -> PageRecord {
    state
        .pages
        .create(
            DESIGNER,
            CreatePageCommand {
                survey_id,
                page_num: None,
                subtitle: String::new(),
                target_id: None,
            },
        )
        .await
        .expect("create page")
}

pub async fn set_page_target(state: &ApiState, page: &PageRecord, target: Option<Uuid>) {
    state
        .pages
        .update(
            DESIGNER,
            UpdatePageCommand {
                id: page.id,
                subtitle: page.subtitle.clone(),
                target_id: target,
            },
        )
        .await
        .expect("update page target");
}

pub async fn add_field(
    state: &ApiState,
    survey_id: Uuid,
    page_id: Option<Uuid>,
    draft: FieldDraft,
) -> FieldRecord {
    state
        .fields
        .create(
            DESIGNER,
            CreateFieldCommand {
                survey_id,
                page_id,
                ordinal: None,
                draft,
            },
        )
        .await
        .expect("create field")
}

/// Moves a field onto `page_id` (or off-page) keeping its other settings.
pub async fn place_field(state: &ApiState, field: &FieldRecord, page_id: Option<Uuid>) -> FieldRecord {
    state
        .fields
        .update(
            DESIGNER,
            UpdateFieldCommand {
                id: field.id,
                page_id,
                draft: draft_of(field),
            },
        )
        .await
        .expect("move field")
}

pub async fn add_choice(
    state: &ApiState,
    field_id: Uuid,
    label: &str,
    target_id: Option<Uuid>,
) -> FieldChoiceRecord {
    state
        .choices
        .create(
            DESIGNER,
            CreateChoiceCommand {
                field_id,
                label: label.to_string(),
                target_id,
            },
        )
        .await
        .expect("create choice")
}

pub async fn publish(state: &ApiState, survey_id: Uuid) -> SurveyRecord {
    state
        .surveys
        .publish(DESIGNER, survey_id)
        .await
        .expect("publish survey")
}

/// Page the step asks the respondent to fill in, or `None` once complete.
pub fn step_page(step: &FlowStep) -> Option<Uuid> {
    match step {
        FlowStep::Page(run) => Some(run.page.id),
        FlowStep::Complete { .. } => None,
    }
}

/// Service state over fresh in-memory repositories with a scratch upload directory.
pub struct Harness {
    pub state: ApiState,
    pub repos: Arc<InMemoryRepositories>,
    pub uploads: tempfile::TempDir,
}

pub fn harness() -> Harness {
    let repos = InMemoryRepositories::new();
    let uploads = tempfile::tempdir().expect("create upload dir");
    let state = build_state(
        repos.clone(),
        uploads.path().join("uploads"),
        Arc::new(AlwaysHealthy),
    );
    Harness {
        state,
        repos,
        uploads,
    }
}
