use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::application::answers::PageSubmission;
use crate::application::design::fields::{FieldDetail, FieldDraft};
use crate::application::design::pages::PageDetail;
use crate::application::flow::{FlowStep, RunField};
use crate::application::remap::{MappingOutcome, RemapOverview};
use crate::application::results::{AnswerView, ResultView};
use crate::domain::entities::{
    FieldChoiceRecord, FieldRecord, FieldResultRecord, OrdinalScaleRecord, PageRecord,
    SurveyRecord, SurveyResultRecord,
};
use crate::domain::graph::SurveyGraph;
use crate::domain::types::{AnswerShape, FieldType, ScaleKind, WidgetKind};

// ----- Requests -----

#[derive(Debug, Deserialize, Serialize)]
pub struct SurveyCreateRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SurveyRenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PageCreateRequest {
    pub page_num: Option<i32>,
    #[serde(default)]
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PageUpdateRequest {
    #[serde(default)]
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FieldRequest {
    pub label: String,
    #[serde(default)]
    pub help_text: String,
    pub field_type: FieldType,
    pub maximum_choices: Option<i32>,
    #[serde(default)]
    pub required: bool,
    pub expected_answers: Option<i32>,
    pub scale_id: Option<Uuid>,
}

impl From<FieldRequest> for FieldDraft {
    fn from(request: FieldRequest) -> Self {
        Self {
            label: request.label,
            help_text: request.help_text,
            field_type: request.field_type,
            maximum_choices: request.maximum_choices,
            required: request.required,
            expected_answers: request.expected_answers,
            scale_id: request.scale_id,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FieldCreateRequest {
    pub ordinal: Option<i32>,
    #[serde(flatten)]
    pub field: FieldRequest,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FieldUpdateRequest {
    /// Page the field lives on; omitted or null moves it off-page.
    pub page_id: Option<Uuid>,
    #[serde(flatten)]
    pub field: FieldRequest,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChoiceRequest {
    pub label: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScaleCreateRequest {
    pub name: String,
    pub kind: ScaleKind,
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RemapApplyRequest {
    pub tokens: Vec<String>,
    pub canonical_label: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PageSubmitRequest {
    pub page_id: Uuid,
    #[serde(default)]
    pub answers: HashMap<Uuid, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AnswerRequest {
    pub answer: Value,
    /// Page the respondent was on; needed for off-page fields.
    pub page_id: Option<Uuid>,
}

// ----- Responses -----

#[derive(Debug, Serialize)]
pub struct SurveyDetailResponse {
    pub survey: SurveyRecord,
    pub pages: Vec<PageRecord>,
    pub fields: Vec<FieldRecord>,
    pub choices: Vec<FieldChoiceRecord>,
}

impl From<SurveyGraph> for SurveyDetailResponse {
    fn from(graph: SurveyGraph) -> Self {
        Self {
            survey: graph.survey().clone(),
            pages: graph.pages().to_vec(),
            fields: graph.fields().to_vec(),
            choices: graph.choices().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageDetailResponse {
    pub page: PageRecord,
    pub fields: Vec<FieldRecord>,
}

impl From<PageDetail> for PageDetailResponse {
    fn from(detail: PageDetail) -> Self {
        Self {
            page: detail.page,
            fields: detail.fields,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldDetailResponse {
    pub field: FieldRecord,
    pub choices: Vec<FieldChoiceRecord>,
}

impl From<FieldDetail> for FieldDetailResponse {
    fn from(detail: FieldDetail) -> Self {
        Self {
            field: detail.field,
            choices: detail.choices,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldTypeResponse {
    pub field_type: FieldType,
    pub label: &'static str,
    pub widget: WidgetKind,
    pub answer_shape: AnswerShape,
    pub needs_choices: bool,
    pub uses_scale: bool,
    pub remappable: bool,
}

impl From<FieldType> for FieldTypeResponse {
    fn from(field_type: FieldType) -> Self {
        Self {
            field_type,
            label: field_type.label(),
            widget: field_type.widget(),
            answer_shape: field_type.answer_shape(),
            needs_choices: field_type.needs_choices(),
            uses_scale: field_type.uses_scale(),
            remappable: field_type.remappable(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunFieldResponse {
    pub field: FieldRecord,
    pub widget: WidgetKind,
    pub choices: Vec<FieldChoiceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<OrdinalScaleRecord>,
    /// Choice whose selection shows this off-page field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_by: Option<Uuid>,
    pub answer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
}

impl From<RunField> for RunFieldResponse {
    fn from(run: RunField) -> Self {
        Self {
            widget: run.field.field_type.widget(),
            field: run.field,
            choices: run.choices,
            scale: run.scale,
            revealed_by: run.revealed_by,
            answer: run.answer,
            upload: run.upload,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStepResponse {
    Page {
        survey: SurveyRecord,
        page: PageRecord,
        fields: Vec<RunFieldResponse>,
    },
    Complete {
        survey_id: Uuid,
        redirect: String,
    },
}

impl From<FlowStep> for RunStepResponse {
    fn from(step: FlowStep) -> Self {
        match step {
            FlowStep::Page(run) => {
                let run = *run;
                Self::Page {
                    survey: run.survey,
                    page: run.page,
                    fields: run.fields.into_iter().map(RunFieldResponse::from).collect(),
                }
            }
            FlowStep::Complete {
                survey_id,
                redirect,
            } => Self::Complete {
                survey_id,
                redirect,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageSubmissionResponse {
    pub saved: Vec<FieldResultRecord>,
    pub next: RunStepResponse,
}

impl From<PageSubmission> for PageSubmissionResponse {
    fn from(submission: PageSubmission) -> Self {
        Self {
            saved: submission.saved,
            next: submission.next.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadAnswerResponse {
    pub result: FieldResultRecord,
    pub checksum: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize)]
pub struct RemapOverviewResponse {
    pub field: FieldRecord,
    pub unmapped: Vec<String>,
    pub groups: BTreeMap<String, Vec<String>>,
}

impl From<RemapOverview> for RemapOverviewResponse {
    fn from(overview: RemapOverview) -> Self {
        Self {
            field: overview.field,
            unmapped: overview.unmapped,
            groups: overview.groups,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MappingOutcomeResponse {
    pub mapped_tokens: usize,
    pub results_updated: u64,
}

impl From<MappingOutcome> for MappingOutcomeResponse {
    fn from(outcome: MappingOutcome) -> Self {
        Self {
            mapped_tokens: outcome.mapped_tokens,
            results_updated: outcome.results_updated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub question_id: Uuid,
    pub question_label: String,
    pub answer: Value,
    pub mapped_answer: Option<Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub upload: String,
    pub display: String,
}

impl From<AnswerView> for AnswerResponse {
    fn from(view: AnswerView) -> Self {
        Self {
            question_id: view.result.question_id,
            question_label: view.question_label,
            answer: view.result.answer,
            mapped_answer: view.result.mapped_answer,
            upload: view.result.upload,
            display: view.display,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: SurveyResultRecord,
    pub answers: Vec<AnswerResponse>,
}

impl From<ResultView> for ResultResponse {
    fn from(view: ResultView) -> Self {
        Self {
            result: view.result,
            answers: view.answers.into_iter().map(AnswerResponse::from).collect(),
        }
    }
}
