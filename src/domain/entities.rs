//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use serde_json::Value;
use slug::slugify;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    remapping::AnswerMapping,
    types::{FieldType, ScaleKind},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyRecord {
    pub id: Uuid,
    pub name: String,
    pub creator: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub published_at: Option<OffsetDateTime>,
}

impl SurveyRecord {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub page_num: i32,
    pub subtitle: String,
    pub target_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl PageRecord {
    /// Display label: the subtitle when set, otherwise `Page N`.
    pub fn label(&self) -> String {
        if self.subtitle.trim().is_empty() {
            format!("Page {}", self.page_num)
        } else {
            self.subtitle.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRecord {
    pub id: Uuid,
    pub survey_id: Uuid,
    /// `None` for fields that are only reachable as a branch target.
    pub page_id: Option<Uuid>,
    pub label: String,
    pub help_text: String,
    pub field_type: FieldType,
    pub ordinal: i32,
    pub maximum_choices: Option<i32>,
    pub required: bool,
    pub expected_answers: i32,
    pub scale_id: Option<Uuid>,
    pub mapping: AnswerMapping,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl FieldRecord {
    /// Form name derived from the label.
    pub fn name(&self) -> String {
        slugify(&self.label)
    }

    pub fn is_off_page(&self) -> bool {
        self.page_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChoiceRecord {
    pub id: Uuid,
    pub field_id: Uuid,
    pub label: String,
    pub target_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrdinalChoiceRecord {
    pub id: Uuid,
    pub scale_id: Uuid,
    pub label: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrdinalScaleRecord {
    pub id: Uuid,
    pub name: String,
    pub kind: ScaleKind,
    pub created_at: OffsetDateTime,
    /// Ordered by score.
    pub choices: Vec<OrdinalChoiceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyResultRecord {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub respondent: String,
    pub date_submitted: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResultRecord {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub page_id: Uuid,
    pub result_id: Uuid,
    pub question_id: Uuid,
    /// Wrapped as `{"answer": value}`.
    pub answer: Value,
    pub upload: String,
    pub mapped_answer: Option<Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl FieldResultRecord {
    pub fn answer_value(&self) -> Option<&Value> {
        self.answer.get("answer")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    /// Snapshot of the entity after the change.
    pub payload: Value,
    pub created_at: OffsetDateTime,
}
