//! Designer view over collected answers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, ResultCursor};
use crate::application::permissions::{Permission, PermissionDenied, PermissionPolicy};
use crate::application::repos::{RepoError, ResultsRepo, ScalesRepo, SurveysRepo};
use crate::domain::answers::is_blank;
use crate::domain::entities::{FieldResultRecord, SurveyResultRecord};
use crate::domain::graph::SurveyGraph;
use crate::domain::types::AnswerShape;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AnswerView {
    pub result: FieldResultRecord,
    pub question_label: String,
    /// Human-readable rendering: choice labels, scale label and score, mapped text.
    pub display: String,
}

#[derive(Debug, Clone)]
pub struct ResultView {
    pub result: SurveyResultRecord,
    pub answers: Vec<AnswerView>,
}

#[derive(Clone)]
pub struct ResultsService {
    surveys: Arc<dyn SurveysRepo>,
    results: Arc<dyn ResultsRepo>,
    scales: Arc<dyn ScalesRepo>,
    policy: Arc<dyn PermissionPolicy>,
}

impl ResultsService {
    pub fn new(
        surveys: Arc<dyn SurveysRepo>,
        results: Arc<dyn ResultsRepo>,
        scales: Arc<dyn ScalesRepo>,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Self {
        Self {
            surveys,
            results,
            scales,
            policy,
        }
    }

    pub async fn list(
        &self,
        actor: &str,
        survey_id: Uuid,
        page: PageRequest<ResultCursor>,
    ) -> Result<CursorPage<ResultView>, ResultsError> {
        let graph = self
            .surveys
            .load_graph(survey_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.policy
            .ensure(actor, Permission::ViewResults, Some(graph.survey()))?;

        let labels = self.choice_labels(&graph).await?;
        let results = self.results.list_results(survey_id, page).await?;

        let mut items = Vec::with_capacity(results.items.len());
        for result in results.items {
            let answers = self
                .results
                .list_field_results(result.id)
                .await?
                .into_iter()
                .map(|stored| describe(&graph, &labels, stored))
                .collect();
            items.push(ResultView { result, answers });
        }
        Ok(CursorPage::new(items, results.next_cursor))
    }

    /// Display labels for every choice id an answer of this survey may hold.
    async fn choice_labels(&self, graph: &SurveyGraph) -> Result<HashMap<Uuid, String>, ResultsError> {
        let mut labels: HashMap<Uuid, String> = graph
            .choices()
            .iter()
            .map(|choice| (choice.id, choice.label.clone()))
            .collect();

        let mut scale_ids: Vec<Uuid> = graph.fields().iter().filter_map(|f| f.scale_id).collect();
        scale_ids.sort_unstable();
        scale_ids.dedup();
        for scale_id in scale_ids {
            if let Some(scale) = self.scales.find_scale(scale_id).await? {
                for choice in scale.choices {
                    labels.insert(choice.id, format!("{} ({})", choice.label, choice.score));
                }
            }
        }
        Ok(labels)
    }
}

fn describe(graph: &SurveyGraph, labels: &HashMap<Uuid, String>, stored: FieldResultRecord) -> AnswerView {
    let field = graph.field(stored.question_id);
    let question_label = field
        .map(|field| field.label.clone())
        .unwrap_or_else(|| stored.question_id.to_string());
    let shape = field.map(|field| field.field_type.answer_shape());

    let display = match shape {
        Some(AnswerShape::Upload) => stored.upload.clone(),
        Some(AnswerShape::SingleChoice | AnswerShape::MultiChoice | AnswerShape::ScaleChoice) => {
            stored
                .answer_value()
                .map(|answer| choice_display(answer, labels))
                .unwrap_or_default()
        }
        Some(AnswerShape::Boolean) => match stored.answer_value() {
            Some(Value::Bool(true)) => "Yes".to_string(),
            _ => "No".to_string(),
        },
        _ => stored
            .mapped_answer
            .as_ref()
            .or_else(|| stored.answer_value())
            .map(text_display)
            .unwrap_or_default(),
    };

    AnswerView {
        result: stored,
        question_label,
        display,
    }
}

fn choice_display(answer: &Value, labels: &HashMap<Uuid, String>) -> String {
    let label_for = |raw: &str| -> String {
        Uuid::parse_str(raw)
            .ok()
            .and_then(|id| labels.get(&id).cloned())
            .unwrap_or_else(|| raw.to_string())
    };
    match answer {
        Value::String(raw) if !raw.is_empty() => label_for(raw),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(label_for)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn text_display(answer: &Value) -> String {
    if is_blank(answer) {
        return String::new();
    }
    match answer {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
