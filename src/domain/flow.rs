//! Page-flow resolution: which page a respondent should see next.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    entities::{FieldRecord, FieldResultRecord, PageRecord},
    graph::SurveyGraph,
    types::AnswerShape,
};

/// What a respondent has already answered in one survey.
#[derive(Debug, Clone, Default)]
pub struct RespondentProgress {
    completed_pages: HashSet<Uuid>,
    answers: HashMap<Uuid, Value>,
}

impl RespondentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build progress from the respondent's stored field results.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a FieldResultRecord>,
    {
        let mut progress = Self::new();
        for result in results {
            let answer = result.answer_value().cloned().unwrap_or(Value::Null);
            progress.record(result.page_id, result.question_id, answer);
        }
        progress
    }

    pub fn record(&mut self, page_id: Uuid, question_id: Uuid, answer: Value) {
        self.completed_pages.insert(page_id);
        self.answers.insert(question_id, answer);
    }

    pub fn has_results_on(&self, page_id: Uuid) -> bool {
        self.completed_pages.contains(&page_id)
    }

    pub fn answer_for(&self, question_id: Uuid) -> Option<&Value> {
        self.answers.get(&question_id)
    }

    /// Whether the stored answer for `field` selects `choice_id`.
    pub fn selected(&self, field: &FieldRecord, choice_id: Uuid) -> bool {
        let Some(answer) = self.answer_for(field.id) else {
            return false;
        };
        let wanted = choice_id.to_string();
        match (field.field_type.answer_shape(), answer) {
            (AnswerShape::SingleChoice, Value::String(value)) => *value == wanted,
            (AnswerShape::MultiChoice, Value::Array(values)) => values
                .iter()
                .any(|value| value.as_str() == Some(wanted.as_str())),
            _ => false,
        }
    }
}

/// Outcome of walking the page graph for one respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowResolution<'g> {
    /// The respondent resumes on this page.
    Resume(&'g PageRecord),
    /// Every reachable page is answered.
    Complete,
    /// The walk came back to `page_id`; treated as complete by callers.
    Cycle { page_id: Uuid },
}

impl<'g> FlowResolution<'g> {
    pub fn page(self) -> Option<&'g PageRecord> {
        match self {
            FlowResolution::Resume(page) => Some(page),
            FlowResolution::Complete | FlowResolution::Cycle { .. } => None,
        }
    }
}

/// A page is completed once it holds a result for the respondent.
///
/// Pages without any fields have nothing to answer and also count as completed. This
/// deliberately differs from the stricter rule that any page lacking a result is the
/// resume point: under that rule an empty page would trap the respondent forever. As a
/// consequence a fresh survey whose only page has no fields resolves to `Complete`.
pub fn page_completed(graph: &SurveyGraph, progress: &RespondentProgress, page: &PageRecord) -> bool {
    progress.has_results_on(page.id) || graph.fields_on_page(page.id).next().is_none()
}

/// Candidate successor of a completed page; later rules override earlier ones:
/// the linear successor, then the page target, then the first selected branch choice.
pub fn candidate_after<'g>(
    graph: &'g SurveyGraph,
    progress: &RespondentProgress,
    page: &PageRecord,
) -> Option<&'g PageRecord> {
    let mut candidate = page
        .page_num
        .checked_add(1)
        .and_then(|next| graph.page_by_num(next));

    if let Some(target) = page.target_id.and_then(|id| graph.page(id)) {
        candidate = Some(target);
    }

    if let Some(branch) = selected_branch(graph, progress, page) {
        candidate = Some(branch);
    }

    candidate
}

fn selected_branch<'g>(
    graph: &'g SurveyGraph,
    progress: &RespondentProgress,
    page: &PageRecord,
) -> Option<&'g PageRecord> {
    graph
        .branch_choices(page.id)
        .filter(|(field, choice)| progress.selected(field, choice.id))
        .find_map(|(_, choice)| {
            choice
                .target_id
                .and_then(|target| graph.field(target))
                .and_then(|target| target.page_id)
                .and_then(|page_id| graph.page(page_id))
        })
}

/// Resolve from the first page of the survey.
pub fn resolve<'g>(graph: &'g SurveyGraph, progress: &RespondentProgress) -> FlowResolution<'g> {
    match graph.first_page() {
        Some(first) => resolve_from(graph, progress, first),
        None => FlowResolution::Complete,
    }
}

/// Walk forward from `start`, skipping completed pages.
pub fn resolve_from<'g>(
    graph: &'g SurveyGraph,
    progress: &RespondentProgress,
    start: &'g PageRecord,
) -> FlowResolution<'g> {
    let mut visited = HashSet::new();
    let mut current = start;

    loop {
        if !visited.insert(current.id) {
            return FlowResolution::Cycle {
                page_id: current.id,
            };
        }

        if !page_completed(graph, progress, current) {
            return FlowResolution::Resume(current);
        }

        match candidate_after(graph, progress, current) {
            Some(next) => current = next,
            None => return FlowResolution::Complete,
        }
    }
}

/// Next page for the respondent, or `None` once the survey is complete.
pub fn resolve_next_page<'g>(
    graph: &'g SurveyGraph,
    progress: &RespondentProgress,
) -> Option<&'g PageRecord> {
    resolve(graph, progress).page()
}
