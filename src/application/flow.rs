//! Respondent-facing flow: which page to show next, with everything needed to render it.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::completion::CompletionRedirect;
use crate::application::permissions::{Permission, PermissionDenied, PermissionPolicy};
use crate::application::repos::{
    PagesWriteRepo, RepoError, ResultsRepo, ScalesRepo, SurveysRepo,
};
use crate::domain::entities::{
    FieldChoiceRecord, FieldRecord, FieldResultRecord, OrdinalScaleRecord, PageRecord,
    SurveyRecord,
};
use crate::domain::flow::{FlowResolution, RespondentProgress, resolve};
use crate::domain::graph::SurveyGraph;

const METRIC_FLOW_RESOLUTIONS: &str = "surveyor_flow_resolutions_total";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("survey `{0}` is not published")]
    NotPublished(Uuid),
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Everything loaded for one respondent in one survey.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub graph: SurveyGraph,
    pub results: Vec<FieldResultRecord>,
    pub progress: RespondentProgress,
}

impl RunContext {
    pub fn result_for(&self, question_id: Uuid) -> Option<&FieldResultRecord> {
        self.results
            .iter()
            .find(|result| result.question_id == question_id)
    }
}

/// One field as presented to a respondent.
#[derive(Debug, Clone)]
pub struct RunField {
    pub field: FieldRecord,
    pub choices: Vec<FieldChoiceRecord>,
    pub scale: Option<OrdinalScaleRecord>,
    /// For off-page fields: the choice on this page that reveals them.
    pub revealed_by: Option<Uuid>,
    pub answer: Option<Value>,
    pub upload: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunPage {
    pub survey: SurveyRecord,
    pub page: PageRecord,
    pub fields: Vec<RunField>,
}

#[derive(Debug, Clone)]
pub enum FlowStep {
    Page(Box<RunPage>),
    Complete { survey_id: Uuid, redirect: String },
}

#[derive(Clone)]
pub struct FlowService {
    surveys: Arc<dyn SurveysRepo>,
    pages: Arc<dyn PagesWriteRepo>,
    results: Arc<dyn ResultsRepo>,
    scales: Arc<dyn ScalesRepo>,
    policy: Arc<dyn PermissionPolicy>,
    completion: Arc<dyn CompletionRedirect>,
}

impl FlowService {
    pub fn new(
        surveys: Arc<dyn SurveysRepo>,
        pages: Arc<dyn PagesWriteRepo>,
        results: Arc<dyn ResultsRepo>,
        scales: Arc<dyn ScalesRepo>,
        policy: Arc<dyn PermissionPolicy>,
        completion: Arc<dyn CompletionRedirect>,
    ) -> Self {
        Self {
            surveys,
            pages,
            results,
            scales,
            policy,
            completion,
        }
    }

    /// Load the survey design and the respondent's answers. A survey without pages gets
    /// its first page created here.
    pub async fn context(
        &self,
        respondent: &str,
        survey_id: Uuid,
    ) -> Result<RunContext, FlowError> {
        let mut graph = self
            .surveys
            .load_graph(survey_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.ensure_takeable(respondent, graph.survey())?;

        if graph.first_page().is_none() {
            self.pages.ensure_first_page(survey_id).await?;
            graph = self
                .surveys
                .load_graph(survey_id)
                .await?
                .ok_or(RepoError::NotFound)?;
        }

        let results = match self.results.find_result(survey_id, respondent).await? {
            Some(result) => self.results.list_field_results(result.id).await?,
            None => Vec::new(),
        };
        let progress = RespondentProgress::from_results(&results);

        Ok(RunContext {
            graph,
            results,
            progress,
        })
    }

    fn ensure_takeable(&self, respondent: &str, survey: &SurveyRecord) -> Result<(), FlowError> {
        self.policy
            .ensure(respondent, Permission::TakeSurvey, Some(survey))?;
        if !survey.is_published() && survey.creator != respondent {
            return Err(FlowError::NotPublished(survey.id));
        }
        Ok(())
    }

    pub async fn next_page(
        &self,
        respondent: &str,
        survey_id: Uuid,
    ) -> Result<FlowStep, FlowError> {
        let context = self.context(respondent, survey_id).await?;
        self.step(&context).await
    }

    /// Resolve the next step for an already loaded context.
    pub async fn step(&self, context: &RunContext) -> Result<FlowStep, FlowError> {
        let graph = &context.graph;
        let survey_id = graph.survey().id;

        let page = match resolve(graph, &context.progress) {
            FlowResolution::Resume(page) => page,
            FlowResolution::Complete => {
                counter!(METRIC_FLOW_RESOLUTIONS, "outcome" => "complete").increment(1);
                return Ok(self.complete(survey_id));
            }
            FlowResolution::Cycle { page_id } => {
                counter!(METRIC_FLOW_RESOLUTIONS, "outcome" => "cycle").increment(1);
                warn!(
                    target = "surveyor::flow",
                    survey_id = %survey_id,
                    page_id = %page_id,
                    "page targets form a cycle; treating survey as complete"
                );
                return Ok(self.complete(survey_id));
            }
        };
        counter!(METRIC_FLOW_RESOLUTIONS, "outcome" => "page").increment(1);

        let run_page = self.render_page(context, page).await?;
        Ok(FlowStep::Page(Box::new(run_page)))
    }

    fn complete(&self, survey_id: Uuid) -> FlowStep {
        FlowStep::Complete {
            survey_id,
            redirect: self.completion.redirect_for(survey_id),
        }
    }

    async fn render_page(
        &self,
        context: &RunContext,
        page: &PageRecord,
    ) -> Result<RunPage, FlowError> {
        let graph = &context.graph;

        let mut entries: Vec<(&FieldRecord, Option<Uuid>)> = graph
            .fields_on_page(page.id)
            .map(|field| (field, None))
            .collect();
        for (choice, hidden) in graph.revealed_fields(page.id) {
            if !entries.iter().any(|(field, _)| field.id == hidden.id) {
                entries.push((hidden, Some(choice.id)));
            }
        }

        let mut scales: HashMap<Uuid, OrdinalScaleRecord> = HashMap::new();
        for scale_id in entries.iter().filter_map(|(field, _)| field.scale_id) {
            if scales.contains_key(&scale_id) {
                continue;
            }
            if let Some(scale) = self.scales.find_scale(scale_id).await? {
                scales.insert(scale_id, scale);
            }
        }

        let fields = entries
            .into_iter()
            .map(|(field, revealed_by)| {
                let stored = context.result_for(field.id);
                RunField {
                    field: field.clone(),
                    choices: graph.choices_for(field.id).cloned().collect(),
                    scale: field.scale_id.and_then(|id| scales.get(&id).cloned()),
                    revealed_by,
                    answer: stored.and_then(|result| result.answer_value().cloned()),
                    upload: stored
                        .map(|result| result.upload.clone())
                        .filter(|upload| !upload.is_empty()),
                }
            })
            .collect();

        Ok(RunPage {
            survey: graph.survey().clone(),
            page: page.clone(),
            fields,
        })
    }
}
