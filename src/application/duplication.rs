use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::permissions::{Permission, PermissionDenied, PermissionPolicy};
use crate::application::repos::{RepoError, SurveyCopyRepo, SurveysRepo};
use crate::domain::duplicate::{EdgeKind, SurveyCopyPlan};
use crate::domain::entities::SurveyRecord;

const METRIC_SURVEYS_DUPLICATED: &str = "surveyor_surveys_duplicated_total";

#[derive(Debug, Error)]
pub enum DuplicationError {
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Serialize)]
struct CopySnapshot {
    source_id: Uuid,
    pages: usize,
    fields: usize,
    choices: usize,
    dropped_targets: usize,
}

/// Deep-copies a survey design into a new, unpublished survey.
#[derive(Clone)]
pub struct DuplicationService {
    surveys: Arc<dyn SurveysRepo>,
    writer: Arc<dyn SurveyCopyRepo>,
    policy: Arc<dyn PermissionPolicy>,
    audit: AuditService,
}

impl DuplicationService {
    pub fn new(
        surveys: Arc<dyn SurveysRepo>,
        writer: Arc<dyn SurveyCopyRepo>,
        policy: Arc<dyn PermissionPolicy>,
        audit: AuditService,
    ) -> Self {
        Self {
            surveys,
            writer,
            policy,
            audit,
        }
    }

    pub async fn duplicate(
        &self,
        actor: &str,
        survey_id: Uuid,
    ) -> Result<SurveyRecord, DuplicationError> {
        let graph = self
            .surveys
            .load_graph(survey_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.policy
            .ensure(actor, Permission::DuplicateSurvey, Some(graph.survey()))?;

        let plan = SurveyCopyPlan::new(&graph, OffsetDateTime::now_utc());
        for dropped in &plan.dropped {
            warn!(
                target = "surveyor::duplication",
                source_survey = %survey_id,
                edge = match dropped.kind {
                    EdgeKind::PageTarget => "page_target",
                    EdgeKind::ChoiceTarget => "choice_target",
                },
                source = %dropped.original_source,
                target_id = %dropped.original_target,
                "dropping target outside the copied survey"
            );
        }

        let copy = self.writer.insert_copy(&plan).await?;

        counter!(METRIC_SURVEYS_DUPLICATED).increment(1);
        info!(
            target = "surveyor::duplication",
            source_survey = %survey_id,
            copy_survey = %copy.id,
            pages = plan.pages.len(),
            fields = plan.fields.len(),
            choices = plan.choices.len(),
            "survey duplicated"
        );
        let snapshot = CopySnapshot {
            source_id: survey_id,
            pages: plan.pages.len(),
            fields: plan.fields.len(),
            choices: plan.choices.len(),
            dropped_targets: plan.dropped.len(),
        };
        self.audit
            .record(actor, AuditAction::SurveyDuplicate, copy.id, &snapshot)
            .await?;
        Ok(copy)
    }
}
