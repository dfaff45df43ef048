use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::design::{DesignError, SurveyAccess, ensure_non_empty, not_found};
use crate::application::pagination::{CursorPage, PageRequest, SurveyCursor};
use crate::application::permissions::Permission;
use crate::application::repos::{CreateSurveyParams, SurveysRepo, SurveysWriteRepo};
use crate::domain::entities::SurveyRecord;
use crate::domain::graph::SurveyGraph;

const METRIC_SURVEYS_CREATED: &str = "surveyor_surveys_created_total";

#[derive(Debug, Clone)]
pub struct CreateSurveyCommand {
    pub name: String,
}

#[derive(Serialize)]
struct SurveySnapshot<'a> {
    name: &'a str,
    published: bool,
}

impl<'a> From<&'a SurveyRecord> for SurveySnapshot<'a> {
    fn from(survey: &'a SurveyRecord) -> Self {
        Self {
            name: survey.name.as_str(),
            published: survey.is_published(),
        }
    }
}

#[derive(Clone)]
pub struct SurveyDesignService {
    reader: Arc<dyn SurveysRepo>,
    writer: Arc<dyn SurveysWriteRepo>,
    access: SurveyAccess,
    audit: AuditService,
}

impl SurveyDesignService {
    pub fn new(
        reader: Arc<dyn SurveysRepo>,
        writer: Arc<dyn SurveysWriteRepo>,
        access: SurveyAccess,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            access,
            audit,
        }
    }

    /// The actor's own surveys, newest first.
    pub async fn list(
        &self,
        actor: &str,
        page: PageRequest<SurveyCursor>,
    ) -> Result<CursorPage<SurveyRecord>, DesignError> {
        self.access.global(actor, Permission::ViewSurveyList)?;
        Ok(self.reader.list_surveys(actor, page).await?)
    }

    /// Full design of one survey.
    pub async fn detail(&self, actor: &str, id: Uuid) -> Result<SurveyGraph, DesignError> {
        self.access
            .survey(actor, Permission::ViewSurveyDetail, id)
            .await?;
        not_found(self.reader.load_graph(id).await?)
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreateSurveyCommand,
    ) -> Result<SurveyRecord, DesignError> {
        self.access.global(actor, Permission::CreateSurvey)?;
        ensure_non_empty(&command.name, "name")?;

        let survey = self
            .writer
            .create_survey(CreateSurveyParams {
                name: command.name.trim().to_string(),
                creator: actor.to_string(),
            })
            .await?;

        counter!(METRIC_SURVEYS_CREATED).increment(1);
        info!(
            target = "surveyor::design::surveys",
            survey_id = %survey.id,
            creator = %survey.creator,
            "survey created"
        );
        self.audit
            .record(actor, AuditAction::SurveyCreate, survey.id, &SurveySnapshot::from(&survey))
            .await?;
        Ok(survey)
    }

    pub async fn rename(
        &self,
        actor: &str,
        id: Uuid,
        name: &str,
    ) -> Result<SurveyRecord, DesignError> {
        self.access
            .survey(actor, Permission::ChangeSurveyName, id)
            .await?;
        ensure_non_empty(name, "name")?;

        let survey = self.writer.rename_survey(id, name.trim()).await?;
        self.audit
            .record(actor, AuditAction::SurveyRename, survey.id, &SurveySnapshot::from(&survey))
            .await?;
        Ok(survey)
    }

    /// Publishing twice keeps the first timestamp.
    pub async fn publish(&self, actor: &str, id: Uuid) -> Result<SurveyRecord, DesignError> {
        let current = self
            .access
            .survey(actor, Permission::PublishSurvey, id)
            .await?;
        if current.is_published() {
            return Ok(current);
        }

        let survey = self
            .writer
            .publish_survey(id, OffsetDateTime::now_utc())
            .await?;
        self.audit
            .record(actor, AuditAction::SurveyPublish, survey.id, &SurveySnapshot::from(&survey))
            .await?;
        Ok(survey)
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), DesignError> {
        let survey = self
            .access
            .survey(actor, Permission::DeleteObject, id)
            .await?;
        self.writer.delete_survey(id).await?;
        self.audit
            .record(actor, AuditAction::SurveyDelete, id, &SurveySnapshot::from(&survey))
            .await?;
        Ok(())
    }
}
