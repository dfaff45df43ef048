use std::sync::Arc;

use serde::Serialize;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::design::{DesignError, SurveyAccess, ensure_non_empty};
use crate::application::permissions::Permission;
use crate::application::repos::{CreateScaleParams, ScalesRepo, ScalesWriteRepo};
use crate::domain::entities::OrdinalScaleRecord;
use crate::domain::scales::score_labels;
use crate::domain::types::ScaleKind;

#[derive(Debug, Clone)]
pub struct CreateScaleCommand {
    pub name: String,
    pub kind: ScaleKind,
    /// Ordered from the lowest to the highest score.
    pub labels: Vec<String>,
}

#[derive(Serialize)]
struct ScaleSnapshot<'a> {
    name: &'a str,
    kind: ScaleKind,
    labels: Vec<&'a str>,
}

#[derive(Clone)]
pub struct ScaleService {
    reader: Arc<dyn ScalesRepo>,
    writer: Arc<dyn ScalesWriteRepo>,
    access: SurveyAccess,
    audit: AuditService,
}

impl ScaleService {
    pub fn new(
        reader: Arc<dyn ScalesRepo>,
        writer: Arc<dyn ScalesWriteRepo>,
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

    pub async fn list(&self, actor: &str) -> Result<Vec<OrdinalScaleRecord>, DesignError> {
        self.access.global(actor, Permission::ManageScales)?;
        Ok(self.reader.list_scales().await?)
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreateScaleCommand,
    ) -> Result<OrdinalScaleRecord, DesignError> {
        self.access.global(actor, Permission::ManageScales)?;
        ensure_non_empty(&command.name, "name")?;
        let choices = score_labels(command.kind, &command.labels)?;

        let scale = self
            .writer
            .create_scale(CreateScaleParams {
                name: command.name.trim().to_string(),
                kind: command.kind,
                choices,
            })
            .await?;
        let snapshot = ScaleSnapshot {
            name: scale.name.as_str(),
            kind: scale.kind,
            labels: scale.choices.iter().map(|c| c.label.as_str()).collect(),
        };
        self.audit
            .record(actor, AuditAction::ScaleCreate, scale.id, &snapshot)
            .await?;
        Ok(scale)
    }
}
