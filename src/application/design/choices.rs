use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::design::{DesignError, SurveyAccess, ensure_non_empty, not_found};
use crate::application::permissions::Permission;
use crate::application::repos::{
    ChoicesRepo, ChoicesWriteRepo, CreateChoiceParams, FieldsRepo, SurveysRepo,
    UpdateChoiceParams,
};
use crate::domain::entities::{FieldChoiceRecord, FieldRecord};

#[derive(Debug, Clone)]
pub struct CreateChoiceCommand {
    pub field_id: Uuid,
    pub label: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateChoiceCommand {
    pub id: Uuid,
    pub label: String,
    pub target_id: Option<Uuid>,
}

#[derive(Serialize)]
struct ChoiceSnapshot<'a> {
    field_id: Uuid,
    label: &'a str,
    target_id: Option<Uuid>,
}

impl<'a> From<&'a FieldChoiceRecord> for ChoiceSnapshot<'a> {
    fn from(choice: &'a FieldChoiceRecord) -> Self {
        Self {
            field_id: choice.field_id,
            label: choice.label.as_str(),
            target_id: choice.target_id,
        }
    }
}

#[derive(Clone)]
pub struct ChoiceDesignService {
    reader: Arc<dyn ChoicesRepo>,
    writer: Arc<dyn ChoicesWriteRepo>,
    fields: Arc<dyn FieldsRepo>,
    surveys: Arc<dyn SurveysRepo>,
    access: SurveyAccess,
    audit: AuditService,
}

impl ChoiceDesignService {
    pub fn new(
        reader: Arc<dyn ChoicesRepo>,
        writer: Arc<dyn ChoicesWriteRepo>,
        fields: Arc<dyn FieldsRepo>,
        surveys: Arc<dyn SurveysRepo>,
        access: SurveyAccess,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            fields,
            surveys,
            access,
            audit,
        }
    }

    async fn owning_field(
        &self,
        actor: &str,
        permission: Permission,
        field_id: Uuid,
    ) -> Result<FieldRecord, DesignError> {
        let field = not_found(self.fields.find_field(field_id).await?)?;
        self.access
            .survey(actor, permission, field.survey_id)
            .await?;
        Ok(field)
    }

    /// Targets must be off-page fields of the same survey; checked against the
    /// design as it stands now.
    async fn check_target(
        &self,
        field: &FieldRecord,
        target_id: Option<Uuid>,
    ) -> Result<(), DesignError> {
        let Some(target_id) = target_id else {
            return Ok(());
        };
        let graph = not_found(self.surveys.load_graph(field.survey_id).await?)?;
        graph.validate_choice_target(target_id)?;
        Ok(())
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreateChoiceCommand,
    ) -> Result<FieldChoiceRecord, DesignError> {
        let field = self
            .owning_field(actor, Permission::EditSurvey, command.field_id)
            .await?;
        if !field.field_type.needs_choices() {
            return Err(DesignError::ConstraintViolation("field_type"));
        }
        ensure_non_empty(&command.label, "label")?;
        self.check_target(&field, command.target_id).await?;

        let choice = self
            .writer
            .create_choice(CreateChoiceParams {
                field_id: field.id,
                label: command.label.trim().to_string(),
                target_id: command.target_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::ChoiceCreate, choice.id, &ChoiceSnapshot::from(&choice))
            .await?;
        Ok(choice)
    }

    pub async fn update(
        &self,
        actor: &str,
        command: UpdateChoiceCommand,
    ) -> Result<FieldChoiceRecord, DesignError> {
        let current = not_found(self.reader.find_choice(command.id).await?)?;
        let field = self
            .owning_field(actor, Permission::EditSurvey, current.field_id)
            .await?;
        ensure_non_empty(&command.label, "label")?;
        if command.target_id != current.target_id {
            self.check_target(&field, command.target_id).await?;
        }

        let choice = self
            .writer
            .update_choice(UpdateChoiceParams {
                id: current.id,
                label: command.label.trim().to_string(),
                target_id: command.target_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::ChoiceUpdate, choice.id, &ChoiceSnapshot::from(&choice))
            .await?;
        Ok(choice)
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), DesignError> {
        let choice = not_found(self.reader.find_choice(id).await?)?;
        self.owning_field(actor, Permission::DeleteObject, choice.field_id)
            .await?;
        self.writer.delete_choice(id).await?;
        self.audit
            .record(actor, AuditAction::ChoiceDelete, id, &ChoiceSnapshot::from(&choice))
            .await?;
        Ok(())
    }
}
