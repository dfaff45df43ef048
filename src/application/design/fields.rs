use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::design::{
    DesignError, FieldTypeCatalog, MoveDirection, SurveyAccess, ensure_non_empty, not_found,
};
use crate::application::permissions::Permission;
use crate::application::repos::{
    ChoicesRepo, CreateFieldParams, FieldsRepo, FieldsWriteRepo, PagesRepo, ScalesRepo,
    UpdateFieldParams,
};
use crate::domain::entities::{FieldChoiceRecord, FieldRecord};
use crate::domain::error::DomainError;
use crate::domain::types::FieldType;

/// Designer input shared by field creation and update.
#[derive(Debug, Clone)]
pub struct FieldDraft {
    pub label: String,
    pub help_text: String,
    pub field_type: FieldType,
    pub maximum_choices: Option<i32>,
    pub required: bool,
    pub expected_answers: Option<i32>,
    pub scale_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateFieldCommand {
    pub survey_id: Uuid,
    pub page_id: Option<Uuid>,
    pub ordinal: Option<i32>,
    pub draft: FieldDraft,
}

#[derive(Debug, Clone)]
pub struct UpdateFieldCommand {
    pub id: Uuid,
    /// Moves the field to another page, or off-page when `None`.
    pub page_id: Option<Uuid>,
    pub draft: FieldDraft,
}

#[derive(Debug, Clone)]
pub struct FieldDetail {
    pub field: FieldRecord,
    pub choices: Vec<FieldChoiceRecord>,
}

#[derive(Serialize)]
struct FieldSnapshot<'a> {
    survey_id: Uuid,
    page_id: Option<Uuid>,
    label: &'a str,
    field_type: FieldType,
    ordinal: i32,
}

impl<'a> From<&'a FieldRecord> for FieldSnapshot<'a> {
    fn from(field: &'a FieldRecord) -> Self {
        Self {
            survey_id: field.survey_id,
            page_id: field.page_id,
            label: field.label.as_str(),
            field_type: field.field_type,
            ordinal: field.ordinal,
        }
    }
}

/// Normalized draft ready to persist.
struct CheckedDraft {
    label: String,
    help_text: String,
    maximum_choices: Option<i32>,
    expected_answers: i32,
    scale_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct FieldDesignService {
    reader: Arc<dyn FieldsRepo>,
    writer: Arc<dyn FieldsWriteRepo>,
    pages: Arc<dyn PagesRepo>,
    choices: Arc<dyn ChoicesRepo>,
    scales: Arc<dyn ScalesRepo>,
    catalog: FieldTypeCatalog,
    access: SurveyAccess,
    audit: AuditService,
}

impl FieldDesignService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Arc<dyn FieldsRepo>,
        writer: Arc<dyn FieldsWriteRepo>,
        pages: Arc<dyn PagesRepo>,
        choices: Arc<dyn ChoicesRepo>,
        scales: Arc<dyn ScalesRepo>,
        catalog: FieldTypeCatalog,
        access: SurveyAccess,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            pages,
            choices,
            scales,
            catalog,
            access,
            audit,
        }
    }

    pub fn catalog(&self) -> &FieldTypeCatalog {
        &self.catalog
    }

    async fn load(
        &self,
        actor: &str,
        permission: Permission,
        id: Uuid,
    ) -> Result<FieldRecord, DesignError> {
        let field = not_found(self.reader.find_field(id).await?)?;
        self.access
            .survey(actor, permission, field.survey_id)
            .await?;
        Ok(field)
    }

    async fn check_page(&self, survey_id: Uuid, page_id: Option<Uuid>) -> Result<(), DesignError> {
        let Some(page_id) = page_id else {
            return Ok(());
        };
        match self.pages.find_page(page_id).await? {
            Some(page) if page.survey_id == survey_id => Ok(()),
            Some(_) => Err(DomainError::validation("page", "page belongs to another survey").into()),
            None => Err(DomainError::not_found("page").into()),
        }
    }

    async fn check_draft(&self, draft: FieldDraft) -> Result<CheckedDraft, DesignError> {
        ensure_non_empty(&draft.label, "label")?;
        if !self.catalog.is_enabled(draft.field_type) {
            return Err(DomainError::validation(
                "field_type",
                format!("field type `{}` is not enabled", draft.field_type),
            )
            .into());
        }
        if draft.maximum_choices.is_some_and(|max| max < 1) {
            return Err(DesignError::ConstraintViolation("maximum_choices"));
        }
        let expected_answers = draft.expected_answers.unwrap_or(1);
        if expected_answers < 1 {
            return Err(DesignError::ConstraintViolation("expected_answers"));
        }

        let scale_id = match draft.field_type.scale_kind() {
            Some(kind) => {
                let scale_id = draft.scale_id.ok_or(DomainError::validation(
                    "scale",
                    format!("{} questions need a {} scale", draft.field_type, kind.as_str()),
                ))?;
                let scale = self
                    .scales
                    .find_scale(scale_id)
                    .await?
                    .ok_or(DomainError::not_found("scale"))?;
                if scale.kind != kind {
                    return Err(DomainError::validation(
                        "scale",
                        format!("expected a {} scale", kind.as_str()),
                    )
                    .into());
                }
                Some(scale_id)
            }
            None => None,
        };

        let maximum_choices = if draft.field_type.needs_choices() {
            draft.maximum_choices
        } else {
            None
        };

        Ok(CheckedDraft {
            label: draft.label.trim().to_string(),
            help_text: draft.help_text.trim().to_string(),
            maximum_choices,
            expected_answers: if draft.field_type.is_multiple() {
                expected_answers
            } else {
                1
            },
            scale_id,
        })
    }

    pub async fn detail(&self, actor: &str, id: Uuid) -> Result<FieldDetail, DesignError> {
        let field = self.load(actor, Permission::EditSurvey, id).await?;
        let choices = self.choices.list_choices(field.id).await?;
        Ok(FieldDetail { field, choices })
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreateFieldCommand,
    ) -> Result<FieldRecord, DesignError> {
        self.access
            .survey(actor, Permission::EditSurvey, command.survey_id)
            .await?;
        self.check_page(command.survey_id, command.page_id).await?;
        let field_type = command.draft.field_type;
        let required = command.draft.required;
        let checked = self.check_draft(command.draft).await?;

        let field = self
            .writer
            .create_field(CreateFieldParams {
                survey_id: command.survey_id,
                page_id: command.page_id,
                label: checked.label,
                help_text: checked.help_text,
                field_type,
                ordinal: command.ordinal,
                maximum_choices: checked.maximum_choices,
                required,
                expected_answers: checked.expected_answers,
                scale_id: checked.scale_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::FieldCreate, field.id, &FieldSnapshot::from(&field))
            .await?;
        Ok(field)
    }

    pub async fn update(
        &self,
        actor: &str,
        command: UpdateFieldCommand,
    ) -> Result<FieldRecord, DesignError> {
        let current = self.load(actor, Permission::EditSurvey, command.id).await?;
        self.check_page(current.survey_id, command.page_id).await?;
        let field_type = command.draft.field_type;
        let required = command.draft.required;
        let checked = self.check_draft(command.draft).await?;

        let ordinal = if command.page_id == current.page_id {
            current.ordinal
        } else {
            self.next_ordinal(current.survey_id, command.page_id).await?
        };

        let field = self
            .writer
            .update_field(UpdateFieldParams {
                id: current.id,
                page_id: command.page_id,
                label: checked.label,
                help_text: checked.help_text,
                field_type,
                ordinal,
                maximum_choices: checked.maximum_choices,
                required,
                expected_answers: checked.expected_answers,
                scale_id: checked.scale_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::FieldUpdate, field.id, &FieldSnapshot::from(&field))
            .await?;
        Ok(field)
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), DesignError> {
        let field = self.load(actor, Permission::DeleteObject, id).await?;
        self.writer.delete_field(id).await?;
        self.audit
            .record(actor, AuditAction::FieldDelete, id, &FieldSnapshot::from(&field))
            .await?;
        Ok(())
    }

    /// Swap ordinals with the nearest field on the same page; a no-op at either end.
    pub async fn move_field(
        &self,
        actor: &str,
        id: Uuid,
        direction: MoveDirection,
    ) -> Result<FieldRecord, DesignError> {
        let field = self.load(actor, Permission::EditSurvey, id).await?;
        let siblings: Vec<_> = self
            .reader
            .list_fields(field.survey_id)
            .await?
            .into_iter()
            .filter(|other| other.page_id == field.page_id && other.id != field.id)
            .collect();

        let key = (field.ordinal, field.id);
        let neighbour = match direction {
            MoveDirection::Up => siblings
                .iter()
                .filter(|other| (other.ordinal, other.id) < key)
                .max_by_key(|other| (other.ordinal, other.id)),
            MoveDirection::Down => siblings
                .iter()
                .filter(|other| (other.ordinal, other.id) > key)
                .min_by_key(|other| (other.ordinal, other.id)),
        };
        let Some(neighbour) = neighbour else {
            return Ok(field);
        };

        self.writer.swap_ordinals(field.id, neighbour.id).await?;
        let moved = not_found(self.reader.find_field(id).await?)?;
        self.audit
            .record(actor, AuditAction::FieldMove, moved.id, &FieldSnapshot::from(&moved))
            .await?;
        Ok(moved)
    }

    async fn next_ordinal(
        &self,
        survey_id: Uuid,
        page_id: Option<Uuid>,
    ) -> Result<i32, DesignError> {
        let max = self
            .reader
            .list_fields(survey_id)
            .await?
            .into_iter()
            .filter(|field| field.page_id == page_id)
            .map(|field| field.ordinal)
            .max()
            .unwrap_or(0);
        Ok(max.saturating_add(1))
    }
}
