use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::design::{DesignError, MoveDirection, SurveyAccess, not_found};
use crate::application::permissions::Permission;
use crate::application::repos::{
    CreatePageParams, FieldsRepo, PagesRepo, PagesWriteRepo, UpdatePageParams,
};
use crate::domain::entities::{FieldRecord, PageRecord};
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub struct CreatePageCommand {
    pub survey_id: Uuid,
    pub page_num: Option<i32>,
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePageCommand {
    pub id: Uuid,
    pub subtitle: String,
    pub target_id: Option<Uuid>,
}

/// A page together with the fields placed on it.
#[derive(Debug, Clone)]
pub struct PageDetail {
    pub page: PageRecord,
    pub fields: Vec<FieldRecord>,
}

#[derive(Serialize)]
struct PageSnapshot<'a> {
    survey_id: Uuid,
    page_num: i32,
    subtitle: &'a str,
    target_id: Option<Uuid>,
}

impl<'a> From<&'a PageRecord> for PageSnapshot<'a> {
    fn from(page: &'a PageRecord) -> Self {
        Self {
            survey_id: page.survey_id,
            page_num: page.page_num,
            subtitle: page.subtitle.as_str(),
            target_id: page.target_id,
        }
    }
}

#[derive(Clone)]
pub struct PageDesignService {
    reader: Arc<dyn PagesRepo>,
    writer: Arc<dyn PagesWriteRepo>,
    fields: Arc<dyn FieldsRepo>,
    access: SurveyAccess,
    audit: AuditService,
}

impl PageDesignService {
    pub fn new(
        reader: Arc<dyn PagesRepo>,
        writer: Arc<dyn PagesWriteRepo>,
        fields: Arc<dyn FieldsRepo>,
        access: SurveyAccess,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            fields,
            access,
            audit,
        }
    }

    async fn load(
        &self,
        actor: &str,
        permission: Permission,
        id: Uuid,
    ) -> Result<PageRecord, DesignError> {
        let page = not_found(self.reader.find_page(id).await?)?;
        self.access.survey(actor, permission, page.survey_id).await?;
        Ok(page)
    }

    async fn check_target(
        &self,
        survey_id: Uuid,
        page_id: Option<Uuid>,
        target_id: Option<Uuid>,
    ) -> Result<(), DesignError> {
        let Some(target_id) = target_id else {
            return Ok(());
        };
        if page_id == Some(target_id) {
            return Err(DomainError::validation("target", "a page cannot target itself").into());
        }
        match self.reader.find_page(target_id).await? {
            Some(target) if target.survey_id == survey_id => Ok(()),
            Some(_) => Err(DomainError::validation(
                "target",
                "target page belongs to another survey",
            )
            .into()),
            None => Err(DomainError::not_found("page").into()),
        }
    }

    pub async fn detail(&self, actor: &str, id: Uuid) -> Result<PageDetail, DesignError> {
        let page = self.load(actor, Permission::EditSurvey, id).await?;
        let fields = self
            .fields
            .list_fields(page.survey_id)
            .await?
            .into_iter()
            .filter(|field| field.page_id == Some(page.id))
            .collect();
        Ok(PageDetail { page, fields })
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreatePageCommand,
    ) -> Result<PageRecord, DesignError> {
        self.access
            .survey(actor, Permission::EditSurvey, command.survey_id)
            .await?;
        if command.page_num.is_some_and(|num| num < 1) {
            return Err(DesignError::ConstraintViolation("page_num"));
        }
        self.check_target(command.survey_id, None, command.target_id)
            .await?;

        let page = self
            .writer
            .create_page(CreatePageParams {
                survey_id: command.survey_id,
                page_num: command.page_num,
                subtitle: command.subtitle.trim().to_string(),
                target_id: command.target_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::PageCreate, page.id, &PageSnapshot::from(&page))
            .await?;
        Ok(page)
    }

    pub async fn update(
        &self,
        actor: &str,
        command: UpdatePageCommand,
    ) -> Result<PageRecord, DesignError> {
        let current = self.load(actor, Permission::EditSurvey, command.id).await?;
        self.check_target(current.survey_id, Some(current.id), command.target_id)
            .await?;

        let page = self
            .writer
            .update_page(UpdatePageParams {
                id: command.id,
                subtitle: command.subtitle.trim().to_string(),
                target_id: command.target_id,
            })
            .await?;
        self.audit
            .record(actor, AuditAction::PageUpdate, page.id, &PageSnapshot::from(&page))
            .await?;
        Ok(page)
    }

    /// Deletes the page and every field placed on it.
    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), DesignError> {
        let page = self.load(actor, Permission::DeleteObject, id).await?;
        self.writer.delete_page(id).await?;
        self.audit
            .record(actor, AuditAction::PageDelete, id, &PageSnapshot::from(&page))
            .await?;
        Ok(())
    }

    /// Swap page numbers with the nearest page in `direction`; a no-op at either end.
    pub async fn move_page(
        &self,
        actor: &str,
        id: Uuid,
        direction: MoveDirection,
    ) -> Result<PageRecord, DesignError> {
        let page = self.load(actor, Permission::EditSurvey, id).await?;
        let pages = self.reader.list_pages(page.survey_id).await?;

        let neighbour = match direction {
            MoveDirection::Up => pages
                .iter()
                .filter(|other| other.page_num < page.page_num)
                .max_by_key(|other| other.page_num),
            MoveDirection::Down => pages
                .iter()
                .filter(|other| other.page_num > page.page_num)
                .min_by_key(|other| other.page_num),
        };
        let Some(neighbour) = neighbour else {
            return Ok(page);
        };

        self.writer.swap_page_numbers(page.id, neighbour.id).await?;
        let moved = not_found(self.reader.find_page(id).await?)?;
        self.audit
            .record(actor, AuditAction::PageMove, moved.id, &PageSnapshot::from(&moved))
            .await?;
        Ok(moved)
    }
}
