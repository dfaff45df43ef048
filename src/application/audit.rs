use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{AuditRepo, RepoError};
use crate::domain::entities::AuditLogRecord;

/// Design-time mutations that leave an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    SurveyCreate,
    SurveyRename,
    SurveyPublish,
    SurveyDelete,
    SurveyDuplicate,
    PageCreate,
    PageUpdate,
    PageDelete,
    PageMove,
    FieldCreate,
    FieldUpdate,
    FieldDelete,
    FieldMove,
    FieldRemap,
    ChoiceCreate,
    ChoiceUpdate,
    ChoiceDelete,
    ScaleCreate,
}

impl AuditAction {
    /// Stored form, `<entity>.<verb>`.
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::SurveyCreate => "survey.create",
            AuditAction::SurveyRename => "survey.rename",
            AuditAction::SurveyPublish => "survey.publish",
            AuditAction::SurveyDelete => "survey.delete",
            AuditAction::SurveyDuplicate => "survey.duplicate",
            AuditAction::PageCreate => "page.create",
            AuditAction::PageUpdate => "page.update",
            AuditAction::PageDelete => "page.delete",
            AuditAction::PageMove => "page.move",
            AuditAction::FieldCreate => "field.create",
            AuditAction::FieldUpdate => "field.update",
            AuditAction::FieldDelete => "field.delete",
            AuditAction::FieldMove => "field.move",
            AuditAction::FieldRemap => "field.remap",
            AuditAction::ChoiceCreate => "choice.create",
            AuditAction::ChoiceUpdate => "choice.update",
            AuditAction::ChoiceDelete => "choice.delete",
            AuditAction::ScaleCreate => "scale.create",
        }
    }

    pub fn entity_type(self) -> &'static str {
        let action = self.as_str();
        action.split_once('.').map_or(action, |(entity, _)| entity)
    }
}

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepo>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    /// Append `action` on `entity_id`, keeping a JSON snapshot of the entity afterwards.
    pub async fn record<S>(
        &self,
        actor: &str,
        action: AuditAction,
        entity_id: Uuid,
        snapshot: &S,
    ) -> Result<(), RepoError>
    where
        S: Serialize,
    {
        let payload = serde_json::to_value(snapshot).map_err(RepoError::from_persistence)?;
        self.repo
            .append_log(AuditLogRecord {
                id: Uuid::new_v4(),
                actor: actor.to_string(),
                action: action.as_str().to_string(),
                entity_type: action.entity_type().to_string(),
                entity_id,
                payload,
                created_at: OffsetDateTime::now_utc(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_is_the_action_prefix() {
        assert_eq!(AuditAction::FieldRemap.entity_type(), "field");
        assert_eq!(AuditAction::SurveyDuplicate.entity_type(), "survey");
        assert_eq!(AuditAction::ChoiceDelete.as_str(), "choice.delete");
    }
}
