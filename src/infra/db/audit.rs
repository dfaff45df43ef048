use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{AuditRepo, RepoError},
    domain::entities::AuditLogRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl AuditRepo for PostgresRepositories {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        let AuditLogRecord {
            id,
            actor,
            action,
            entity_type,
            entity_id,
            payload,
            created_at,
        } = record;

        sqlx::query(
            "INSERT INTO audit_logs (id, actor, action, entity_type, entity_id, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(actor)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(Json(payload))
        .bind(created_at)
        .execute(self.pool())
        .await
        .map(drop)
        .map_err(map_sqlx_error)
    }
}
