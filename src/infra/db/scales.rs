use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateScaleParams, RepoError, ScalesRepo, ScalesWriteRepo},
    domain::{
        entities::{OrdinalChoiceRecord, OrdinalScaleRecord},
        types::ScaleKind,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ScaleRow {
    id: Uuid,
    name: String,
    kind: ScaleKind,
    created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct OrdinalChoiceRow {
    id: Uuid,
    scale_id: Uuid,
    label: String,
    score: i32,
}

impl From<OrdinalChoiceRow> for OrdinalChoiceRecord {
    fn from(row: OrdinalChoiceRow) -> Self {
        Self {
            id: row.id,
            scale_id: row.scale_id,
            label: row.label,
            score: row.score,
        }
    }
}

fn assemble(row: ScaleRow, choices: Vec<OrdinalChoiceRecord>) -> OrdinalScaleRecord {
    OrdinalScaleRecord {
        id: row.id,
        name: row.name,
        kind: row.kind,
        created_at: row.created_at,
        choices,
    }
}

#[async_trait]
impl ScalesRepo for PostgresRepositories {
    async fn list_scales(&self) -> Result<Vec<OrdinalScaleRecord>, RepoError> {
        let scales = sqlx::query_as::<_, ScaleRow>(
            "SELECT id, name, kind, created_at FROM ordinal_scales ORDER BY name, id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let choices = sqlx::query_as::<_, OrdinalChoiceRow>(
            "SELECT id, scale_id, label, score FROM ordinal_choices ORDER BY scale_id, score",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut by_scale: HashMap<Uuid, Vec<OrdinalChoiceRecord>> = HashMap::new();
        for choice in choices {
            by_scale
                .entry(choice.scale_id)
                .or_default()
                .push(choice.into());
        }

        Ok(scales
            .into_iter()
            .map(|row| {
                let choices = by_scale.remove(&row.id).unwrap_or_default();
                assemble(row, choices)
            })
            .collect())
    }

    async fn find_scale(&self, id: Uuid) -> Result<Option<OrdinalScaleRecord>, RepoError> {
        let Some(row) = sqlx::query_as::<_, ScaleRow>(
            "SELECT id, name, kind, created_at FROM ordinal_scales WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let choices = sqlx::query_as::<_, OrdinalChoiceRow>(
            "SELECT id, scale_id, label, score FROM ordinal_choices WHERE scale_id = $1 ORDER BY score",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(assemble(
            row,
            choices.into_iter().map(Into::into).collect(),
        )))
    }
}

#[async_trait]
impl ScalesWriteRepo for PostgresRepositories {
    async fn create_scale(
        &self,
        params: CreateScaleParams,
    ) -> Result<OrdinalScaleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ScaleRow>(
            "INSERT INTO ordinal_scales (id, name, kind) VALUES ($1, $2, $3) \
             RETURNING id, name, kind, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(params.kind)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut choices = Vec::with_capacity(params.choices.len());
        for (label, score) in params.choices {
            let choice = sqlx::query_as::<_, OrdinalChoiceRow>(
                "INSERT INTO ordinal_choices (id, scale_id, label, score) VALUES ($1, $2, $3, $4) \
                 RETURNING id, scale_id, label, score",
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(label)
            .bind(score)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            choices.push(OrdinalChoiceRecord::from(choice));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        choices.sort_by_key(|choice| choice.score);
        Ok(assemble(row, choices))
    }
}
