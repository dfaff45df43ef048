use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        ChoicesRepo, ChoicesWriteRepo, CreateChoiceParams, RepoError, UpdateChoiceParams,
    },
    domain::entities::FieldChoiceRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const CHOICE_COLUMNS: &str = "id, field_id, label, target_id, created_at";

#[derive(sqlx::FromRow)]
pub(super) struct ChoiceRow {
    id: Uuid,
    field_id: Uuid,
    label: String,
    target_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl From<ChoiceRow> for FieldChoiceRecord {
    fn from(row: ChoiceRow) -> Self {
        Self {
            id: row.id,
            field_id: row.field_id,
            label: row.label,
            target_id: row.target_id,
            created_at: row.created_at,
        }
    }
}

impl PostgresRepositories {
    async fn touch_survey_of_field(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        field_id: Uuid,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE surveys SET updated_at = now() \
             WHERE id = (SELECT survey_id FROM survey_fields WHERE id = $1)",
        )
        .bind(field_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ChoicesRepo for PostgresRepositories {
    async fn find_choice(&self, id: Uuid) -> Result<Option<FieldChoiceRecord>, RepoError> {
        let row = sqlx::query_as::<_, ChoiceRow>(&format!(
            "SELECT {CHOICE_COLUMNS} FROM field_choices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(FieldChoiceRecord::from))
    }

    async fn list_choices(&self, field_id: Uuid) -> Result<Vec<FieldChoiceRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ChoiceRow>(&format!(
            "SELECT {CHOICE_COLUMNS} FROM field_choices WHERE field_id = $1 ORDER BY created_at, id"
        ))
        .bind(field_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FieldChoiceRecord::from).collect())
    }
}

#[async_trait]
impl ChoicesWriteRepo for PostgresRepositories {
    async fn create_choice(
        &self,
        params: CreateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ChoiceRow>(&format!(
            "INSERT INTO field_choices (id, field_id, label, target_id) \
             VALUES ($1, $2, $3, $4) RETURNING {CHOICE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(params.field_id)
        .bind(&params.label)
        .bind(params.target_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::touch_survey_of_field(&mut tx, row.field_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_choice(
        &self,
        params: UpdateChoiceParams,
    ) -> Result<FieldChoiceRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ChoiceRow>(&format!(
            "UPDATE field_choices SET label = $2, target_id = $3 WHERE id = $1 \
             RETURNING {CHOICE_COLUMNS}"
        ))
        .bind(params.id)
        .bind(&params.label)
        .bind(params.target_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::touch_survey_of_field(&mut tx, row.field_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_choice(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM field_choices WHERE id = $1 RETURNING field_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((field_id,)) = deleted else {
            return Err(RepoError::NotFound);
        };

        Self::touch_survey_of_field(&mut tx, field_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
