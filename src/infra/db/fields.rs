use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateFieldParams, FieldsRepo, FieldsWriteRepo, MappingUpdate, RepoError,
        UpdateFieldParams,
    },
    domain::{
        entities::FieldRecord,
        remapping::{AnswerMapping, canonicalize},
        types::FieldType,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct FieldRow {
    id: Uuid,
    survey_id: Uuid,
    page_id: Option<Uuid>,
    label: String,
    help_text: String,
    field_type: FieldType,
    ordinal: i32,
    maximum_choices: Option<i32>,
    required: bool,
    expected_answers: i32,
    scale_id: Option<Uuid>,
    mapping: Json<AnswerMapping>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl FieldRow {
    pub(super) const COLUMNS: &'static str = "id, survey_id, page_id, label, help_text, \
         field_type, ordinal, maximum_choices, required, expected_answers, scale_id, mapping, \
         created_at, updated_at";
}

impl From<FieldRow> for FieldRecord {
    fn from(row: FieldRow) -> Self {
        Self {
            id: row.id,
            survey_id: row.survey_id,
            page_id: row.page_id,
            label: row.label,
            help_text: row.help_text,
            field_type: row.field_type,
            ordinal: row.ordinal,
            maximum_choices: row.maximum_choices,
            required: row.required,
            expected_answers: row.expected_answers,
            scale_id: row.scale_id,
            mapping: row.mapping.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FieldsRepo for PostgresRepositories {
    async fn find_field(&self, id: Uuid) -> Result<Option<FieldRecord>, RepoError> {
        let row = sqlx::query_as::<_, FieldRow>(&format!(
            "SELECT {} FROM survey_fields WHERE id = $1",
            FieldRow::COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(FieldRecord::from))
    }

    async fn list_fields(&self, survey_id: Uuid) -> Result<Vec<FieldRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FieldRow>(&format!(
            "SELECT {} FROM survey_fields WHERE survey_id = $1 ORDER BY ordinal, id",
            FieldRow::COLUMNS
        ))
        .bind(survey_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FieldRecord::from).collect())
    }
}

#[async_trait]
impl FieldsWriteRepo for PostgresRepositories {
    async fn create_field(&self, params: CreateFieldParams) -> Result<FieldRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let ordinal = match params.ordinal {
            Some(ordinal) => ordinal,
            None => {
                // Off-page fields share one ordinal group per survey.
                let (next,): (i32,) = sqlx::query_as(
                    "SELECT COALESCE(MAX(ordinal), 0) + 1 FROM survey_fields \
                     WHERE survey_id = $1 AND page_id IS NOT DISTINCT FROM $2",
                )
                .bind(params.survey_id)
                .bind(params.page_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
                next
            }
        };

        let row = sqlx::query_as::<_, FieldRow>(&format!(
            r#"
            INSERT INTO survey_fields (
                id, survey_id, page_id, label, help_text, field_type, ordinal,
                maximum_choices, required, expected_answers, scale_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            FieldRow::COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(params.survey_id)
        .bind(params.page_id)
        .bind(&params.label)
        .bind(&params.help_text)
        .bind(params.field_type)
        .bind(ordinal)
        .bind(params.maximum_choices)
        .bind(params.required)
        .bind(params.expected_answers)
        .bind(params.scale_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::touch_survey(&mut *tx, params.survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_field(&self, params: UpdateFieldParams) -> Result<FieldRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, FieldRow>(&format!(
            r#"
            UPDATE survey_fields
            SET page_id = $2,
                label = $3,
                help_text = $4,
                field_type = $5,
                ordinal = $6,
                maximum_choices = $7,
                required = $8,
                expected_answers = $9,
                scale_id = $10,
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            FieldRow::COLUMNS
        ))
        .bind(params.id)
        .bind(params.page_id)
        .bind(&params.label)
        .bind(&params.help_text)
        .bind(params.field_type)
        .bind(params.ordinal)
        .bind(params.maximum_choices)
        .bind(params.required)
        .bind(params.expected_answers)
        .bind(params.scale_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::touch_survey(&mut *tx, row.survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_field(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let deleted: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM survey_fields WHERE id = $1 RETURNING survey_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((survey_id,)) = deleted else {
            return Err(RepoError::NotFound);
        };

        Self::touch_survey(&mut *tx, survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn swap_ordinals(&self, first: Uuid, second: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE survey_fields AS f
            SET ordinal = other.ordinal, updated_at = now()
            FROM survey_fields AS other
            WHERE (f.id, other.id) IN (($1, $2), ($2, $1))
              AND f.survey_id = other.survey_id
            RETURNING f.survey_id
            "#,
        )
        .bind(first)
        .bind(second)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if rows.len() != 2 {
            return Err(RepoError::NotFound);
        }

        Self::touch_survey(&mut *tx, rows[0].0).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn apply_mapping(
        &self,
        field_id: Uuid,
        tokens: &[String],
        canonical_label: &str,
    ) -> Result<MappingUpdate, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let (Json(mut mapping),): (Json<AnswerMapping>,) =
            sqlx::query_as("SELECT mapping FROM survey_fields WHERE id = $1 FOR UPDATE")
                .bind(field_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::NotFound)?;
        let mapped_tokens = mapping.reassign(tokens, canonical_label);

        sqlx::query("UPDATE survey_fields SET mapping = $2, updated_at = now() WHERE id = $1")
            .bind(field_id)
            .bind(Json(&mapping))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let answers: Vec<(Uuid, Value)> = sqlx::query_as(
            "SELECT id, answer FROM field_results WHERE question_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(field_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut rewritten = 0;
        for (id, answer) in answers {
            let mapped = answer
                .get("answer")
                .and_then(|value| canonicalize(value, &mapping));
            let result = sqlx::query(
                "UPDATE field_results SET mapped_answer = $2, updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(mapped)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            rewritten += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(MappingUpdate {
            mapped_tokens,
            results_updated: rewritten,
        })
    }
}
