use async_trait::async_trait;
use serde_json::Value;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{CursorPage, PageRequest, ResultCursor},
        repos::{FieldAnswerParams, RepoError, ResultsRepo, ResultsWriteRepo},
    },
    domain::entities::{FieldResultRecord, SurveyResultRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const RESULT_COLUMNS: &str = "id, survey_id, respondent, date_submitted, updated_at";
const FIELD_RESULT_COLUMNS: &str = "id, survey_id, page_id, result_id, question_id, answer, \
     upload, mapped_answer, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SurveyResultRow {
    id: Uuid,
    survey_id: Uuid,
    respondent: String,
    date_submitted: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SurveyResultRow> for SurveyResultRecord {
    fn from(row: SurveyResultRow) -> Self {
        Self {
            id: row.id,
            survey_id: row.survey_id,
            respondent: row.respondent,
            date_submitted: row.date_submitted,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FieldResultRow {
    id: Uuid,
    survey_id: Uuid,
    page_id: Uuid,
    result_id: Uuid,
    question_id: Uuid,
    answer: Value,
    upload: String,
    mapped_answer: Option<Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FieldResultRow> for FieldResultRecord {
    fn from(row: FieldResultRow) -> Self {
        Self {
            id: row.id,
            survey_id: row.survey_id,
            page_id: row.page_id,
            result_id: row.result_id,
            question_id: row.question_id,
            answer: row.answer,
            upload: row.upload,
            mapped_answer: row.mapped_answer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ResultsRepo for PostgresRepositories {
    async fn find_result(
        &self,
        survey_id: Uuid,
        respondent: &str,
    ) -> Result<Option<SurveyResultRecord>, RepoError> {
        let row = sqlx::query_as::<_, SurveyResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM survey_results WHERE survey_id = $1 AND respondent = $2"
        ))
        .bind(survey_id)
        .bind(respondent)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(SurveyResultRecord::from))
    }

    async fn list_field_results(
        &self,
        result_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FieldResultRow>(&format!(
            "SELECT {FIELD_RESULT_COLUMNS} FROM field_results WHERE result_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(result_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FieldResultRecord::from).collect())
    }

    async fn list_results(
        &self,
        survey_id: Uuid,
        page: PageRequest<ResultCursor>,
    ) -> Result<CursorPage<SurveyResultRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {RESULT_COLUMNS} FROM survey_results WHERE survey_id = "
        ));
        qb.push_bind(survey_id);

        if let Some(cursor) = page.cursor {
            qb.push(" AND (date_submitted, id) < (");
            qb.push_bind(cursor.date_submitted());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY date_submitted DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(limit) + 1);

        let mut rows = qb
            .build_query_as::<SurveyResultRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let next_cursor = if rows.len() > limit as usize {
            rows.truncate(limit as usize);
            rows.last()
                .map(|row| ResultCursor::new(row.date_submitted, row.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(
            rows.into_iter().map(SurveyResultRecord::from).collect(),
            next_cursor,
        ))
    }

    async fn list_answers_for_field(
        &self,
        field_id: Uuid,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FieldResultRow>(&format!(
            "SELECT {FIELD_RESULT_COLUMNS} FROM field_results WHERE question_id = $1 \
             ORDER BY created_at, id"
        ))
        .bind(field_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FieldResultRecord::from).collect())
    }
}

#[async_trait]
impl ResultsWriteRepo for PostgresRepositories {
    async fn save_answers(
        &self,
        survey_id: Uuid,
        respondent: &str,
        answers: Vec<FieldAnswerParams>,
    ) -> Result<Vec<FieldResultRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let (result_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO survey_results (id, survey_id, respondent)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT survey_results_survey_respondent_key
            DO UPDATE SET updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(survey_id)
        .bind(respondent)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut saved = Vec::with_capacity(answers.len());
        for params in answers {
            let row = sqlx::query_as::<_, FieldResultRow>(&format!(
                r#"
                INSERT INTO field_results (
                    id, survey_id, page_id, result_id, question_id, answer, upload, mapped_answer
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT ON CONSTRAINT field_results_result_question_key
                DO UPDATE SET
                    page_id = EXCLUDED.page_id,
                    answer = EXCLUDED.answer,
                    upload = EXCLUDED.upload,
                    mapped_answer = EXCLUDED.mapped_answer,
                    updated_at = now()
                RETURNING {FIELD_RESULT_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(survey_id)
            .bind(params.page_id)
            .bind(result_id)
            .bind(params.question_id)
            .bind(params.stored.answer)
            .bind(params.stored.upload)
            .bind(params.stored.mapped_answer)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            saved.push(FieldResultRecord::from(row));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }
}
