use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{CursorPage, PageRequest, SurveyCursor},
        repos::{CreateSurveyParams, RepoError, SurveysRepo, SurveysWriteRepo},
    },
    domain::{entities::SurveyRecord, graph::SurveyGraph},
};

use super::{
    PostgresRepositories, choices::ChoiceRow, fields::FieldRow, map_sqlx_error, pages::PageRow,
};

const SURVEY_COLUMNS: &str = "id, name, creator, created_at, updated_at, published_at";

#[derive(sqlx::FromRow)]
pub(super) struct SurveyRow {
    id: Uuid,
    name: String,
    creator: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    published_at: Option<OffsetDateTime>,
}

impl From<SurveyRow> for SurveyRecord {
    fn from(row: SurveyRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            creator: row.creator,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
        }
    }
}

impl PostgresRepositories {
    pub(super) async fn fetch_survey<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<SurveyRecord>, RepoError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query_as::<_, SurveyRow>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(SurveyRecord::from))
    }
}

#[async_trait]
impl SurveysRepo for PostgresRepositories {
    async fn list_surveys(
        &self,
        creator: &str,
        page: PageRequest<SurveyCursor>,
    ) -> Result<CursorPage<SurveyRecord>, RepoError> {
        let limit = page.limit.clamp(1, 200);
        let mut qb = QueryBuilder::new(format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE creator = "
        ));
        qb.push_bind(creator.to_string());

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at, id) < (");
            qb.push_bind(cursor.created_at());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(limit) + 1);

        let mut rows = qb
            .build_query_as::<SurveyRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let next_cursor = if rows.len() > limit as usize {
            rows.truncate(limit as usize);
            rows.last()
                .map(|row| SurveyCursor::new(row.created_at, row.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(
            rows.into_iter().map(SurveyRecord::from).collect(),
            next_cursor,
        ))
    }

    async fn find_survey(&self, id: Uuid) -> Result<Option<SurveyRecord>, RepoError> {
        Self::fetch_survey(self.pool(), id).await
    }

    async fn load_graph(&self, survey_id: Uuid) -> Result<Option<SurveyGraph>, RepoError> {
        let Some(survey) = Self::fetch_survey(self.pool(), survey_id).await? else {
            return Ok(None);
        };

        let pages = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM survey_pages WHERE survey_id = $1 ORDER BY page_num",
            PageRow::COLUMNS
        ))
        .bind(survey_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let fields = sqlx::query_as::<_, FieldRow>(&format!(
            "SELECT {} FROM survey_fields WHERE survey_id = $1 ORDER BY ordinal, id",
            FieldRow::COLUMNS
        ))
        .bind(survey_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let choices = sqlx::query_as::<_, ChoiceRow>(
            "SELECT c.id, c.field_id, c.label, c.target_id, c.created_at \
             FROM field_choices c \
             INNER JOIN survey_fields f ON f.id = c.field_id \
             WHERE f.survey_id = $1 \
             ORDER BY c.created_at, c.id",
        )
        .bind(survey_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(SurveyGraph::new(
            survey,
            pages.into_iter().map(Into::into).collect(),
            fields.into_iter().map(Into::into).collect(),
            choices.into_iter().map(Into::into).collect(),
        )))
    }
}

#[async_trait]
impl SurveysWriteRepo for PostgresRepositories {
    async fn create_survey(&self, params: CreateSurveyParams) -> Result<SurveyRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, SurveyRow>(&format!(
            "INSERT INTO surveys (id, name, creator) VALUES ($1, $2, $3) RETURNING {SURVEY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(&params.creator)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("INSERT INTO survey_pages (id, survey_id, page_num) VALUES ($1, $2, 1)")
            .bind(Uuid::new_v4())
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn rename_survey(&self, id: Uuid, name: &str) -> Result<SurveyRecord, RepoError> {
        let row = sqlx::query_as::<_, SurveyRow>(&format!(
            "UPDATE surveys SET name = $2, updated_at = now() WHERE id = $1 RETURNING {SURVEY_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(SurveyRecord::from).ok_or(RepoError::NotFound)
    }

    async fn publish_survey(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<SurveyRecord, RepoError> {
        let row = sqlx::query_as::<_, SurveyRow>(&format!(
            "UPDATE surveys \
             SET published_at = COALESCE(published_at, $2), updated_at = now() \
             WHERE id = $1 RETURNING {SURVEY_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(SurveyRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_survey(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::expect_one(result.rows_affected())
    }
}
