use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreatePageParams, PagesRepo, PagesWriteRepo, RepoError, UpdatePageParams,
    },
    domain::entities::PageRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct PageRow {
    id: Uuid,
    survey_id: Uuid,
    page_num: i32,
    subtitle: String,
    target_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl PageRow {
    pub(super) const COLUMNS: &'static str =
        "id, survey_id, page_num, subtitle, target_id, created_at";
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            survey_id: row.survey_id,
            page_num: row.page_num,
            subtitle: row.subtitle,
            target_id: row.target_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PagesRepo for PostgresRepositories {
    async fn find_page(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM survey_pages WHERE id = $1",
            PageRow::COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(PageRecord::from))
    }

    async fn list_pages(&self, survey_id: Uuid) -> Result<Vec<PageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM survey_pages WHERE survey_id = $1 ORDER BY page_num, id",
            PageRow::COLUMNS
        ))
        .bind(survey_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PageRecord::from).collect())
    }
}

#[async_trait]
impl PagesWriteRepo for PostgresRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let page_num = match params.page_num {
            Some(num) => num,
            None => {
                let (next,): (i32,) = sqlx::query_as(
                    "SELECT COALESCE(MAX(page_num), 0) + 1 FROM survey_pages WHERE survey_id = $1",
                )
                .bind(params.survey_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
                next
            }
        };

        let row = sqlx::query_as::<_, PageRow>(&format!(
            "INSERT INTO survey_pages (id, survey_id, page_num, subtitle, target_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PageRow::COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(params.survey_id)
        .bind(page_num)
        .bind(&params.subtitle)
        .bind(params.target_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::touch_survey(&mut *tx, params.survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn ensure_first_page(&self, survey_id: Uuid) -> Result<PageRecord, RepoError> {
        sqlx::query(
            "INSERT INTO survey_pages (id, survey_id, page_num) \
             SELECT $1, $2, 1 \
             WHERE NOT EXISTS (SELECT 1 FROM survey_pages WHERE survey_id = $2) \
             ON CONFLICT (survey_id, page_num) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(survey_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM survey_pages WHERE survey_id = $1 ORDER BY page_num, id LIMIT 1",
            PageRow::COLUMNS
        ))
        .bind(survey_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_page(&self, params: UpdatePageParams) -> Result<PageRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PageRow>(&format!(
            "UPDATE survey_pages SET subtitle = $2, target_id = $3 WHERE id = $1 RETURNING {}",
            PageRow::COLUMNS
        ))
        .bind(params.id)
        .bind(&params.subtitle)
        .bind(params.target_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Self::touch_survey(&mut *tx, row.survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let survey_id: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM survey_pages WHERE id = $1 RETURNING survey_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((survey_id,)) = survey_id else {
            return Err(RepoError::NotFound);
        };

        Self::touch_survey(&mut *tx, survey_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn swap_page_numbers(&self, first: Uuid, second: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Both rows change in one statement so the unique (survey_id, page_num)
        // constraint is only checked against the final state.
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE survey_pages AS p
            SET page_num = other.page_num
            FROM survey_pages AS other
            WHERE (p.id, other.id) IN (($1, $2), ($2, $1))
              AND p.survey_id = other.survey_id
            RETURNING p.survey_id
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
}
