//! Postgres-backed repository implementations.

mod audit;
mod choices;
mod duplicate;
mod fields;
mod pages;
mod results;
mod scales;
mod surveys;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use uuid::Uuid;

use crate::application::repos::RepoError;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Bump a survey's `updated_at` after one of its children changed.
    async fn touch_survey<'e, E>(executor: E, survey_id: Uuid) -> Result<(), RepoError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        query("UPDATE surveys SET updated_at = now() WHERE id = $1")
            .bind(survey_id)
            .execute(executor)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn expect_one(rows_affected: u64) -> Result<(), RepoError> {
        if rows_affected == 0 {
            Err(RepoError::NotFound)
        } else {
            Ok(())
        }
    }
}
