use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{RepoError, SurveyCopyRepo},
    domain::{duplicate::SurveyCopyPlan, entities::SurveyRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SurveyCopyRepo for PostgresRepositories {
    async fn insert_copy(&self, plan: &SurveyCopyPlan) -> Result<SurveyRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let survey = &plan.survey;

        sqlx::query(
            "INSERT INTO surveys (id, name, creator, created_at, updated_at, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(survey.id)
        .bind(&survey.name)
        .bind(&survey.creator)
        .bind(survey.created_at)
        .bind(survey.updated_at)
        .bind(survey.published_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for page in &plan.pages {
            sqlx::query(
                "INSERT INTO survey_pages (id, survey_id, page_num, subtitle, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(page.id)
            .bind(page.survey_id)
            .bind(page.page_num)
            .bind(&page.subtitle)
            .bind(page.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        for field in &plan.fields {
            sqlx::query(
                r#"
                INSERT INTO survey_fields (
                    id, survey_id, page_id, label, help_text, field_type, ordinal,
                    maximum_choices, required, expected_answers, scale_id, mapping,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(field.id)
            .bind(field.survey_id)
            .bind(field.page_id)
            .bind(&field.label)
            .bind(&field.help_text)
            .bind(field.field_type)
            .bind(field.ordinal)
            .bind(field.maximum_choices)
            .bind(field.required)
            .bind(field.expected_answers)
            .bind(field.scale_id)
            .bind(Json(&field.mapping))
            .bind(field.created_at)
            .bind(field.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        for choice in &plan.choices {
            sqlx::query(
                "INSERT INTO field_choices (id, field_id, label, created_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(choice.id)
            .bind(choice.field_id)
            .bind(&choice.label)
            .bind(choice.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        // Every copied row exists now, so targets can be linked.
        for link in &plan.page_targets {
            sqlx::query("UPDATE survey_pages SET target_id = $2 WHERE id = $1")
                .bind(link.source)
                .bind(link.target)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        for link in &plan.choice_targets {
            sqlx::query("UPDATE field_choices SET target_id = $2 WHERE id = $1")
                .bind(link.source)
                .bind(link.target)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(survey.clone())
    }
}
