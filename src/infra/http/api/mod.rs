pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::{ApiState, ServiceOptions};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post, put},
};

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route("/api/v1/field-types", get(handlers::list_field_types))
        .route(
            "/api/v1/surveys",
            get(handlers::list_surveys).post(handlers::create_survey),
        )
        .route(
            "/api/v1/surveys/{id}",
            get(handlers::get_survey).delete(handlers::delete_survey),
        )
        .route("/api/v1/surveys/{id}/name", post(handlers::rename_survey))
        .route(
            "/api/v1/surveys/{id}/publish",
            post(handlers::publish_survey),
        )
        .route(
            "/api/v1/surveys/{id}/duplicate",
            post(handlers::duplicate_survey),
        )
        .route("/api/v1/surveys/{id}/pages", post(handlers::create_page))
        .route(
            "/api/v1/surveys/{id}/fields",
            post(handlers::create_survey_field),
        )
        .route(
            "/api/v1/surveys/{id}/results",
            get(handlers::list_results),
        )
        .route(
            "/api/v1/pages/{id}",
            get(handlers::get_page)
                .patch(handlers::update_page)
                .delete(handlers::delete_page),
        )
        .route("/api/v1/pages/{id}/move-up", post(handlers::move_page_up))
        .route(
            "/api/v1/pages/{id}/move-down",
            post(handlers::move_page_down),
        )
        .route(
            "/api/v1/pages/{id}/fields",
            post(handlers::create_page_field),
        )
        .route(
            "/api/v1/fields/{id}",
            get(handlers::get_field)
                .patch(handlers::update_field)
                .delete(handlers::delete_field),
        )
        .route("/api/v1/fields/{id}/move-up", post(handlers::move_field_up))
        .route(
            "/api/v1/fields/{id}/move-down",
            post(handlers::move_field_down),
        )
        .route("/api/v1/fields/{id}/choices", post(handlers::create_choice))
        .route(
            "/api/v1/fields/{id}/remap",
            get(handlers::get_remap).post(handlers::apply_remap),
        )
        .route(
            "/api/v1/choices/{id}",
            patch(handlers::update_choice).delete(handlers::delete_choice),
        )
        .route(
            "/api/v1/scales",
            get(handlers::list_scales).post(handlers::create_scale),
        )
        .route(
            "/api/v1/run/surveys/{id}",
            get(handlers::get_run_step).post(handlers::submit_run_page),
        )
        .route(
            "/api/v1/run/surveys/{id}/fields/{field_id}",
            put(handlers::save_run_answer),
        )
        .route(
            "/api/v1/run/surveys/{id}/fields/{field_id}/upload",
            post(handlers::upload_run_answer),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::authenticate,
        ))
}
