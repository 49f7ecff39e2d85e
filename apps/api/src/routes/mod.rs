pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::budget::handlers as budget;
use crate::copilot::handlers as copilot;
use crate::production::handlers as production;
use crate::projects::handlers as projects;
use crate::projects::upload::{handle_upload_project, MAX_UPLOAD_BYTES};
use crate::schedule::handlers as schedule;
use crate::script::handlers as script;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Projects
        .route("/projects", get(projects::handle_list_projects))
        .route("/projects/new", post(projects::handle_create_project))
        .route(
            "/projects/upload",
            post(handle_upload_project).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/projects/:project_id", get(projects::handle_get_project))
        .route(
            "/projects/:project_id/assets",
            get(production::handle_list_assets).post(production::handle_create_asset),
        )
        .route(
            "/projects/:project_id/post_production",
            get(production::handle_post_production).post(production::handle_create_scene),
        )
        .route(
            "/api/project/:project_id/script_content",
            get(projects::handle_script_content),
        )
        .route(
            "/api/project/:project_id/update_budget",
            post(budget::handle_update_forecast),
        )
        // Script analysis
        .route("/api/script/analyze", post(script::handle_analyze))
        // Budget
        .route(
            "/api/budget/predict/:project_id",
            post(budget::handle_predict),
        )
        .route(
            "/api/budget/expenses/:project_id",
            get(budget::handle_list_expenses)
                .post(budget::handle_create_expense)
                .delete(budget::handle_delete_expense),
        )
        .route("/api/expense/:expense_id", put(budget::handle_update_expense))
        .route(
            "/api/budget/summary/:project_id",
            get(budget::handle_budget_summary),
        )
        .route(
            "/api/budget/generate_from_script",
            post(budget::handle_generate_from_script),
        )
        // Copilot
        .route(
            "/api/budget/copilot/history/:project_id",
            get(copilot::handle_copilot_history),
        )
        .route(
            "/api/budget/copilot/:project_id",
            post(copilot::handle_copilot_message),
        )
        // Schedule
        .route(
            "/api/schedule/:project_id",
            get(schedule::handle_list_schedule).post(schedule::handle_create_schedule_item),
        )
        .route(
            "/api/schedule/:project_id/generate_tasks_from_script",
            post(schedule::handle_generate_tasks),
        )
        .route(
            "/api/schedule/item/:item_id",
            put(schedule::handle_update_schedule_item)
                .delete(schedule::handle_delete_schedule_item),
        )
        // Assets & post-production
        .route("/api/asset/:asset_id", delete(production::handle_delete_asset))
        .route(
            "/api/scene/:scene_id",
            put(production::handle_update_scene).delete(production::handle_delete_scene),
        )
        .with_state(state)
}
