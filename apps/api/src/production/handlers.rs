//! Axum route handlers for asset tracking and post-production.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::asset::AssetRow;
use crate::models::scene::SceneRow;
use crate::production::assets::{delete_asset, insert_asset, list_assets, AssetDraft};
use crate::production::scenes::{
    delete_scene, find_scene, insert_scene, list_scenes, update_scene_status, validate_status,
    SceneDraft, ScenesOverview,
};
use crate::projects::store::require_project_exists;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cost: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateSceneRequest {
    pub scene_number: i64,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSceneRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductionMessageResponse {
    pub message: String,
    pub id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Assets
// ────────────────────────────────────────────────────────────────────────────

/// GET /projects/:project_id/assets
pub async fn handle_list_assets(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<Vec<AssetRow>>, AppError> {
    require_project_exists(&state.db, project_id).await?;
    Ok(Json(list_assets(&state.db, project_id).await?))
}

/// POST /projects/:project_id/assets
pub async fn handle_create_asset(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateAssetRequest>,
) -> Result<(StatusCode, Json<AssetRow>), AppError> {
    let draft = AssetDraft::new(&request.name, &request.status, &request.cost)?;
    require_project_exists(&state.db, project_id).await?;
    let asset = insert_asset(&state.db, project_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// DELETE /api/asset/:asset_id
pub async fn handle_delete_asset(
    State(state): State<AppState>,
    AppPath(asset_id): AppPath<Uuid>,
) -> Result<Json<ProductionMessageResponse>, AppError> {
    if !delete_asset(&state.db, asset_id).await? {
        return Err(AppError::NotFound(format!("Asset {asset_id} not found")));
    }
    Ok(Json(ProductionMessageResponse {
        message: "Asset deleted successfully.".to_string(),
        id: asset_id,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Post-production scenes
// ────────────────────────────────────────────────────────────────────────────

/// GET /projects/:project_id/post_production
pub async fn handle_post_production(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<ScenesOverview>, AppError> {
    require_project_exists(&state.db, project_id).await?;
    let scenes = list_scenes(&state.db, project_id).await?;
    Ok(Json(ScenesOverview::new(scenes)))
}

/// POST /projects/:project_id/post_production
pub async fn handle_create_scene(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateSceneRequest>,
) -> Result<(StatusCode, Json<SceneRow>), AppError> {
    let draft = SceneDraft::new(
        request.scene_number,
        request.description.as_deref(),
        request.status.as_deref(),
    )?;
    require_project_exists(&state.db, project_id).await?;
    let scene = insert_scene(&state.db, project_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(scene)))
}

/// PUT /api/scene/:scene_id
///
/// Only the status is editable; an absent status leaves the scene unchanged.
pub async fn handle_update_scene(
    State(state): State<AppState>,
    AppPath(scene_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateSceneRequest>,
) -> Result<Json<SceneRow>, AppError> {
    let not_found = || AppError::NotFound(format!("Scene {scene_id} not found"));

    let updated = match request.status.as_deref() {
        Some(raw) => {
            let status = validate_status(raw)?;
            update_scene_status(&state.db, scene_id, &status).await?
        }
        None => find_scene(&state.db, scene_id).await?,
    };

    Ok(Json(updated.ok_or_else(not_found)?))
}

/// DELETE /api/scene/:scene_id
pub async fn handle_delete_scene(
    State(state): State<AppState>,
    AppPath(scene_id): AppPath<Uuid>,
) -> Result<Json<ProductionMessageResponse>, AppError> {
    if !delete_scene(&state.db, scene_id).await? {
        return Err(AppError::NotFound(format!("Scene {scene_id} not found")));
    }
    Ok(Json(ProductionMessageResponse {
        message: "Scene deleted successfully.".to_string(),
        id: scene_id,
    }))
}
