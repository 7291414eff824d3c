use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::db::models::LanguageCount;
use crate::db::services::SnippetQueryService;
use crate::web::models::ApiResponse;
use crate::web::{AppError, AppState};

pub fn create_languages_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_languages))
}

async fn list_languages(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<LanguageCount>>>, AppError> {
    let languages = SnippetQueryService::list_languages(&app_state.db_pool).await?;
    Ok(Json(ApiResponse::ok(languages)))
}
