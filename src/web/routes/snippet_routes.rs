use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;

use crate::db::models::{Snippet, SnippetFilter, SnippetInput, SnippetQuery};
use crate::db::services::{SnippetQueryService, SnippetService, SnippetServiceError};
use crate::web::models::{
    ApiResponse, AuthenticatedUser, FavouriteToggleResponse, PageResponse, ToggleFavouriteRequest,
};
use crate::web::{AppError, AppState};

pub fn snippet_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_snippets).post(create_snippet))
        .route("/favourite", get(list_favourites))
        .route("/trash", get(list_trash))
        .route("/trash/{id}", patch(archive_snippet))
        .route("/trash/restore/{id}", patch(restore_snippet))
        .route("/share/{share_id}", get(get_shared_snippet))
        .route(
            "/{id}",
            patch(toggle_favourite).put(update_snippet).delete(delete_snippet),
        )
}

async fn list_page(
    app_state: &AppState,
    filter: SnippetFilter,
    query: &SnippetQuery,
    user: &AuthenticatedUser,
) -> Result<Json<PageResponse<Snippet>>, AppError> {
    let page = SnippetQueryService::list(&app_state.db_pool, filter, query, &user.id).await?;
    Ok(Json(page.into()))
}

async fn list_snippets(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Query(query), _): WithRejection<Query<SnippetQuery>, AppError>,
) -> Result<Json<PageResponse<Snippet>>, AppError> {
    list_page(&app_state, SnippetFilter::All, &query, &user).await
}

async fn list_favourites(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Query(query), _): WithRejection<Query<SnippetQuery>, AppError>,
) -> Result<Json<PageResponse<Snippet>>, AppError> {
    list_page(&app_state, SnippetFilter::Favourite, &query, &user).await
}

async fn list_trash(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Query(query), _): WithRejection<Query<SnippetQuery>, AppError>,
) -> Result<Json<PageResponse<Snippet>>, AppError> {
    list_page(&app_state, SnippetFilter::Trash, &query, &user).await
}

async fn create_snippet(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Json(payload), _): WithRejection<Json<SnippetInput>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<Snippet>>), AppError> {
    let snippet = SnippetService::create(&app_state.db_pool, &user.id, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(snippet).with_message("Snippet created")),
    ))
}

async fn update_snippet(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<SnippetInput>, AppError>,
) -> Result<Json<ApiResponse<Snippet>>, AppError> {
    let snippet = SnippetService::update(&app_state.db_pool, id, &user.id, &payload).await?;
    Ok(Json(ApiResponse::ok(snippet).with_message("Snippet updated")))
}

async fn delete_snippet(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    SnippetService::delete(&app_state.db_pool, id).await?;
    Ok(Json(ApiResponse::done("Snippet deleted")))
}

// The snippet to toggle comes from the body; the path segment only selects the route.
async fn toggle_favourite(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Json(payload), _): WithRejection<Json<ToggleFavouriteRequest>, AppError>,
) -> Result<Json<FavouriteToggleResponse>, AppError> {
    let snippet_id = payload
        .snippet_id
        .ok_or_else(|| AppError::InvalidInput("snippetId is required".to_string()))?;
    let (is_favourite, snippet) =
        SnippetService::toggle_favourite(&app_state.db_pool, snippet_id, &user.id).await?;
    Ok(Json(FavouriteToggleResponse {
        success: true,
        is_favourite,
        data: snippet,
    }))
}

async fn archive_snippet(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<ApiResponse<Snippet>>, AppError> {
    let snippet = SnippetService::archive(&app_state.db_pool, id).await?;
    Ok(Json(ApiResponse::ok(snippet).with_message("Snippet moved to trash")))
}

async fn restore_snippet(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<ApiResponse<Snippet>>, AppError> {
    let snippet = SnippetService::restore(&app_state.db_pool, id).await?;
    Ok(Json(ApiResponse::ok(snippet).with_message("Snippet restored")))
}

async fn get_shared_snippet(
    State(app_state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> Result<Json<ApiResponse<Snippet>>, AppError> {
    let snippet = SnippetQueryService::get_by_share_id(&app_state.db_pool, &share_id).await?;
    Ok(Json(ApiResponse::ok(snippet)))
}

impl From<SnippetServiceError> for AppError {
    fn from(err: SnippetServiceError) -> Self {
        match err {
            SnippetServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            SnippetServiceError::NotFound(_) => AppError::NotFound("Snippet not found".to_string()),
            SnippetServiceError::ShareIdNotFound(_) => {
                AppError::NotFound("Snippet not found".to_string())
            }
            SnippetServiceError::Validation(msg) => AppError::InvalidInput(msg),
            e @ SnippetServiceError::ShareIdExhausted(_) => AppError::InternalServerError(e.to_string()),
        }
    }
}
