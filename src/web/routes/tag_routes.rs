use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;

use crate::db::models::{Tag as DtoTag, TagWithCount};
use crate::db::services::{TagService, TagServiceError};
use crate::web::models::{ApiResponse, AuthenticatedUser, TagRequest};
use crate::web::{AppError, AppState};

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/{id}",
            get(get_tag_handler)
                .patch(update_tag_handler)
                .delete(delete_tag_handler),
        )
}

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TagWithCount>>>, AppError> {
    let tags = TagService::list_with_counts(&app_state.db_pool).await?;
    Ok(Json(ApiResponse::ok(tags)))
}

async fn create_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<TagRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<DtoTag>>), AppError> {
    let tag = TagService::create(&app_state.db_pool, &authenticated_user.id, &payload.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(DtoTag::from(tag)).with_message("Tag created")),
    ))
}

async fn get_tag_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(tag_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<ApiResponse<DtoTag>>, AppError> {
    let tag = TagService::get(&app_state.db_pool, tag_id).await?;
    Ok(Json(ApiResponse::ok(tag.into())))
}

async fn update_tag_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(tag_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<TagRequest>, AppError>,
) -> Result<Json<ApiResponse<DtoTag>>, AppError> {
    let tag = TagService::update(&app_state.db_pool, tag_id, &payload.name).await?;
    Ok(Json(ApiResponse::ok(DtoTag::from(tag)).with_message("Tag updated")))
}

async fn delete_tag_handler(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(tag_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    TagService::delete(&app_state.db_pool, tag_id).await?;
    Ok(Json(ApiResponse::done("Tag deleted")))
}

impl From<TagServiceError> for AppError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            TagServiceError::NotFound(_) => AppError::NotFound("Tag not found".to_string()),
            e @ TagServiceError::EmptyName => AppError::InvalidInput(e.to_string()),
            e @ (TagServiceError::DuplicateName(_) | TagServiceError::InUse(..)) => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}
