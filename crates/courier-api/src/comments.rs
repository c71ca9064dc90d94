use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use courier_types::api::CommentRequest;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, Result};
use crate::middleware::AuthUser;

/// POST /messages/{id}/comments: one emoji per user per message.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<CommentRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let comment = blocking(&state, move |s| s.create_comment(message_id, me.id(), &req.emoji)).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(comment_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse> {
    blocking(&state, move |s| s.delete_comment(comment_id, me.id())).await?;
    Ok(StatusCode::NO_CONTENT)
}
