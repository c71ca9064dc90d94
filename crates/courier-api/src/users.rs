use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use courier_types::api::{SetUsernameRequest, UserSearchQuery};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, Result};
use crate::files::{UploadKind, read_file_field};
use crate::middleware::AuthUser;

/// GET /users?q=: everyone but the caller, optionally by username prefix.
pub async fn search_users(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Query(query), _): WithRejection<Query<UserSearchQuery>, ApiError>,
) -> Result<impl IntoResponse> {
    let users = blocking(&state, move |s| s.search_users(me.id(), query.q.as_deref())).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse> {
    let user = blocking(&state, move |s| s.get_user(user_id)).await?;
    Ok(Json(user))
}

pub async fn update_username(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<SetUsernameRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let user = blocking(&state, move |s| s.update_username(me.id(), &req.username)).await?;
    Ok(Json(user))
}

/// PUT /me/photo: multipart with an `image` file field. The previous
/// picture is deleted once the new one is recorded.
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload = read_file_field(&mut multipart, "image").await?;
    let reference = state.files.save(UploadKind::ProfilePicture, &upload).await?;

    let stored = reference.clone();
    let result = blocking(&state, move |s| s.update_profile_picture(me.id(), &stored)).await;
    let (user, replaced) = match result {
        Ok(updated) => updated,
        Err(e) => {
            state.files.remove(&reference).await;
            return Err(e);
        }
    };

    if let Some(old) = replaced {
        state.files.remove(&old).await;
    }
    Ok(Json(user))
}
