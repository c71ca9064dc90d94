use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use courier_types::api::{AddMemberRequest, ConversationKind, CreateConversationRequest, SetGroupNameRequest};
use courier_types::models::Conversation;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, Result};
use crate::files::{UploadKind, read_file_field};
use crate::middleware::AuthUser;
use crate::service::Removal;

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let summaries = blocking(&state, move |s| s.list_conversations(me.id())).await?;
    Ok(Json(summaries))
}

/// POST /conversations. A second private conversation with the same person
/// answers 409 with the one that already exists.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<CreateConversationRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let creator = me.id();

    match req.kind {
        ConversationKind::Private => {
            if req.name.is_some() || !req.members.is_empty() {
                return Err(ApiError::BadRequest("private conversations take only user_id"));
            }
            let other = req.user_id.ok_or(ApiError::BadRequest("user_id is required"))?;

            let outcome = blocking(&state, move |s| s.create_private(creator, other)).await?;
            let status = if outcome.is_created() {
                StatusCode::CREATED
            } else {
                StatusCode::CONFLICT
            };
            let conversation = Conversation::Private(outcome.into_inner());
            Ok((status, Json(conversation)))
        }
        ConversationKind::Group => {
            if req.user_id.is_some() {
                return Err(ApiError::BadRequest("group conversations take members, not user_id"));
            }
            let name = req.name.ok_or(ApiError::BadRequest("name is required"))?;
            let mut members = Vec::with_capacity(req.members.len() + 1);
            members.push(creator);
            members.extend(req.members);

            let group = blocking(&state, move |s| s.create_group(&name, &members)).await?;
            Ok((StatusCode::CREATED, Json(Conversation::Group(group))))
        }
    }
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse> {
    let conversation = blocking(&state, move |s| s.get_conversation(conversation_id, me.id())).await?;
    Ok(Json(conversation))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<AddMemberRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let group = blocking(&state, move |s| s.add_member(conversation_id, me.id(), req.user_id)).await?;
    Ok((StatusCode::CREATED, Json(Conversation::Group(group))))
}

/// DELETE /conversations/{id}/members/me. The last member out takes the
/// group, its messages and its photo with them.
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse> {
    let removal = blocking(&state, move |s| s.remove_member(conversation_id, me.id())).await?;

    if let Removal::GroupDeleted { photo } = removal {
        info!("Group {} deleted after its last member left", conversation_id);
        if let Some(photo) = photo {
            state.files.remove(&photo).await;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_group_name(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<SetGroupNameRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let group = blocking(&state, move |s| s.update_group_name(conversation_id, me.id(), &req.name)).await?;
    Ok(Json(Conversation::Group(group)))
}

/// PUT /conversations/{id}/photo: multipart with an `image` file field.
pub async fn update_group_photo(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    // Checked before the upload is read so non-members never write to disk.
    let requester = me.id();
    blocking(&state, move |s| s.ensure_member(conversation_id, requester)).await?;

    let upload = read_file_field(&mut multipart, "image").await?;
    let reference = state.files.save(UploadKind::GroupPhoto, &upload).await?;

    let stored = reference.clone();
    let result = blocking(&state, move |s| s.update_group_photo(conversation_id, requester, &stored)).await;
    let (group, replaced) = match result {
        Ok(updated) => updated,
        Err(e) => {
            state.files.remove(&reference).await;
            return Err(e);
        }
    };

    if let Some(old) = replaced {
        state.files.remove(&old).await;
    }
    Ok(Json(Conversation::Group(group)))
}
