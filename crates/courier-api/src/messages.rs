use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::warn;
use uuid::Uuid;

use courier_types::api::{EditMessageRequest, ForwardMessageRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, Result};
use crate::files::{Upload, UploadKind};
use crate::middleware::AuthUser;
use crate::service::MessageDraft;

/// The fields of a message submission, as read off the multipart body.
#[derive(Debug, Default)]
struct MessageForm {
    content: Option<String>,
    reply_to: Option<Uuid>,
    attachment: Option<Upload>,
}

async fn read_message_form(multipart: &mut Multipart) -> Result<MessageForm> {
    let mut form = MessageForm::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("content") => form.content = Some(field.text().await?),
            Some("reply_to") => {
                let raw = field.text().await?;
                if !raw.is_empty() {
                    let id = raw.parse().map_err(|_| ApiError::BadRequest("reply_to is not a valid id"))?;
                    form.reply_to = Some(id);
                }
            }
            Some("attachment") => {
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await?;
                form.attachment = Some(Upload { file_name, bytes });
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }
    Ok(form)
}

/// POST /conversations/{id}/messages: multipart with optional `content`,
/// `reply_to` and `attachment` fields; content or attachment is required.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let sender = me.id();
    blocking(&state, move |s| s.ensure_member(conversation_id, sender)).await?;

    let form = read_message_form(&mut multipart).await?;
    let attachment = match &form.attachment {
        Some(upload) => Some(state.files.save(UploadKind::Attachment, upload).await?),
        None => None,
    };

    let draft = MessageDraft {
        content: form.content,
        attachment: attachment.clone(),
        reply_to: form.reply_to,
    };
    match blocking(&state, move |s| s.create_message(conversation_id, sender, draft)).await {
        Ok(message) => Ok((StatusCode::CREATED, Json(message))),
        Err(e) => {
            if let Some(reference) = attachment {
                state.files.remove(&reference).await;
            }
            Err(e)
        }
    }
}

pub async fn forward_message(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ForwardMessageRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let message = blocking(&state, move |s| {
        s.forward_message(conversation_id, me.id(), req.message_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<EditMessageRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let message = blocking(&state, move |s| s.edit_message(message_id, me.id(), &req.content)).await?;
    Ok(Json(message))
}

/// DELETE /messages/{id}. The attachment file goes too, unless a forwarded
/// copy still points at it.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse> {
    let released = blocking(&state, move |s| s.delete_message(message_id, me.id())).await?;
    if let Some(reference) = released {
        state.files.remove(&reference).await;
    }
    Ok(StatusCode::NO_CONTENT)
}
