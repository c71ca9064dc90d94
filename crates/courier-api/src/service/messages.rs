use tracing::{info, warn};
use uuid::Uuid;

use courier_db::NewMessage;
use courier_types::models::Message;

use super::{Service, char_len};
use crate::error::{ApiError, Result};

const CONTENT_MAX: usize = 1000;

/// A message as submitted, before any rules are applied.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub content: Option<String>,
    /// Stored file reference, already written by the file store.
    pub attachment: Option<String>,
    pub reply_to: Option<Uuid>,
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() || char_len(content) > CONTENT_MAX {
        return Err(ApiError::BadRequest("content must be 1-1000 characters"));
    }
    Ok(())
}

impl Service {
    pub fn create_message(&self, conversation_id: Uuid, sender_id: Uuid, draft: MessageDraft) -> Result<Message> {
        self.require_member(conversation_id, sender_id)?;

        let content = draft.content.filter(|c| !c.is_empty());
        if content.is_none() && draft.attachment.is_none() {
            return Err(ApiError::BadRequest("message needs content or an attachment"));
        }
        if let Some(c) = &content {
            validate_content(c)?;
        }
        if let Some(reply_to) = draft.reply_to {
            match self.db.get_message(reply_to)? {
                Some(target) if target.conversation_id == conversation_id => {}
                _ => return Err(ApiError::BadRequest("reply target is not in this conversation")),
            }
        }

        let id = Uuid::new_v4();
        self.db.insert_message(&NewMessage {
            id,
            conversation_id,
            sender_id,
            content: content.as_deref(),
            attachment: draft.attachment.as_deref(),
            reply_to: draft.reply_to,
            sent_at: self.now(),
        })?;
        self.message_view(id)
    }

    /// Copies the original's content and attachment into a new message in the
    /// target conversation. Access to both conversations is checked separately.
    pub fn forward_message(&self, target_id: Uuid, sender_id: Uuid, original_id: Uuid) -> Result<Message> {
        self.require_member(target_id, sender_id)?;
        let original = self.message_row(original_id)?;
        if !self.is_member(original.conversation_id, sender_id)? {
            warn!(
                "User {} tried to forward {} from a conversation they are not in",
                sender_id, original_id
            );
            return Err(ApiError::Forbidden);
        }

        let id = Uuid::new_v4();
        self.db.insert_forwarded_message(
            &NewMessage {
                id,
                conversation_id: target_id,
                sender_id,
                content: original.content.as_deref(),
                attachment: original.attachment.as_deref(),
                reply_to: None,
                sent_at: self.now(),
            },
            original_id,
        )?;
        info!("User {} forwarded {} into {} as {}", sender_id, original_id, target_id, id);
        self.message_view(id)
    }

    pub fn edit_message(&self, message_id: Uuid, requester: Uuid, content: &str) -> Result<Message> {
        let message = self.message_row(message_id)?;
        self.require_member(message.conversation_id, requester)?;
        if message.sender.id != requester {
            return Err(ApiError::Forbidden);
        }
        if message.original_message_id.is_some() {
            return Err(ApiError::BadRequest("forwarded messages cannot be edited"));
        }
        validate_content(content)?;

        self.db.update_message_content(message_id, content, self.now())?;
        self.message_view(message_id)
    }

    /// Returns the deleted message's attachment reference once no other
    /// message (a forwarded copy, say) still points at it. The caller owns
    /// removing the file.
    pub fn delete_message(&self, message_id: Uuid, requester: Uuid) -> Result<Option<String>> {
        let message = self.message_row(message_id)?;
        self.require_member(message.conversation_id, requester)?;
        if message.sender.id != requester {
            return Err(ApiError::Forbidden);
        }

        if !self.db.delete_message(message_id)? {
            return Err(ApiError::NotFound("message"));
        }
        info!("User {} deleted message {}", requester, message_id);

        let released = match message.attachment {
            Some(reference) if !self.db.attachment_in_use(&reference)? => Some(reference),
            _ => None,
        };
        Ok(released)
    }
}
