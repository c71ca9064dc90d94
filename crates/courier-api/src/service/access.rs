use tracing::warn;
use uuid::Uuid;

use courier_db::models::{CommentRow, ConversationKind, ConversationRow, MessageRow};

use super::Service;
use crate::error::{ApiError, Result};

impl Service {
    /// True iff the user is a participant (private) or member (group).
    pub fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.db.is_member(conversation_id, user_id)?)
    }

    /// NotFound for a missing conversation, Forbidden for a non-member.
    pub fn ensure_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<()> {
        self.require_member(conversation_id, user_id).map(|_| ())
    }

    /// A missing conversation is reported before membership is considered.
    pub(super) fn conversation_row(&self, conversation_id: Uuid) -> Result<ConversationRow> {
        self.db
            .get_conversation(conversation_id)?
            .ok_or(ApiError::NotFound("conversation"))
    }

    pub(super) fn require_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<ConversationRow> {
        let conversation = self.conversation_row(conversation_id)?;
        if !self.is_member(conversation_id, user_id)? {
            warn!("User {} is not a member of {}", user_id, conversation_id);
            return Err(ApiError::Forbidden);
        }
        Ok(conversation)
    }

    pub(super) fn message_row(&self, message_id: Uuid) -> Result<MessageRow> {
        self.db.get_message(message_id)?.ok_or(ApiError::NotFound("message"))
    }

    pub(super) fn comment_row(&self, comment_id: Uuid) -> Result<CommentRow> {
        self.db.get_comment(comment_id)?.ok_or(ApiError::NotFound("comment"))
    }
}

pub(super) fn require_group(conversation: &ConversationRow) -> Result<()> {
    match conversation.kind {
        ConversationKind::Group => Ok(()),
        ConversationKind::Private => Err(ApiError::BadRequest("not a group conversation")),
    }
}
