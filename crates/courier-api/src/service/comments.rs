use tracing::info;
use uuid::Uuid;

use courier_types::models::Comment;

use super::Service;
use super::views::comment;
use crate::error::{ApiError, Result};

/// Exactly one emoji, as known to the Unicode emoji tables.
fn validate_emoji(emoji: &str) -> Result<()> {
    match emojis::get(emoji) {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest("comment must be a single emoji")),
    }
}

impl Service {
    /// One comment per user per message.
    pub fn create_comment(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<Comment> {
        let message = self.message_row(message_id)?;
        self.require_member(message.conversation_id, user_id)?;
        if self.db.has_commented(message_id, user_id)? {
            return Err(ApiError::Conflict("comment"));
        }
        validate_emoji(emoji)?;

        let id = Uuid::new_v4();
        self.db.insert_comment(id, message_id, user_id, emoji, self.now())?;
        info!("User {} commented {} on {}", user_id, emoji, message_id);
        Ok(comment(self.comment_row(id)?))
    }

    pub fn delete_comment(&self, comment_id: Uuid, requester: Uuid) -> Result<()> {
        let row = self.comment_row(comment_id)?;
        let message = self.message_row(row.message_id)?;
        self.require_member(message.conversation_id, requester)?;
        if row.commenter.id != requester {
            return Err(ApiError::Forbidden);
        }
        if !self.db.delete_comment(comment_id)? {
            return Err(ApiError::NotFound("comment"));
        }
        Ok(())
    }
}
