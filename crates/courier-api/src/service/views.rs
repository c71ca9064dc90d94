use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use courier_db::models::{
    CommentRow, ConversationKind, ConversationRow, MessageRow, TrackingRow, UserRow,
};
use courier_types::models::{
    Comment, Conversation, GroupConversation, GroupMember, Message, PrivateConversation, User,
};

use super::Service;
use crate::error::{ApiError, Result};

pub(super) fn user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        profile_picture: row.profile_picture,
        created_at: row.created_at,
    }
}

pub(super) fn comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        message_id: row.message_id,
        commenter: user(row.commenter),
        emoji: row.emoji,
        commented_at: row.commented_at,
    }
}

fn assemble(
    rows: Vec<MessageRow>,
    comment_rows: Vec<CommentRow>,
    tracking_rows: Vec<TrackingRow>,
) -> Vec<Message> {
    let mut comments: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for row in comment_rows {
        comments.entry(row.message_id).or_default().push(comment(row));
    }

    let mut read_by: HashMap<Uuid, BTreeMap<Uuid, DateTime<Utc>>> = HashMap::new();
    for row in tracking_rows {
        read_by.entry(row.message_id).or_default().insert(row.user_id, row.read_at);
    }

    rows
        .into_iter()
        .map(|row| Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender: user(row.sender),
            content: row.content,
            attachment: row.attachment,
            reply_to: row.reply_to,
            is_forwarded: row.original_message_id.is_some(),
            original_message_id: row.original_message_id,
            comments: comments.remove(&row.id).unwrap_or_default(),
            read_by: read_by.remove(&row.id).unwrap_or_default(),
            sent_at: row.sent_at,
            edited_at: row.edited_at,
        })
        .collect()
}

impl Service {
    /// Attaches comments and read trackings to a handful of message rows,
    /// fetched by id.
    pub(super) fn message_views(&self, rows: Vec<MessageRow>) -> Result<Vec<Message>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let comments = self.db.get_comments_for_messages(&ids)?;
        let trackings = self.db.get_trackings_for_messages(&ids)?;
        Ok(assemble(rows, comments, trackings))
    }

    /// Every message of a conversation with its comments and read trackings,
    /// filtered by conversation so the query size does not grow with it.
    fn conversation_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let rows = self.db.get_messages(conversation_id)?;
        let comments = self.db.get_comments_for_conversation(conversation_id)?;
        let trackings = self.db.get_trackings_for_conversation(conversation_id)?;
        Ok(assemble(rows, comments, trackings))
    }

    pub(super) fn message_view(&self, message_id: Uuid) -> Result<Message> {
        let row = self.message_row(message_id)?;
        self.message_views(vec![row])?
            .pop()
            .ok_or(ApiError::Internal)
    }

    pub(super) fn conversation_view(
        &self,
        row: ConversationRow,
        with_messages: bool,
    ) -> Result<Conversation> {
        let messages = if with_messages {
            self.conversation_messages(row.id)?
        } else {
            Vec::new()
        };

        match row.kind {
            ConversationKind::Private => {
                let participants: Vec<User> = self
                    .db
                    .get_participants(row.id)?
                    .into_iter()
                    .map(user)
                    .collect();
                let participants: [User; 2] = participants.try_into().map_err(|p: Vec<User>| {
                    error!("Private conversation {} has {} participants", row.id, p.len());
                    ApiError::Internal
                })?;
                Ok(Conversation::Private(PrivateConversation {
                    id: row.id,
                    participants,
                    messages,
                    created_at: row.created_at,
                }))
            }
            ConversationKind::Group => {
                let group = self.db.get_group(row.id)?.ok_or_else(|| {
                    error!("Group conversation {} has no group row", row.id);
                    ApiError::Internal
                })?;
                let members = self
                    .db
                    .get_members(row.id)?
                    .into_iter()
                    .map(|m| GroupMember {
                        user: user(m.user),
                        joined_at: m.joined_at,
                    })
                    .collect();
                Ok(Conversation::Group(GroupConversation {
                    id: row.id,
                    name: group.name,
                    photo: group.photo,
                    members,
                    messages,
                    created_at: row.created_at,
                }))
            }
        }
    }

    pub(super) fn private_view(&self, conversation_id: Uuid) -> Result<PrivateConversation> {
        let row = self.conversation_row(conversation_id)?;
        match self.conversation_view(row, true)? {
            Conversation::Private(c) => Ok(c),
            Conversation::Group(_) => Err(ApiError::Internal),
        }
    }

    pub(super) fn group_view(&self, conversation_id: Uuid) -> Result<GroupConversation> {
        let row = self.conversation_row(conversation_id)?;
        match self.conversation_view(row, true)? {
            Conversation::Group(c) => Ok(c),
            Conversation::Private(_) => Err(ApiError::Internal),
        }
    }
}
