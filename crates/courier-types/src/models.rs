use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A group member together with the moment they joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(flatten)]
    pub user: User,
    pub joined_at: DateTime<Utc>,
}

/// A single emoji reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub commenter: User,
    pub emoji: String,
    pub commented_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    /// Derived from the forward link table, never stored on the message row.
    pub is_forwarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message_id: Option<Uuid>,
    pub comments: Vec<Comment>,
    /// user id -> first time that user fetched the conversation containing this message
    pub read_by: BTreeMap<Uuid, DateTime<Utc>>,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateConversation {
    pub id: Uuid,
    pub participants: [User; 2],
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConversation {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub members: Vec<GroupMember>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

/// Conversations are either private (exactly two participants, fixed) or
/// group (named, mutable membership). The variant never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Conversation {
    Private(PrivateConversation),
    Group(GroupConversation),
}

impl Conversation {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Private(c) => c.id,
            Self::Group(c) => c.id,
        }
    }

    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Private(c) => &c.messages,
            Self::Group(c) => &c.messages,
        }
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        match self {
            Self::Private(c) => c.participants.iter().any(|p| p.id == user_id),
            Self::Group(c) => c.members.iter().any(|m| m.user.id == user_id),
        }
    }
}

/// Entry in a user's conversation list: the conversation without its message
/// history, plus the most recent message if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}
