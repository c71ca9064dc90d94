use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;

// -- Session --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
}

/// The identifier doubles as the bearer token for every other route.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub identifier: Uuid,
    pub user: User,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetUsernameRequest {
    pub username: String,
}

// -- Conversations --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

/// `user_id` is the counterpart of a private conversation, `name` and
/// `members` describe a group. The creator is implied by the bearer token.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetGroupNameRequest {
    pub name: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub message_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub content: String,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
