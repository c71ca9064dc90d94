use tracing::info;
use uuid::Uuid;

use courier_db::DbError;
use courier_db::models::{MemberAddition, MemberRemoval};
use courier_types::models::{Conversation, ConversationSummary, GroupConversation, PrivateConversation};

use super::access::require_group;
use super::{Outcome, Service, char_len};
use crate::error::{ApiError, Result};

pub const MAX_GROUP_MEMBERS: usize = 100;
const GROUP_NAME_MAX: usize = 50;

/// What happened when someone left a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    Left,
    /// They were the last member; the group is gone. `photo` is the
    /// group's stored photo reference, now unreferenced.
    GroupDeleted { photo: Option<String> },
}

fn validate_group_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || char_len(name) > GROUP_NAME_MAX {
        return Err(ApiError::BadRequest("group name must be 1-50 characters"));
    }
    Ok(())
}

impl Service {
    /// Every conversation the user belongs to, most recently active first,
    /// without message history but with the latest message.
    pub fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let rows = self.db.conversations_for_user(user_id)?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let last_message = match self.db.latest_message(row.id)? {
                Some(m) => self.message_views(vec![m])?.pop(),
                None => None,
            };
            summaries.push(ConversationSummary {
                conversation: self.conversation_view(row, false)?,
                last_message,
            });
        }
        Ok(summaries)
    }

    /// Fetching a conversation marks every message in it not sent by the
    /// requester as read, once.
    pub fn get_conversation(&self, conversation_id: Uuid, requester: Uuid) -> Result<Conversation> {
        let row = self.require_member(conversation_id, requester)?;
        self.db.mark_conversation_read(conversation_id, requester, self.now())?;
        self.conversation_view(row, true)
    }

    /// Returns `Outcome::Existing` with the conversation already shared by
    /// the pair instead of creating a second one.
    pub fn create_private(&self, creator: Uuid, other: Uuid) -> Result<Outcome<PrivateConversation>> {
        if creator == other {
            return Err(ApiError::BadRequest("cannot start a conversation with yourself"));
        }
        self.get_user(other)?;

        if let Some(existing) = self.db.find_private_conversation(creator, other)? {
            return Ok(Outcome::Existing(self.private_view(existing)?));
        }

        let id = Uuid::new_v4();
        match self.db.create_private_conversation(id, creator, other, self.now()) {
            Ok(()) => {
                info!("Created private conversation {} ({} <-> {})", id, creator, other);
                Ok(Outcome::Created(self.private_view(id)?))
            }
            // A concurrent request for the same pair won the insert.
            Err(DbError::Conflict { .. }) => {
                let existing = self
                    .db
                    .find_private_conversation(creator, other)?
                    .ok_or(ApiError::Internal)?;
                Ok(Outcome::Existing(self.private_view(existing)?))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `member_ids` must already include the creator. Duplicates are collapsed.
    pub fn create_group(&self, name: &str, member_ids: &[Uuid]) -> Result<GroupConversation> {
        validate_group_name(name)?;

        let mut members: Vec<Uuid> = Vec::with_capacity(member_ids.len());
        for id in member_ids {
            if !members.contains(id) {
                members.push(*id);
            }
        }
        if members.is_empty() {
            return Err(ApiError::BadRequest("a group needs at least one member"));
        }
        if members.len() > MAX_GROUP_MEMBERS {
            return Err(ApiError::BadRequest("a group has at most 100 members"));
        }
        for id in &members {
            self.get_user(*id)?;
        }

        let id = Uuid::new_v4();
        self.db.create_group_conversation(id, name, &members, self.now())?;
        info!("Created group {} '{}' with {} members", id, name, members.len());
        self.group_view(id)
    }

    pub fn add_member(
        &self,
        conversation_id: Uuid,
        requester: Uuid,
        new_member: Uuid,
    ) -> Result<GroupConversation> {
        let row = self.require_member(conversation_id, requester)?;
        require_group(&row)?;
        self.get_user(new_member)?;

        // An existing membership surfaces as Conflict("member").
        match self.db.add_member(conversation_id, new_member, self.now(), MAX_GROUP_MEMBERS)? {
            MemberAddition::Added => {}
            MemberAddition::Full => return Err(ApiError::BadRequest("group is full")),
        }
        info!("User {} added {} to group {}", requester, new_member, conversation_id);
        self.group_view(conversation_id)
    }

    pub fn update_group_name(
        &self,
        conversation_id: Uuid,
        requester: Uuid,
        name: &str,
    ) -> Result<GroupConversation> {
        let row = self.require_member(conversation_id, requester)?;
        require_group(&row)?;
        validate_group_name(name)?;

        self.db.update_group_name(conversation_id, name)?;
        self.group_view(conversation_id)
    }

    /// Returns the updated group and the photo reference that was replaced.
    pub fn update_group_photo(
        &self,
        conversation_id: Uuid,
        requester: Uuid,
        photo: &str,
    ) -> Result<(GroupConversation, Option<String>)> {
        let row = self.require_member(conversation_id, requester)?;
        require_group(&row)?;

        let replaced = self.db.update_group_photo(conversation_id, photo)?;
        Ok((self.group_view(conversation_id)?, replaced))
    }

    /// Not being a member reads as absence: you cannot leave what you are not in.
    pub fn remove_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<Removal> {
        let row = self.conversation_row(conversation_id)?;
        require_group(&row)?;

        match self.db.remove_member(conversation_id, user_id)? {
            MemberRemoval::NotMember => Err(ApiError::NotFound("membership")),
            MemberRemoval::Removed => {
                info!("User {} left group {}", user_id, conversation_id);
                Ok(Removal::Left)
            }
            MemberRemoval::GroupDeleted { photo } => Ok(Removal::GroupDeleted { photo }),
        }
    }
}
