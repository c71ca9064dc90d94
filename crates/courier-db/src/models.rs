//! Row types read back from SQLite.
//! Distinct from courier-types API models to keep the DB layer independent.
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Private,
    Group,
}

impl ConversationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub conversation_id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub user: UserRow,
    pub joined_at: DateTime<Utc>,
}

/// A message joined with its sender and, if forwarded, the original's id.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserRow,
    pub content: Option<String>,
    pub attachment: Option<String>,
    pub reply_to: Option<Uuid>,
    pub original_message_id: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub message_id: Uuid,
    pub commenter: UserRow,
    pub emoji: String,
    pub commented_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrackingRow {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Outcome of adding someone to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAddition {
    Added,
    /// The group was already at capacity; nothing changed.
    Full,
}

/// Outcome of removing someone from a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRemoval {
    NotMember,
    Removed,
    /// The last member left; the group and its messages are gone.
    GroupDeleted { photo: Option<String> },
}

// -- Column codecs --

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => uuid_at(row, idx).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => time_at(row, idx).map(Some),
        None => Ok(None),
    }
}

/// Columns: id, username, profile_picture, created_at.
pub(crate) const USER_COLUMNS: usize = 4;

impl UserRow {
    pub(crate) fn from_row_at(row: &Row<'_>, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_at(row, start)?,
            username: row.get(start + 1)?,
            profile_picture: row.get(start + 2)?,
            created_at: time_at(row, start + 3)?,
        })
    }
}
