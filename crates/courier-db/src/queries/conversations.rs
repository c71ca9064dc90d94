use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::models::{
    ConversationKind, ConversationRow, GroupRow, MemberAddition, MemberRemoval, MemberRow, USER_COLUMNS, UserRow,
    format_timestamp, time_at, uuid_at,
};
use crate::queries::messages::{PurgeScope, purge_messages};
use crate::{Database, DbError, Result};

impl Database {
    pub fn get_conversation(&self, id: Uuid) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    pub fn get_group(&self, id: Uuid) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT conversation_id, name, photo FROM group_conversations WHERE conversation_id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(GroupRow {
                            conversation_id: uuid_at(row, 0)?,
                            name: row.get(1)?,
                            photo: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_participants(&self, conversation_id: Uuid) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.profile_picture, u.created_at
                 FROM participants p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.conversation_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([conversation_id.to_string()], |row| UserRow::from_row_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_members(&self, conversation_id: Uuid) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.profile_picture, u.created_at, m.joined_at
                 FROM members m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.joined_at, u.username",
            )?;
            let rows = stmt
                .query_map([conversation_id.to_string()], |row| {
                    Ok(MemberRow {
                        user: UserRow::from_row_at(row, 0)?,
                        joined_at: time_at(row, USER_COLUMNS)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// True iff the user is a private participant or a group member.
    pub fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM participants WHERE conversation_id = ?1 AND user_id = ?2
                     UNION ALL
                     SELECT 1 FROM members WHERE conversation_id = ?1 AND user_id = ?2
                     LIMIT 1",
                    (conversation_id.to_string(), user_id.to_string()),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn member_count(&self, conversation_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM members WHERE conversation_id = ?1",
                [conversation_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn find_private_conversation(&self, a: Uuid, b: Uuid) -> Result<Option<Uuid>> {
        let (low, high) = ordered_pair(a, b);
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT conversation_id FROM private_conversations WHERE user_low = ?1 AND user_high = ?2",
                    (low, high),
                    |row| uuid_at(row, 0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Inserts the conversation, its private marker and both participants in
    /// one transaction. A second conversation for the same pair fails with
    /// `DbError::Conflict`.
    pub fn create_private_conversation(
        &self,
        id: Uuid,
        a: Uuid,
        b: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let (low, high) = ordered_pair(a, b);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_conversation(&tx, id, ConversationKind::Private, created_at)?;
            tx.execute(
                "INSERT INTO private_conversations (conversation_id, user_low, user_high) VALUES (?1, ?2, ?3)",
                (id.to_string(), &low, &high),
            )
            .map_err(|e| DbError::unique(e, "private conversation"))?;
            for user_id in [&low, &high] {
                tx.execute(
                    "INSERT INTO participants (conversation_id, user_id) VALUES (?1, ?2)",
                    (id.to_string(), user_id),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn create_group_conversation(
        &self,
        id: Uuid,
        name: &str,
        member_ids: &[Uuid],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_conversation(&tx, id, ConversationKind::Group, created_at)?;
            tx.execute(
                "INSERT INTO group_conversations (conversation_id, name) VALUES (?1, ?2)",
                (id.to_string(), name),
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO members (conversation_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                )?;
                for user_id in member_ids {
                    stmt.execute((id.to_string(), user_id.to_string(), format_timestamp(created_at)))
                        .map_err(|e| DbError::unique(e, "member"))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Adds a member unless the group already holds `capacity` of them. The
    /// count and the insert share one transaction, so concurrent adds cannot
    /// overshoot. An existing membership is `DbError::Conflict`.
    pub fn add_member(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
        capacity: usize,
    ) -> Result<MemberAddition> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let cid = conversation_id.to_string();

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM members WHERE conversation_id = ?1",
                [&cid],
                |row| row.get(0),
            )?;
            if count as usize >= capacity {
                return Ok(MemberAddition::Full);
            }

            tx.execute(
                "INSERT INTO members (conversation_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                (&cid, user_id.to_string(), format_timestamp(joined_at)),
            )
            .map_err(|e| DbError::unique(e, "member"))?;
            tx.commit()?;
            Ok(MemberAddition::Added)
        })
    }

    pub fn update_group_name(&self, conversation_id: Uuid, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE group_conversations SET name = ?1 WHERE conversation_id = ?2",
                (name, conversation_id.to_string()),
            )?;
            Ok(())
        })
    }

    /// Sets the new photo reference and returns the one it replaced.
    pub fn update_group_photo(&self, conversation_id: Uuid, photo: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let old: Option<String> = tx
                .query_row(
                    "SELECT photo FROM group_conversations WHERE conversation_id = ?1",
                    [conversation_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE group_conversations SET photo = ?1 WHERE conversation_id = ?2",
                (photo, conversation_id.to_string()),
            )?;
            tx.commit()?;
            Ok(old)
        })
    }

    /// Removes one membership row. If that leaves the group empty, the group,
    /// its messages and everything hanging off them are deleted in the same
    /// transaction.
    pub fn remove_member(&self, conversation_id: Uuid, user_id: Uuid) -> Result<MemberRemoval> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let cid = conversation_id.to_string();

            let removed = tx.execute(
                "DELETE FROM members WHERE conversation_id = ?1 AND user_id = ?2",
                (&cid, user_id.to_string()),
            )?;
            if removed == 0 {
                return Ok(MemberRemoval::NotMember);
            }

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM members WHERE conversation_id = ?1",
                [&cid],
                |row| row.get(0),
            )?;
            if remaining > 0 {
                tx.commit()?;
                return Ok(MemberRemoval::Removed);
            }

            let photo: Option<String> = tx
                .query_row(
                    "SELECT photo FROM group_conversations WHERE conversation_id = ?1",
                    [&cid],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            let purged = purge_messages(&tx, PurgeScope::Conversation, &cid)?;
            tx.execute("DELETE FROM group_conversations WHERE conversation_id = ?1", [&cid])?;
            tx.execute("DELETE FROM conversations WHERE id = ?1", [&cid])?;
            tx.commit()?;

            info!("Deleted empty group {} ({} messages)", conversation_id, purged);
            Ok(MemberRemoval::GroupDeleted { photo })
        })
    }

    /// Conversations the user belongs to, most recently active first
    /// (last message time, falling back to creation time).
    pub fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.kind, c.created_at
                 FROM conversations c
                 WHERE c.id IN (
                     SELECT conversation_id FROM participants WHERE user_id = ?1
                     UNION
                     SELECT conversation_id FROM members WHERE user_id = ?1
                 )
                 ORDER BY COALESCE(
                     (SELECT MAX(m.sent_at) FROM messages m WHERE m.conversation_id = c.id),
                     c.created_at
                 ) DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn ordered_pair(a: Uuid, b: Uuid) -> (String, String) {
    let (a, b) = (a.to_string(), b.to_string());
    if a <= b { (a, b) } else { (b, a) }
}

fn insert_conversation(
    conn: &Connection,
    id: Uuid,
    kind: ConversationKind,
    created_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, kind, created_at) VALUES (?1, ?2, ?3)",
        (id.to_string(), kind.as_str(), format_timestamp(created_at)),
    )?;
    Ok(())
}

pub(crate) fn query_conversation(conn: &Connection, id: Uuid) -> Result<Option<ConversationRow>> {
    let row = conn
        .query_row(
            "SELECT id, kind, created_at FROM conversations WHERE id = ?1",
            [id.to_string()],
            conversation_from_row,
        )
        .optional()?;
    Ok(row)
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    let kind: String = row.get(1)?;
    let kind = match kind.as_str() {
        "private" => ConversationKind::Private,
        "group" => ConversationKind::Group,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                1,
                format!("kind={other}"),
                rusqlite::types::Type::Text,
            ));
        }
    };
    Ok(ConversationRow {
        id: uuid_at(row, 0)?,
        kind,
        created_at: time_at(row, 2)?,
    })
}
