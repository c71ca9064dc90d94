use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::placeholders;
use crate::models::{
    MessageRow, TrackingRow, USER_COLUMNS, UserRow, format_timestamp, opt_time_at, opt_uuid_at,
    time_at, uuid_at,
};
use crate::{Database, Result};

// JOIN users to fetch the sender in a single query (eliminates N+1)
const SELECT_MESSAGE: &str = "SELECT m.id, m.conversation_id,
        u.id, u.username, u.profile_picture, u.created_at,
        m.content, m.attachment, m.reply_to, f.original_message_id, m.sent_at, m.edited_at
     FROM messages m
     JOIN users u ON m.sender_id = u.id
     LEFT JOIN forwarded_messages f ON f.forwarded_message_id = m.id";

pub struct NewMessage<'a> {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<&'a str>,
    pub attachment: Option<&'a str>,
    pub reply_to: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
}

/// Which rows `purge_messages` deletes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PurgeScope {
    Message,
    Conversation,
}

impl Database {
    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<()> {
        self.with_conn(|conn| insert_message_row(conn, msg))
    }

    /// Inserts the copy and its provenance link atomically.
    pub fn insert_forwarded_message(&self, msg: &NewMessage<'_>, original_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_message_row(&tx, msg)?;
            tx.execute(
                "INSERT INTO forwarded_messages (forwarded_message_id, original_message_id, forwarded_at)
                 VALUES (?1, ?2, ?3)",
                (msg.id.to_string(), original_id.to_string(), format_timestamp(msg.sent_at)),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{SELECT_MESSAGE} WHERE m.id = ?1"),
                    [id.to_string()],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All messages of a conversation, oldest first.
    pub fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_MESSAGE} WHERE m.conversation_id = ?1 ORDER BY m.sent_at ASC, m.rowid ASC"
            ))?;
            let rows = stmt
                .query_map([conversation_id.to_string()], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn latest_message(&self, conversation_id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "{SELECT_MESSAGE} WHERE m.conversation_id = ?1
                         ORDER BY m.sent_at DESC, m.rowid DESC LIMIT 1"
                    ),
                    [conversation_id.to_string()],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET content = ?1, edited_at = ?2 WHERE id = ?3",
                (content, format_timestamp(edited_at), id.to_string()),
            )?;
            Ok(())
        })
    }

    /// Deletes a message together with its read trackings, forward links and
    /// comments. Returns false if the message did not exist.
    pub fn delete_message(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = purge_messages(&tx, PurgeScope::Message, &id.to_string())?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    /// Records `read_at` for every message in the conversation not sent by
    /// `user_id` and not already tracked for them. Existing rows are left as-is.
    pub fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO message_trackings (message_id, user_id, read_at)
                 SELECT m.id, ?2, ?3 FROM messages m
                 WHERE m.conversation_id = ?1 AND m.sender_id != ?2",
                (conversation_id.to_string(), user_id.to_string(), format_timestamp(read_at)),
            )?;
            Ok(inserted)
        })
    }

    /// Read trackings for every message of one conversation. Unlike
    /// `get_trackings_for_messages` this binds one variable, so it works for
    /// conversations of any size.
    pub fn get_trackings_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<TrackingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.message_id, t.user_id, t.read_at
                 FROM message_trackings t
                 JOIN messages m ON m.id = t.message_id
                 WHERE m.conversation_id = ?1",
            )?;
            let rows = stmt
                .query_map([conversation_id.to_string()], tracking_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Whether any message still points at this stored file.
    pub fn attachment_in_use(&self, reference: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM messages WHERE attachment = ?1 LIMIT 1",
                    [reference],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Batch-fetch read trackings for a set of message IDs.
    pub fn get_trackings_for_messages(&self, message_ids: &[Uuid]) -> Result<Vec<TrackingRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, read_at FROM message_trackings WHERE message_id IN ({})",
                placeholders(1, message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids: Vec<String> = message_ids.iter().map(Uuid::to_string).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), tracking_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn tracking_from_row(row: &Row<'_>) -> rusqlite::Result<TrackingRow> {
    Ok(TrackingRow {
        message_id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        read_at: time_at(row, 2)?,
    })
}

fn insert_message_row(conn: &Connection, msg: &NewMessage<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, attachment, reply_to, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            msg.id.to_string(),
            msg.conversation_id.to_string(),
            msg.sender_id.to_string(),
            msg.content,
            msg.attachment,
            msg.reply_to.map(|id| id.to_string()),
            format_timestamp(msg.sent_at),
        ),
    )?;
    Ok(())
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let after_user = 2 + USER_COLUMNS;
    Ok(MessageRow {
        id: uuid_at(row, 0)?,
        conversation_id: uuid_at(row, 1)?,
        sender: UserRow::from_row_at(row, 2)?,
        content: row.get(after_user)?,
        attachment: row.get(after_user + 1)?,
        reply_to: opt_uuid_at(row, after_user + 2)?,
        original_message_id: opt_uuid_at(row, after_user + 3)?,
        sent_at: time_at(row, after_user + 4)?,
        edited_at: opt_time_at(row, after_user + 5)?,
    })
}

/// Deletes messages in dependency order: read trackings, forward links
/// (in either direction), comments, then the message rows. Must run inside
/// the caller's transaction. Returns the number of messages deleted.
pub(crate) fn purge_messages(conn: &Connection, scope: PurgeScope, key: &str) -> Result<usize> {
    let filter = match scope {
        PurgeScope::Message => "id = ?1",
        PurgeScope::Conversation => "conversation_id = ?1",
    };
    let ids = format!("SELECT id FROM messages WHERE {filter}");

    conn.execute(
        &format!("DELETE FROM message_trackings WHERE message_id IN ({ids})"),
        [key],
    )?;
    conn.execute(
        &format!(
            "DELETE FROM forwarded_messages
             WHERE forwarded_message_id IN ({ids}) OR original_message_id IN ({ids})"
        ),
        [key],
    )?;
    conn.execute(&format!("DELETE FROM comments WHERE message_id IN ({ids})"), [key])?;
    let deleted = conn.execute(&format!("DELETE FROM messages WHERE {filter}"), [key])?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, ts, user};

    fn text<'a>(conversation_id: Uuid, sender_id: Uuid, content: &'a str, at: i64) -> NewMessage<'a> {
        NewMessage {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: Some(content),
            attachment: None,
            reply_to: None,
            sent_at: ts(at),
        }
    }

    #[test]
    fn mark_read_skips_sender_and_is_idempotent() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let conv = Uuid::new_v4();
        db.create_private_conversation(conv, a, b, ts(0)).unwrap();

        let from_a = text(conv, a, "hi", 1);
        let from_b = text(conv, b, "hey", 2);
        db.insert_message(&from_a).unwrap();
        db.insert_message(&from_b).unwrap();

        assert_eq!(db.mark_conversation_read(conv, b, ts(10)).unwrap(), 1);
        assert_eq!(db.mark_conversation_read(conv, b, ts(20)).unwrap(), 0);

        let trackings = db.get_trackings_for_messages(&[from_a.id, from_b.id]).unwrap();
        assert_eq!(trackings.len(), 1);
        assert_eq!(trackings[0].message_id, from_a.id);
        assert_eq!(trackings[0].user_id, b);
        assert_eq!(trackings[0].read_at, ts(10));
    }

    #[test]
    fn conversation_trackings_past_the_bound_variable_limit() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let conv = Uuid::new_v4();
        db.create_private_conversation(conv, a, b, ts(0)).unwrap();

        // SQLite caps a statement at 32766 bound variables.
        let count = 33_000;
        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for i in 0..count {
                insert_message_row(&tx, &text(conv, a, "spam", i))?;
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.mark_conversation_read(conv, b, ts(count + 1)).unwrap(), count as usize);
        let trackings = db.get_trackings_for_conversation(conv).unwrap();
        assert_eq!(trackings.len(), count as usize);
        assert!(trackings.iter().all(|t| t.user_id == b));

        let other = Uuid::new_v4();
        db.create_group_conversation(other, "quiet", &[a], ts(0)).unwrap();
        assert!(db.get_trackings_for_conversation(other).unwrap().is_empty());
    }

    #[test]
    fn attachment_in_use_until_last_reference_goes() {
        let db = db();
        let a = user(&db, "alice");
        let group = Uuid::new_v4();
        db.create_group_conversation(group, "team", &[a], ts(0)).unwrap();

        let mut original = text(group, a, "pic", 1);
        original.attachment = Some("/uploads/attachments/cat.png");
        db.insert_message(&original).unwrap();
        let mut copy = text(group, a, "pic", 2);
        copy.attachment = original.attachment;
        db.insert_forwarded_message(&copy, original.id).unwrap();

        db.delete_message(original.id).unwrap();
        assert!(db.attachment_in_use("/uploads/attachments/cat.png").unwrap());
        db.delete_message(copy.id).unwrap();
        assert!(!db.attachment_in_use("/uploads/attachments/cat.png").unwrap());
    }

    #[test]
    fn forwarded_message_carries_original_id() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let conv = Uuid::new_v4();
        db.create_private_conversation(conv, a, b, ts(0)).unwrap();
        let group = Uuid::new_v4();
        db.create_group_conversation(group, "team", &[a], ts(0)).unwrap();

        let original = text(conv, a, "hi", 1);
        db.insert_message(&original).unwrap();
        let copy = text(group, a, "hi", 2);
        db.insert_forwarded_message(&copy, original.id).unwrap();

        let row = db.get_message(copy.id).unwrap().unwrap();
        assert_eq!(row.original_message_id, Some(original.id));
        assert_eq!(row.sender.username, "alice");
        assert!(db.get_message(original.id).unwrap().unwrap().original_message_id.is_none());
    }

    #[test]
    fn delete_cascades_in_dependency_order() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let conv = Uuid::new_v4();
        db.create_private_conversation(conv, a, b, ts(0)).unwrap();

        let original = text(conv, a, "hi", 1);
        db.insert_message(&original).unwrap();
        let copy = text(conv, b, "hi", 2);
        db.insert_forwarded_message(&copy, original.id).unwrap();
        let mut reply = text(conv, b, "re", 3);
        reply.reply_to = Some(original.id);
        db.insert_message(&reply).unwrap();
        db.mark_conversation_read(conv, b, ts(4)).unwrap();
        db.insert_comment(Uuid::new_v4(), original.id, b, "👍", ts(5)).unwrap();

        assert!(db.delete_message(original.id).unwrap());
        assert!(!db.delete_message(original.id).unwrap());

        // The copy outlives the original but loses its provenance link.
        let copy_row = db.get_message(copy.id).unwrap().unwrap();
        assert!(copy_row.original_message_id.is_none());
        assert!(db.get_message(reply.id).unwrap().unwrap().reply_to.is_none());
        assert!(db.get_comments_for_messages(&[original.id]).unwrap().is_empty());
    }

    #[test]
    fn messages_are_returned_oldest_first() {
        let db = db();
        let a = user(&db, "alice");
        let group = Uuid::new_v4();
        db.create_group_conversation(group, "team", &[a], ts(0)).unwrap();

        let second = text(group, a, "second", 2);
        let first = text(group, a, "first", 1);
        db.insert_message(&second).unwrap();
        db.insert_message(&first).unwrap();

        let contents: Vec<_> = db
            .get_messages(group)
            .unwrap()
            .into_iter()
            .map(|m| m.content.unwrap())
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(db.latest_message(group).unwrap().unwrap().id, second.id);
    }
}
