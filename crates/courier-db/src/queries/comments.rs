use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::placeholders;
use crate::models::{CommentRow, USER_COLUMNS, UserRow, format_timestamp, time_at, uuid_at};
use crate::{Database, DbError, Result};

const SELECT_COMMENT: &str = "SELECT c.id, c.message_id,
        u.id, u.username, u.profile_picture, u.created_at,
        c.emoji, c.commented_at
     FROM comments c
     JOIN users u ON c.user_id = u.id";

impl Database {
    /// One comment per (message, user); a second one is `DbError::Conflict`.
    pub fn insert_comment(
        &self,
        id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
        commented_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, message_id, user_id, emoji, commented_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    id.to_string(),
                    message_id.to_string(),
                    user_id.to_string(),
                    emoji,
                    format_timestamp(commented_at),
                ),
            )
            .map_err(|e| DbError::unique(e, "comment"))?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{SELECT_COMMENT} WHERE c.id = ?1"),
                    [id.to_string()],
                    comment_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn has_commented(&self, message_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM comments WHERE message_id = ?1 AND user_id = ?2",
                    (message_id.to_string(), user_id.to_string()),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Batch-fetch comments for a set of message IDs, oldest first.
    pub fn get_comments_for_messages(&self, message_ids: &[Uuid]) -> Result<Vec<CommentRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "{SELECT_COMMENT} WHERE c.message_id IN ({}) ORDER BY c.commented_at ASC",
                placeholders(1, message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids: Vec<String> = message_ids.iter().map(Uuid::to_string).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every comment on every message of one conversation, oldest first.
    /// Binds a single variable regardless of conversation size.
    pub fn get_comments_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COMMENT}
                 JOIN messages m ON m.id = c.message_id
                 WHERE m.conversation_id = ?1
                 ORDER BY c.commented_at ASC"
            ))?;
            let rows = stmt
                .query_map([conversation_id.to_string()], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    let after_user = 2 + USER_COLUMNS;
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        message_id: uuid_at(row, 1)?,
        commenter: UserRow::from_row_at(row, 2)?,
        emoji: row.get(after_user)?,
        commented_at: time_at(row, after_user + 1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::NewMessage;
    use crate::queries::test_support::{db, ts, user};

    fn setup() -> (Database, Uuid, Uuid) {
        let db = db();
        let a = user(&db, "alice");
        let group = Uuid::new_v4();
        db.create_group_conversation(group, "team", &[a], ts(0)).unwrap();
        let message = Uuid::new_v4();
        db.insert_message(&NewMessage {
            id: message,
            conversation_id: group,
            sender_id: a,
            content: Some("hi"),
            attachment: None,
            reply_to: None,
            sent_at: ts(1),
        })
        .unwrap();
        (db, a, message)
    }

    #[test]
    fn second_comment_by_same_user_is_conflict() {
        let (db, a, message) = setup();
        db.insert_comment(Uuid::new_v4(), message, a, "👍", ts(2)).unwrap();
        assert!(db.has_commented(message, a).unwrap());

        let err = db.insert_comment(Uuid::new_v4(), message, a, "🎉", ts(3)).unwrap_err();
        assert!(matches!(err, DbError::Conflict { entity: "comment" }));
    }

    #[test]
    fn delete_then_recomment() {
        let (db, a, message) = setup();
        let first = Uuid::new_v4();
        db.insert_comment(first, message, a, "👍", ts(2)).unwrap();

        assert!(db.delete_comment(first).unwrap());
        assert!(!db.delete_comment(first).unwrap());
        assert!(db.get_comment(first).unwrap().is_none());

        let second = Uuid::new_v4();
        db.insert_comment(second, message, a, "🎉", ts(3)).unwrap();
        let rows = db.get_comments_for_messages(&[message]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, second);
        assert_eq!(rows[0].commenter.id, a);
        assert_eq!(rows[0].emoji, "🎉");
    }

    #[test]
    fn conversation_comments_exclude_other_conversations() {
        let (db, a, message) = setup();
        let other_group = Uuid::new_v4();
        db.create_group_conversation(other_group, "elsewhere", &[a], ts(0)).unwrap();
        let elsewhere = Uuid::new_v4();
        db.insert_message(&NewMessage {
            id: elsewhere,
            conversation_id: other_group,
            sender_id: a,
            content: Some("yo"),
            attachment: None,
            reply_to: None,
            sent_at: ts(1),
        })
        .unwrap();
        db.insert_comment(Uuid::new_v4(), elsewhere, a, "🎉", ts(2)).unwrap();
        db.insert_comment(Uuid::new_v4(), message, a, "👍", ts(3)).unwrap();

        let group = db.get_message(message).unwrap().unwrap().conversation_id;
        let rows = db.get_comments_for_conversation(group).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message_id, message);
        assert_eq!(rows[0].emoji, "👍");
    }
}
