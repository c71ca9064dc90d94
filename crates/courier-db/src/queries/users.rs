use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{UserRow, format_timestamp};
use crate::{Database, DbError, Result};

const SELECT_USER: &str = "SELECT id, username, profile_picture, created_at FROM users";

impl Database {
    pub fn insert_user(&self, id: Uuid, username: &str, created_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
                (id.to_string(), username, format_timestamp(created_at)),
            )
            .map_err(|e| DbError::unique(e, "user"))?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{SELECT_USER} WHERE username = ?1"),
                    [username],
                    |row| UserRow::from_row_at(row, 0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every user except `exclude`, optionally narrowed to a username prefix.
    pub fn search_users(&self, exclude: Uuid, prefix: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            // Escape LIKE wildcards so the prefix is matched literally.
            let pattern = match prefix {
                Some(p) => format!(
                    "{}%",
                    p.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
                ),
                None => "%".to_string(),
            };

            let mut stmt = conn.prepare(&format!(
                "{SELECT_USER} WHERE id != ?1 AND username LIKE ?2 ESCAPE '\\' ORDER BY username"
            ))?;
            let rows = stmt
                .query_map((exclude.to_string(), pattern), |row| UserRow::from_row_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_username(&self, id: Uuid, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                (username, id.to_string()),
            )
            .map_err(|e| DbError::unique(e, "username"))?;
            Ok(())
        })
    }

    /// Sets the new picture reference and returns the one it replaced.
    pub fn update_profile_picture(&self, id: Uuid, picture: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let old: Option<String> = tx
                .query_row(
                    "SELECT profile_picture FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE users SET profile_picture = ?1 WHERE id = ?2",
                (picture, id.to_string()),
            )?;
            tx.commit()?;
            Ok(old)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("{SELECT_USER} WHERE id = ?1"),
            [id.to_string()],
            |row| UserRow::from_row_at(row, 0),
        )
        .optional()?;
    Ok(row)
}
