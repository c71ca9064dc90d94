use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                username         TEXT NOT NULL UNIQUE,
                profile_picture  TEXT,
                created_at       TEXT NOT NULL
            );

            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                kind        TEXT NOT NULL CHECK (kind IN ('private', 'group')),
                created_at  TEXT NOT NULL
            );

            -- The participant pair is stored ordered so that UNIQUE covers
            -- both (a, b) and (b, a).
            CREATE TABLE private_conversations (
                conversation_id  TEXT PRIMARY KEY REFERENCES conversations(id) ON DELETE CASCADE,
                user_low         TEXT NOT NULL REFERENCES users(id),
                user_high        TEXT NOT NULL REFERENCES users(id),
                CHECK (user_low < user_high),
                UNIQUE (user_low, user_high)
            );

            CREATE TABLE participants (
                conversation_id  TEXT NOT NULL REFERENCES private_conversations(conversation_id) ON DELETE CASCADE,
                user_id          TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_participants_user ON participants(user_id);

            CREATE TABLE group_conversations (
                conversation_id  TEXT PRIMARY KEY REFERENCES conversations(id) ON DELETE CASCADE,
                name             TEXT NOT NULL,
                photo            TEXT
            );

            CREATE TABLE members (
                conversation_id  TEXT NOT NULL REFERENCES group_conversations(conversation_id) ON DELETE CASCADE,
                user_id          TEXT NOT NULL REFERENCES users(id),
                joined_at        TEXT NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_members_user ON members(user_id);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                sender_id        TEXT NOT NULL REFERENCES users(id),
                content          TEXT,
                attachment       TEXT,
                reply_to         TEXT REFERENCES messages(id) ON DELETE SET NULL,
                sent_at          TEXT NOT NULL,
                edited_at        TEXT,
                CHECK (content IS NOT NULL OR attachment IS NOT NULL)
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, sent_at);

            CREATE TABLE forwarded_messages (
                forwarded_message_id  TEXT PRIMARY KEY REFERENCES messages(id),
                original_message_id   TEXT NOT NULL REFERENCES messages(id),
                forwarded_at          TEXT NOT NULL
            );

            CREATE INDEX idx_forwarded_original ON forwarded_messages(original_message_id);

            CREATE TABLE message_trackings (
                message_id  TEXT NOT NULL REFERENCES messages(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                read_at     TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            CREATE TABLE comments (
                id            TEXT PRIMARY KEY,
                message_id    TEXT NOT NULL REFERENCES messages(id),
                user_id       TEXT NOT NULL REFERENCES users(id),
                emoji         TEXT NOT NULL,
                commented_at  TEXT NOT NULL,
                UNIQUE (message_id, user_id)
            );

            CREATE INDEX idx_comments_message ON comments(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
