use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          BLOB PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE messages (
                id          BLOB PRIMARY KEY,
                sender_id   BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                parent_id   BLOB REFERENCES messages(id) ON DELETE CASCADE,
                is_read     INTEGER NOT NULL DEFAULT 0,
                edited      INTEGER NOT NULL DEFAULT 0,
                edited_at   TEXT,
                edited_by   BLOB REFERENCES users(id) ON DELETE SET NULL,
                version     INTEGER NOT NULL DEFAULT 0,
                CHECK (parent_id IS NULL OR parent_id <> id)
            );

            CREATE INDEX idx_messages_receiver_read
                ON messages(receiver_id, is_read);

            CREATE INDEX idx_messages_sender
                ON messages(sender_id);

            CREATE INDEX idx_messages_parent
                ON messages(parent_id, created_at);

            CREATE TABLE notifications (
                id          BLOB PRIMARY KEY,
                user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id  BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, is_read);

            CREATE INDEX idx_notifications_message
                ON notifications(message_id);

            CREATE TABLE message_history (
                id          BLOB PRIMARY KEY,
                message_id  BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                old_content TEXT NOT NULL,
                edited      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_history_message
                ON message_history(message_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", current_version(conn)?);
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?)
}
