//! Edit-history recording.
//!
//! Called by [`Database::update_content`] inside its write transaction, before
//! the new content is stored, so the snapshot always holds the value that was
//! current immediately before the edit.

use chrono::Utc;
use missive_types::MessageHistory;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::{Database, Result, StoreError};

/// Snapshot the stored content of `message_id` if `incoming` would replace it.
///
/// Returns `None` without writing when the content is unchanged or when the
/// message is not (or no longer) persisted. A missing message never fails the
/// caller's write.
pub(crate) fn record_prior_content(
    conn: &Connection,
    message_id: Uuid,
    incoming: &str,
) -> Result<Option<MessageHistory>> {
    let prior: Option<String> = conn
        .query_row(
            "SELECT content FROM messages WHERE id = ?1",
            [message_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(prior) = prior else {
        debug!("No persisted state for message {}, skipping history", message_id);
        return Ok(None);
    };

    if prior == incoming {
        return Ok(None);
    }

    let entry = MessageHistory {
        id: Uuid::new_v4(),
        message_id,
        old_content: prior,
        edited: true,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO message_history (id, message_id, old_content, edited, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            entry.id,
            entry.message_id,
            entry.old_content,
            entry.edited,
            entry.created_at
        ],
    )?;
    debug!("Recorded history {} for message {}", entry.id, message_id);

    Ok(Some(entry))
}

impl Database {
    /// Prior versions of a message, oldest first.
    pub fn history_for(&self, message_id: Uuid) -> Result<Vec<MessageHistory>> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
                [message_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::message_not_found(message_id));
            }

            let mut stmt = conn.prepare(
                "SELECT id, message_id, old_content, edited, created_at
                 FROM message_history
                 WHERE message_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([message_id], |row| {
                    Ok(MessageHistory {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        old_content: row.get(2)?,
                        edited: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
