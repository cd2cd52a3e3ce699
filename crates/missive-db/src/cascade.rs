//! Account deletion.
//!
//! Purges everything tied to an account in one transaction. The doomed
//! message set includes replies hanging off the user's messages, since those
//! go with their parent. Derived rows are deleted explicitly from that set
//! before the messages themselves, so nothing depends on foreign-key cascades
//! having run.

use missive_types::PurgeReport;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::queries::require_user;
use crate::{Database, Result};

const DOOMED_MESSAGES: &str = "WITH RECURSIVE doomed(id) AS (
         SELECT id FROM messages WHERE sender_id = ?1 OR receiver_id = ?1
         UNION
         SELECT m.id FROM messages m JOIN doomed d ON m.parent_id = d.id
     )";

impl Database {
    /// Delete an account and every record that depends on it.
    pub fn delete_user(&self, user_id: Uuid) -> Result<PurgeReport> {
        self.write(|tx| {
            require_user(tx, user_id)?;

            let report = purge_account(tx, user_id)?;
            tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;

            info!(
                "Deleted user {}: {} messages, {} notifications, {} history entries",
                user_id, report.messages, report.notifications, report.history
            );
            Ok(report)
        })
    }
}

pub(crate) fn purge_account(conn: &Connection, user_id: Uuid) -> Result<PurgeReport> {
    let history = conn.execute(
        &format!(
            "{} DELETE FROM message_history WHERE message_id IN (SELECT id FROM doomed)",
            DOOMED_MESSAGES
        ),
        [user_id],
    )?;

    let notifications = conn.execute(
        &format!(
            "{} DELETE FROM notifications
             WHERE user_id = ?1 OR message_id IN (SELECT id FROM doomed)",
            DOOMED_MESSAGES
        ),
        [user_id],
    )?;

    // Counted up front: rows removed by the parent_id cascade mid-statement
    // are not reported as changes.
    let messages: i64 = conn.query_row(
        &format!("{} SELECT COUNT(*) FROM doomed", DOOMED_MESSAGES),
        [user_id],
        |row| row.get(0),
    )?;
    conn.execute(
        &format!(
            "{} DELETE FROM messages WHERE id IN (SELECT id FROM doomed)",
            DOOMED_MESSAGES
        ),
        [user_id],
    )?;

    Ok(PurgeReport {
        messages: messages as usize,
        notifications,
        history,
    })
}
