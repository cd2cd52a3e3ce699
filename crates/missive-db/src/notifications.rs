use chrono::Utc;
use missive_types::{Message, Notification};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::queries::require_user;
use crate::{Database, Result, StoreError};

/// Raise the receiver's notification for a freshly inserted message.
///
/// Only [`Database::send_message`] calls this; edits and read flips never do.
pub(crate) fn dispatch_created(conn: &Connection, message: &Message) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: message.receiver_id,
        message_id: message.id,
        read: false,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO notifications (id, user_id, message_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            notification.id,
            notification.user_id,
            notification.message_id,
            notification.read,
            notification.created_at
        ],
    )?;
    debug!(
        "Notified user {} of message {}",
        notification.user_id, notification.message_id
    );

    Ok(notification)
}

impl Database {
    /// Notifications owned by `user_id`, newest first.
    pub fn notifications_for(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            require_user(conn, user_id)?;

            let mut stmt = conn.prepare(
                "SELECT id, user_id, message_id, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, unread_only], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                        read: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns `true` if the notification was unread before this call.
    pub fn mark_notification_read(&self, id: Uuid) -> Result<bool> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND is_read = 0",
                [id],
            )?;
            if changed > 0 {
                return Ok(true);
            }

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if exists {
                Ok(false)
            } else {
                Err(StoreError::NotFound { entity: "notification", id })
            }
        })
    }
}
