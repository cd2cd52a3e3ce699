use missive_types::UnreadMessage;
use rusqlite::Connection;
use uuid::Uuid;

use crate::queries::require_user;
use crate::{Database, Result};

/// Served by `idx_messages_receiver_read`.
pub(crate) const UNREAD_QUERY: &str = "SELECT id, sender_id, content, created_at
     FROM messages
     WHERE receiver_id = ?1 AND is_read = 0
     ORDER BY created_at, rowid";

impl Database {
    /// Unread messages addressed to `user_id`, oldest first.
    pub fn unread_for(&self, user_id: Uuid) -> Result<Vec<UnreadMessage>> {
        self.with_conn(|conn| {
            require_user(conn, user_id)?;
            query_unread(conn, user_id)
        })
    }
}

fn query_unread(conn: &Connection, user_id: Uuid) -> Result<Vec<UnreadMessage>> {
    let mut stmt = conn.prepare_cached(UNREAD_QUERY)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(UnreadMessage {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_uses_receiver_read_index() {
        let db = Database::open_in_memory().unwrap();
        let plan: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {}", UNREAD_QUERY))?;
                let rows = stmt
                    .query_map([Uuid::new_v4()], |row| row.get::<_, String>(3))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap();

        assert!(
            plan.iter().any(|line| line.contains("idx_messages_receiver_read")),
            "unexpected plan: {:?}",
            plan
        );
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.unread_for(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn known_user_without_messages_has_nothing_unread() {
        let db = Database::open_in_memory().unwrap();
        let quiet = db.create_user("quiet").unwrap();
        assert!(db.unread_for(quiet.id).unwrap().is_empty());
    }
}
