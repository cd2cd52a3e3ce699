//! The message store.
//!
//! Every mutation runs in one write transaction together with the derived
//! records it produces: a notification on insert, a history snapshot before a
//! content change.

use chrono::Utc;
use missive_types::{Message, MessageFilter};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use tracing::{debug, info};
use uuid::Uuid;

use crate::queries::{MESSAGE_COLUMNS, message_from_row, query_message, require_user};
use crate::{Database, Result, StoreError, history, notifications};

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(StoreError::Validation("message content cannot be empty".into()));
    }
    Ok(())
}

/// Write the new content if the row is still at `expected_version`.
///
/// The connection mutex serializes writers on one handle; the version check
/// covers writers on other connections to the same file.
fn apply_edit(
    conn: &Connection,
    message_id: Uuid,
    new_content: &str,
    editor_id: Uuid,
    expected_version: i64,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE messages
         SET content = ?1, edited = 1, edited_at = ?2, edited_by = ?3, version = version + 1
         WHERE id = ?4 AND version = ?5",
        rusqlite::params![new_content, Utc::now(), editor_id, message_id, expected_version],
    )?;
    if changed == 0 {
        return Err(StoreError::ConcurrentModification(message_id));
    }
    debug!(
        "Message {} edited by {} (v{})",
        message_id,
        editor_id,
        expected_version + 1
    );
    Ok(())
}

impl Database {
    /// Store a new message and raise the receiver's notification.
    pub fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Message> {
        validate_content(content)?;

        self.write(|tx| {
            require_user(tx, sender_id)?;
            require_user(tx, receiver_id)?;

            if let Some(parent) = parent_id {
                if query_message(tx, parent)?.is_none() {
                    return Err(StoreError::IntegrityViolation(format!(
                        "parent message {} does not exist",
                        parent
                    )));
                }
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, created_at, parent_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, sender_id, receiver_id, content, Utc::now(), parent_id],
            )?;

            let message = query_message(tx, id)?.ok_or_else(|| StoreError::message_not_found(id))?;
            notifications::dispatch_created(tx, &message)?;

            info!("Message {} sent from {} to {}", id, sender_id, receiver_id);
            Ok(message)
        })
    }

    /// Replace a message's content.
    ///
    /// When the content actually changes the prior value is snapshotted first,
    /// then the row is updated under a version check. Unchanged content is a
    /// no-op that leaves the edited flag alone.
    pub fn update_content(&self, message_id: Uuid, new_content: &str, editor_id: Uuid) -> Result<Message> {
        validate_content(new_content)?;

        self.write(|tx| {
            let (current, version): (String, i64) = tx
                .query_row(
                    "SELECT content, version FROM messages WHERE id = ?1",
                    [message_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::message_not_found(message_id),
                    other => other.into(),
                })?;
            require_user(tx, editor_id)?;

            if current != new_content {
                history::record_prior_content(tx, message_id, new_content)?;
                apply_edit(tx, message_id, new_content, editor_id, version)?;
            }

            query_message(tx, message_id)?.ok_or_else(|| StoreError::message_not_found(message_id))
        })
    }

    /// Flip the read flag. Returns `true` if the message was unread before.
    pub fn mark_read(&self, message_id: Uuid) -> Result<bool> {
        self.write(|tx| {
            let changed = tx.execute(
                "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
                [message_id],
            )?;
            if changed > 0 {
                debug!("Message {} marked read", message_id);
                return Ok(true);
            }

            match query_message(tx, message_id)? {
                Some(_) => Ok(false),
                None => Err(StoreError::message_not_found(message_id)),
            }
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Whether `user_id` sent or received `message_id`.
    pub fn is_participant(&self, user_id: Uuid, message_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            require_user(conn, user_id)?;
            let message = query_message(conn, message_id)?
                .ok_or_else(|| StoreError::message_not_found(message_id))?;
            Ok(message.involves(user_id))
        })
    }

    /// Messages `participant` sent or received, newest first.
    pub fn list_messages(&self, participant: Uuid, filter: &MessageFilter) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            require_user(conn, participant)?;

            let limit = filter.effective_limit();
            let mut sql = format!(
                "SELECT {} FROM messages WHERE (sender_id = ?1 OR receiver_id = ?1)",
                MESSAGE_COLUMNS
            );
            let mut params: Vec<&dyn ToSql> = vec![&participant];

            if let Some(sender) = &filter.sender {
                params.push(sender);
                sql.push_str(&format!(" AND sender_id = ?{}", params.len()));
            }
            if let Some(after) = &filter.sent_after {
                params.push(after);
                sql.push_str(&format!(" AND created_at >= ?{}", params.len()));
            }
            if let Some(before) = &filter.sent_before {
                params.push(before);
                sql.push_str(&format!(" AND created_at <= ?{}", params.len()));
            }

            params.push(&limit);
            sql.push_str(&format!(
                " ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
                params.len()
            ));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missive_types::User;

    fn setup() -> (Database, User, User) {
        let db = Database::open_in_memory().unwrap();
        let s = db.create_user("sender").unwrap();
        let r = db.create_user("receiver").unwrap();
        (db, s, r)
    }

    #[test]
    fn send_sets_initial_flags() {
        let (db, s, r) = setup();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();

        assert!(!msg.read);
        assert!(!msg.edited);
        assert!(msg.edited_at.is_none());
        assert!(msg.edited_by.is_none());
        assert_eq!(db.get_message(msg.id).unwrap(), Some(msg));
    }

    #[test]
    fn empty_content_is_rejected() {
        let (db, s, r) = setup();
        assert!(matches!(
            db.send_message(s.id, r.id, "  \n", None).unwrap_err(),
            StoreError::Validation(_)
        ));

        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();
        assert!(matches!(
            db.update_content(msg.id, "", s.id).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert_eq!(db.get_message(msg.id).unwrap().unwrap().content, "Hello");
    }

    #[test]
    fn unknown_parent_is_an_integrity_violation() {
        let (db, s, r) = setup();
        let err = db.send_message(s.id, r.id, "reply", Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, StoreError::IntegrityViolation(_)));
        assert!(db.notifications_for(r.id, false).unwrap().is_empty());
    }

    #[test]
    fn unknown_participants_are_not_found() {
        let (db, s, _) = setup();
        assert!(db.send_message(s.id, Uuid::new_v4(), "hi", None).unwrap_err().is_not_found());
        assert!(db.send_message(Uuid::new_v4(), s.id, "hi", None).unwrap_err().is_not_found());
    }

    #[test]
    fn edit_sets_editor_metadata() {
        let (db, s, r) = setup();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();
        let edited = db.update_content(msg.id, "Hello there", s.id).unwrap();

        assert_eq!(edited.content, "Hello there");
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());
        assert_eq!(edited.edited_by, Some(s.id));
    }

    #[test]
    fn noop_edit_leaves_flags_untouched() {
        let (db, s, r) = setup();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();
        let same = db.update_content(msg.id, "Hello", s.id).unwrap();

        assert_eq!(same, msg);
        assert!(db.history_for(msg.id).unwrap().is_empty());
    }

    #[test]
    fn stale_version_is_a_concurrent_modification() {
        let (db, s, r) = setup();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();

        let result = db.write(|tx| {
            let version: i64 =
                tx.query_row("SELECT version FROM messages WHERE id = ?1", [msg.id], |row| row.get(0))?;
            // Another writer lands between the read and the update.
            tx.execute(
                "UPDATE messages SET content = 'theirs', version = version + 1 WHERE id = ?1",
                [msg.id],
            )?;
            apply_edit(tx, msg.id, "mine", s.id, version)
        });
        assert!(matches!(result, Err(StoreError::ConcurrentModification(id)) if id == msg.id));

        let stored = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(stored.content, "Hello");
        assert!(!stored.edited);
    }

    #[test]
    fn edit_unknown_message_is_not_found() {
        let (db, s, _) = setup();
        assert!(db.update_content(Uuid::new_v4(), "x", s.id).unwrap_err().is_not_found());
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (db, s, r) = setup();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();

        assert!(db.mark_read(msg.id).unwrap());
        assert!(!db.mark_read(msg.id).unwrap());
        assert!(db.get_message(msg.id).unwrap().unwrap().read);
        assert!(db.mark_read(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn participation() {
        let (db, s, r) = setup();
        let outsider = db.create_user("outsider").unwrap();
        let msg = db.send_message(s.id, r.id, "Hello", None).unwrap();

        assert!(db.is_participant(s.id, msg.id).unwrap());
        assert!(db.is_participant(r.id, msg.id).unwrap());
        assert!(!db.is_participant(outsider.id, msg.id).unwrap());
        assert!(db.is_participant(Uuid::new_v4(), msg.id).unwrap_err().is_not_found());
        assert!(db.is_participant(s.id, Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn list_applies_filters() {
        let (db, s, r) = setup();
        let other = db.create_user("other").unwrap();
        let first = db.send_message(s.id, r.id, "first", None).unwrap();
        let second = db.send_message(r.id, s.id, "second", None).unwrap();
        db.send_message(other.id, r.id, "elsewhere", None).unwrap();

        let all = db.list_messages(s.id, &MessageFilter::default()).unwrap();
        assert_eq!(all.iter().map(|m| m.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let from_r = MessageFilter { sender: Some(r.id), ..Default::default() };
        let only = db.list_messages(s.id, &from_r).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, second.id);

        let since_second = MessageFilter { sent_after: Some(second.created_at), ..Default::default() };
        let recent = db.list_messages(s.id, &since_second).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);

        let until_first = MessageFilter { sent_before: Some(first.created_at), ..Default::default() };
        let early = db.list_messages(s.id, &until_first).unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].id, first.id);

        let capped = MessageFilter { limit: Some(1), ..Default::default() };
        assert_eq!(db.list_messages(s.id, &capped).unwrap().len(), 1);
    }
}
