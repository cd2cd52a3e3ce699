use chrono::Utc;
use missive_types::{Message, User};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::{Database, Result, StoreError};

/// Column list matching [`message_from_row`].
pub(crate) const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, created_at, \
     parent_id, is_read, edited, edited_at, edited_by";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::Validation("username must not be empty".into()));
        }

        self.write(|tx| {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::IntegrityViolation(format!(
                    "username '{}' is already taken",
                    username
                )));
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, username, Utc::now()],
            )?;
            info!("Created user {} ({})", username, id);

            query_user_by_id(tx, id)?.ok_or_else(|| StoreError::user_not_found(id))
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, created_at FROM users WHERE username = ?1",
                    [username],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn user_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

pub(crate) fn require_user(conn: &Connection, id: Uuid) -> Result<()> {
    if user_exists(conn, id)? {
        Ok(())
    } else {
        Err(StoreError::user_not_found(id))
    }
}

pub(crate) fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let row = conn.query_row(&sql, [id], message_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        parent_id: row.get(5)?,
        read: row.get(6)?,
        edited: row.get(7)?,
        edited_at: row.get(8)?,
        edited_by: row.get(9)?,
    })
}
