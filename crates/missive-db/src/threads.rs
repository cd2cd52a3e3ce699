//! Reply-tree reconstruction.
//!
//! Parent links are immutable and must point at an existing message, so the
//! API cannot build a cycle. Rows written by other means can, so the walk
//! keeps a visited set and stops at `max_thread_depth`.

use std::collections::{HashMap, HashSet};

use missive_types::{Message, Thread, ThreadNode};
use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

use crate::queries::{MESSAGE_COLUMNS, message_from_row, query_message};
use crate::{Database, Result, StoreError};

impl Database {
    /// The message `root_id` and every reply beneath it, each level in creation order.
    pub fn reconstruct_thread(&self, root_id: Uuid) -> Result<Thread> {
        let max_depth = self.config().max_thread_depth;

        self.with_conn(|conn| {
            let root = query_message(conn, root_id)?
                .ok_or_else(|| StoreError::message_not_found(root_id))?;

            let mut children = load_descendants(conn, root_id, max_depth)?;

            let mut walk = Walk {
                children: &mut children,
                visited: HashSet::from([root_id]),
                max_depth,
                truncated: false,
            };
            let replies = walk.replies_of(root_id, 1);
            let truncated = walk.truncated;

            if truncated {
                warn!("Thread {} was truncated during reconstruction", root_id);
            }

            Ok(Thread {
                root,
                replies,
                truncated,
            })
        })
    }
}

/// Fetch replies down to one level past `max_depth`, grouped by parent id.
///
/// The extra level lets the walk tell a tree that ends exactly at the limit
/// from one that was cut off.
fn load_descendants(
    conn: &Connection,
    root_id: Uuid,
    max_depth: usize,
) -> Result<HashMap<Uuid, Vec<Message>>> {
    let sql = format!(
        "WITH RECURSIVE descendants(id, depth) AS (
             SELECT id, 1 FROM messages WHERE parent_id = ?1
             UNION
             SELECT m.id, d.depth + 1
             FROM messages m
             JOIN descendants d ON m.parent_id = d.id
             WHERE d.depth <= ?2
         )
         SELECT {} FROM messages
         WHERE id IN (SELECT id FROM descendants)
         ORDER BY created_at, rowid",
        MESSAGE_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![root_id, i64::try_from(max_depth).unwrap_or(i64::MAX)],
            message_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut children: HashMap<Uuid, Vec<Message>> = HashMap::new();
    for message in rows {
        if let Some(parent) = message.parent_id {
            children.entry(parent).or_default().push(message);
        }
    }
    Ok(children)
}

struct Walk<'a> {
    children: &'a mut HashMap<Uuid, Vec<Message>>,
    visited: HashSet<Uuid>,
    max_depth: usize,
    truncated: bool,
}

impl Walk<'_> {
    fn replies_of(&mut self, parent: Uuid, depth: usize) -> Vec<ThreadNode> {
        let Some(replies) = self.children.remove(&parent) else {
            return Vec::new();
        };

        if depth > self.max_depth {
            self.truncated = true;
            return Vec::new();
        }

        let mut nodes = Vec::with_capacity(replies.len());
        for message in replies {
            if !self.visited.insert(message.id) {
                warn!("Reply cycle at message {}, skipping", message.id);
                self.truncated = true;
                continue;
            }
            let id = message.id;
            let replies = self.replies_of(id, depth + 1);
            nodes.push(ThreadNode { message, replies });
        }
        nodes
    }
}
