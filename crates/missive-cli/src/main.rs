mod config;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use missive_db::Database;
use missive_types::MessageFilter;

use crate::config::Config;

/// Administer a missive message store.
#[derive(Debug, Parser)]
#[command(name = "missive", version, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database and run migrations
    Init,
    /// Register an account
    AddUser { username: String },
    /// Send a message, optionally as a reply
    Send {
        /// Sender (id or username)
        #[arg(long)]
        from: String,
        /// Receiver (id or username)
        #[arg(long)]
        to: String,
        /// Message being replied to
        #[arg(long)]
        parent: Option<Uuid>,
        content: String,
    },
    /// Replace a message's content
    Edit {
        message: Uuid,
        content: String,
        /// Editing account (id or username)
        #[arg(long)]
        editor: String,
    },
    /// Mark a message as read
    Read { message: Uuid },
    /// List a user's unread messages
    Unread { user: String },
    /// Print the reply tree under a message
    Thread { message: Uuid },
    /// Show earlier versions of an edited message
    History { message: Uuid },
    /// List a user's notifications
    Notifications {
        user: String,
        #[arg(long)]
        unread: bool,
    },
    /// List messages a user sent or received
    List {
        user: String,
        /// Only messages from this sender (id or username)
        #[arg(long)]
        sender: Option<String>,
        /// RFC 3339 lower bound, inclusive
        #[arg(long)]
        after: Option<DateTime<Utc>>,
        /// RFC 3339 upper bound, inclusive
        #[arg(long)]
        before: Option<DateTime<Utc>>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Delete an account and everything tied to it
    DeleteUser { user: String },
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "missive=info,missive_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!("Config: {:?}", cli.config);

    let db = Database::open(&cli.config.db_path, cli.config.db_config())
        .with_context(|| format!("opening {}", cli.config.db_path.display()))?;

    run(&db, cli.command)
}

fn run(db: &Database, command: Command) -> Result<()> {
    match command {
        Command::Init => emit(&serde_json::json!({ "ok": true })),
        Command::AddUser { username } => emit(&db.create_user(&username)?),
        Command::Send {
            from,
            to,
            parent,
            content,
        } => {
            let sender = resolve_user(db, &from)?;
            let receiver = resolve_user(db, &to)?;
            emit(&db.send_message(sender, receiver, &content, parent)?)
        }
        Command::Edit {
            message,
            content,
            editor,
        } => {
            let editor = resolve_user(db, &editor)?;
            emit(&db.update_content(message, &content, editor)?)
        }
        Command::Read { message } => {
            let changed = db.mark_read(message)?;
            emit(&serde_json::json!({ "id": message, "changed": changed }))
        }
        Command::Unread { user } => emit(&db.unread_for(resolve_user(db, &user)?)?),
        Command::Thread { message } => emit(&db.reconstruct_thread(message)?),
        Command::History { message } => emit(&db.history_for(message)?),
        Command::Notifications { user, unread } => {
            emit(&db.notifications_for(resolve_user(db, &user)?, unread)?)
        }
        Command::List {
            user,
            sender,
            after,
            before,
            limit,
        } => {
            let participant = resolve_user(db, &user)?;
            let filter = MessageFilter {
                sender: sender.map(|s| resolve_user(db, &s)).transpose()?,
                sent_after: after,
                sent_before: before,
                limit,
            };
            emit(&db.list_messages(participant, &filter)?)
        }
        Command::DeleteUser { user } => emit(&db.delete_user(resolve_user(db, &user)?)?),
    }
}

/// Accept either an account id or a username.
fn resolve_user(db: &Database, user: &str) -> Result<Uuid> {
    if let Ok(id) = user.parse::<Uuid>() {
        return Ok(id);
    }
    db.get_user_by_username(user)?
        .map(|u| u.id)
        .ok_or_else(|| anyhow!("Unknown user: {}", user))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_reply() {
        let parent = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "missive",
            "--db-path",
            "/tmp/test.db",
            "send",
            "--from",
            "alice",
            "--to",
            "bob",
            "--parent",
            &parent.to_string(),
            "hi bob",
        ])
        .unwrap();

        assert_eq!(cli.config.db_path, std::path::PathBuf::from("/tmp/test.db"));
        match cli.command {
            Command::Send {
                from,
                to,
                parent: Some(p),
                content,
            } => {
                assert_eq!((from.as_str(), to.as_str()), ("alice", "bob"));
                assert_eq!(p, parent);
                assert_eq!(content, "hi bob");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_message_id() {
        assert!(Cli::try_parse_from(["missive", "read", "not-a-uuid"]).is_err());
    }

    #[test]
    fn list_parses_time_bounds() {
        let cli = Cli::try_parse_from([
            "missive",
            "list",
            "alice",
            "--after",
            "2024-01-01T00:00:00Z",
            "--limit",
            "10",
        ])
        .unwrap();
        match cli.command {
            Command::List { after, limit, .. } => {
                assert_eq!(after.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
                assert_eq!(limit, Some(10));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn resolves_users_by_name_or_id() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice").unwrap();

        assert_eq!(resolve_user(&db, "alice").unwrap(), alice.id);
        assert_eq!(resolve_user(&db, &alice.id.to_string()).unwrap(), alice.id);
        assert!(resolve_user(&db, "nobody").is_err());
    }

    #[test]
    fn run_drives_the_store() {
        let db = Database::open_in_memory().unwrap();
        run(&db, Command::AddUser { username: "alice".into() }).unwrap();
        run(&db, Command::AddUser { username: "bob".into() }).unwrap();
        run(
            &db,
            Command::Send {
                from: "alice".into(),
                to: "bob".into(),
                parent: None,
                content: "hello".into(),
            },
        )
        .unwrap();

        let bob = db.get_user_by_username("bob").unwrap().unwrap();
        assert_eq!(db.unread_for(bob.id).unwrap().len(), 1);

        run(&db, Command::DeleteUser { user: "alice".into() }).unwrap();
        assert!(db.unread_for(bob.id).unwrap().is_empty());
    }
}
