pub mod api;
pub mod models;

pub use api::{MessageFilter, PurgeReport, Thread, ThreadNode, UnreadMessage};
pub use models::{Message, MessageHistory, Notification, User};
