//! Process-wide change feed. Every successful write publishes one event;
//! SSE streams subscribe for as long as their HTTP response lives.

use crate::models::Account;
use serde::Serialize;
use tokio::sync::broadcast;

pub const ACCOUNTS: &str = "accounts";
pub const ARTICLES: &str = "articles";
pub const CATEGORIES: &str = "categories";
pub const SUPPORT_TICKETS: &str = "support_tickets";
pub const TICKET_REPLIES: &str = "ticket_replies";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub row_id: String,
    /// Account the row belongs to (article author, ticket creator). Never sent.
    #[serde(skip)]
    pub owner_id: Option<String>,
}

impl ChangeEvent {
    /// Admin-tier accounts see every change. Others see category changes,
    /// their own account row and rows they own.
    pub fn visible_to(&self, account: &Account) -> bool {
        if account.role.is_admin_tier() || self.table == CATEGORIES {
            return true;
        }
        if self.table == ACCOUNTS {
            return self.row_id == account.id;
        }
        self.owner_id.as_deref() == Some(account.id.as_str())
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChangeFeed { sender }
    }

    /// Returns how many subscribers received the event. Having none is normal.
    pub fn publish(&self, table: &'static str, kind: ChangeKind, row_id: impl Into<String>) -> usize {
        self.send(ChangeEvent { table, kind, row_id: row_id.into(), owner_id: None })
    }

    pub fn publish_owned(
        &self,
        table: &'static str,
        kind: ChangeKind,
        row_id: impl Into<String>,
        owner_id: Option<&str>,
    ) -> usize {
        self.send(ChangeEvent { table, kind, row_id: row_id.into(), owner_id: owner_id.map(str::to_string) })
    }

    fn send(&self, event: ChangeEvent) -> usize {
        log::debug!("Change feed: {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(256)
    }
}
