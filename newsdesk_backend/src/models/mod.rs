use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a text-backed enum: serde names, `as_str`, `FromStr`, `Display`
/// and the rusqlite conversions all share one table of names.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(
    /// Coarse-grained actor category of a dashboard account.
    Role, "role", {
        Reporter => "reporter",
        Admin => "admin",
        Superadmin => "superadmin",
    }
);

impl Role {
    /// Admins and superadmins review content, answer tickets and manage the desk.
    pub fn is_admin_tier(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

text_enum!(VerificationStatus, "verification status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(
    /// Review lifecycle stage of an article.
    ArticleStatus, "article status", {
        Pending => "pending",
        Processing => "processing",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(MediaKind, "media kind", {
    Image => "image",
    Video => "video",
});

text_enum!(TicketStatus, "ticket status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

text_enum!(TicketPriority, "ticket priority", {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

impl Default for TicketPriority {
    fn default() -> Self {
        TicketPriority::Normal
    }
}

/// Set of section identifiers an account has been explicitly granted.
pub type PermissionSet = BTreeSet<String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub documents_verified: bool,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalLink {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub media: Vec<MediaItem>,
    pub links: Vec<ExternalLink>,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
    pub status: ArticleStatus,
    pub is_breaking: bool,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub shares: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields supplied when an article is submitted. Status is never accepted here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArticleDraft {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub links: Vec<ExternalLink>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_breaking: bool,
}

/// Partial update of an article's content. There is intentionally no status
/// field: status only moves through the workflow transition.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    /// An empty string clears the cover image.
    pub cover_image: Option<String>,
    pub media: Option<Vec<MediaItem>>,
    pub links: Option<Vec<ExternalLink>>,
    pub category_id: Option<String>,
    pub is_breaking: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupportTicket {
    pub id: String,
    pub subject: String,
    pub message: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketReply {
    pub id: String,
    pub ticket_id: String,
    pub author_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TicketThread {
    pub ticket: SupportTicket,
    pub replies: Vec<TicketReply>,
}

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest { page: Some(page), limit: Some(limit) }
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    /// Computed in `u64` so any client-supplied page number stays in range.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.unwrap_or(1).max(1) - 1) * u64::from(self.limit())
    }
}

pub mod db_operations;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_status_uses_snake_case_names() {
        assert_eq!(TicketStatus::InProgress.as_str(), "in_progress");
        assert_eq!("in_progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert_eq!(serde_json::to_string(&TicketStatus::InProgress).unwrap(), "\"in_progress\"");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "editor".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.value, "editor");
    }

    #[test]
    fn page_request_clamps_limit_and_first_page() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.limit(), PageRequest::MAX_LIMIT);
        assert_eq!(req.offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let req = PageRequest::new(u32::MAX, 100);
        assert_eq!(req.offset(), (u64::from(u32::MAX) - 1) * 100);
    }
}
