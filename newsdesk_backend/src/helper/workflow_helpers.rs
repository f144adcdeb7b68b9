//! Article review workflow.
//!
//! ```text
//! pending ──► processing ──► approved      (approve: superadmin only)
//!    │             │
//!    └──► rejected ◄┘                      (reject: admin or superadmin)
//! ```
//!
//! `approved` and `rejected` are terminal. Every transition is re-validated
//! against the actor's role here, whatever the caller already checked, and is
//! applied as a compare-and-set on the status the caller last observed.

use crate::helper::access_helpers::{self, AccessDenied, Section};
use crate::models::db_operations::articles_db_operations::{self, ArticleFilter};
use crate::models::db_operations::DbError;
use crate::models::{Account, Article, ArticleStatus, Page, PageRequest, Role};
use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Article not found: {0}")]
    NotFound(String),
    #[error("An article cannot move from '{from}' to '{to}'.")]
    IllegalTransition { from: ArticleStatus, to: ArticleStatus },
    #[error("A {role} may not move an article from '{from}' to '{to}'.")]
    Forbidden { role: Role, from: ArticleStatus, to: ArticleStatus },
    #[error("The article is now '{actual}', not '{expected}'. Reload and try again.")]
    Conflict { expected: ArticleStatus, actual: ArticleStatus },
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

const ADMIN_TIER: &[Role] = &[Role::Admin, Role::Superadmin];
const SUPERADMIN_ONLY: &[Role] = &[Role::Superadmin];

/// Roles allowed to perform `from -> to`, or `None` if the edge does not exist.
pub fn allowed_roles(from: ArticleStatus, to: ArticleStatus) -> Option<&'static [Role]> {
    use ArticleStatus::*;
    match (from, to) {
        (Pending, Processing) => Some(ADMIN_TIER),
        (Pending, Rejected) => Some(ADMIN_TIER),
        (Processing, Approved) => Some(SUPERADMIN_ONLY),
        (Processing, Rejected) => Some(ADMIN_TIER),
        _ => None,
    }
}

pub fn check_transition(from: ArticleStatus, to: ArticleStatus, role: Role) -> Result<(), WorkflowError> {
    match allowed_roles(from, to) {
        None => Err(WorkflowError::IllegalTransition { from, to }),
        Some(roles) if !roles.contains(&role) => Err(WorkflowError::Forbidden { role, from, to }),
        Some(_) => Ok(()),
    }
}

/// Targets the given role may pick from `status`; drives which actions a
/// review screen exposes.
pub fn available_transitions(status: ArticleStatus, role: Role) -> Vec<ArticleStatus> {
    ArticleStatus::ALL
        .iter()
        .copied()
        .filter(|to| check_transition(status, *to, role).is_ok())
        .collect()
}

/// Transitions `actor` could actually perform on an article in `status`:
/// the role table narrowed by the `approval` grant that
/// `transition_article` also requires.
pub fn transitions_for(status: ArticleStatus, actor: &Account) -> Vec<ArticleStatus> {
    if !access_helpers::can_access(actor.role, &actor.permissions, Section::Approval) {
        return Vec::new();
    }
    available_transitions(status, actor.role)
}

pub fn is_terminal(status: ArticleStatus) -> bool {
    ArticleStatus::ALL.iter().all(|to| allowed_roles(status, *to).is_none())
}

/// Moves an article from `expected` to `target` on behalf of `actor`.
///
/// Refusals are returned as errors, never as silent no-ops. On success only
/// `status`, `reviewed_by` and `reviewed_at` change.
pub fn transition_article(
    conn: &Connection,
    actor: &Account,
    article_id: &str,
    expected: ArticleStatus,
    target: ArticleStatus,
) -> Result<Article, WorkflowError> {
    let article = articles_db_operations::read_article(conn, article_id)?
        .ok_or_else(|| WorkflowError::NotFound(article_id.to_string()))?;

    if article.status != expected {
        return Err(WorkflowError::Conflict { expected, actual: article.status });
    }
    if let Err(refusal) = check_transition(expected, target, actor.role) {
        log::warn!(
            "Refused transition of article {} by {} ({}): {}",
            article_id, actor.id, actor.role, refusal
        );
        return Err(refusal);
    }
    access_helpers::require_section(actor, Section::Approval)?;

    let changed = articles_db_operations::update_status_if(
        conn, article_id, expected, target, &actor.id, Utc::now(),
    )?;
    if changed == 0 {
        // Lost a race between the read above and the write.
        return match articles_db_operations::read_article(conn, article_id)? {
            Some(current) => Err(WorkflowError::Conflict { expected, actual: current.status }),
            None => Err(WorkflowError::NotFound(article_id.to_string())),
        };
    }

    log::info!(
        "Article {} moved {} -> {} by {} ({})",
        article_id, expected, target, actor.id, actor.role
    );
    articles_db_operations::read_article(conn, article_id)?
        .ok_or_else(|| WorkflowError::NotFound(article_id.to_string()))
}

/// Articles waiting for review (`pending` or `processing`), newest first.
pub fn approval_queue(conn: &Connection, actor: &Account, page: PageRequest) -> Result<Page<Article>, WorkflowError> {
    if !actor.role.is_admin_tier() {
        return Err(AccessDenied { section: Section::Approval }.into());
    }
    access_helpers::require_section(actor, Section::Approval)?;

    let filter = ArticleFilter {
        statuses: vec![ArticleStatus::Pending, ArticleStatus::Processing],
        ..Default::default()
    };
    let (data, count) = articles_db_operations::list_articles(conn, &filter, page)?;
    Ok(Page { data, count })
}
