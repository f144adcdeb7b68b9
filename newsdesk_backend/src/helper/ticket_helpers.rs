use crate::helper::sanitization_helpers;
use crate::models::db_operations::{tickets_db_operations, DbError};
use crate::models::{Account, Page, PageRequest, SupportTicket, TicketPriority, TicketReply, TicketStatus, TicketThread};
use rusqlite::Connection;
use thiserror::Error;

const MAX_SUBJECT_LEN: usize = 200;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("Ticket not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("This ticket is closed and no longer accepts replies.")]
    Closed,
    #[error("Only administrators can {0}.")]
    NotAllowed(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Reads a ticket the actor may see: its creator or any admin-tier account.
fn visible_ticket(conn: &Connection, actor: &Account, ticket_id: &str) -> Result<SupportTicket, TicketError> {
    let ticket = tickets_db_operations::read_ticket(conn, ticket_id)?
        .ok_or_else(|| TicketError::NotFound(ticket_id.to_string()))?;
    if ticket.created_by != actor.id && !actor.role.is_admin_tier() {
        return Err(TicketError::NotFound(ticket_id.to_string()));
    }
    Ok(ticket)
}

pub fn open_ticket(
    conn: &Connection,
    actor: &Account,
    subject: &str,
    message: &str,
    priority: TicketPriority,
) -> Result<SupportTicket, TicketError> {
    let subject = sanitization_helpers::strip_all_html(subject.trim());
    let message = sanitization_helpers::strip_all_html(message.trim());
    if subject.is_empty() || message.is_empty() {
        return Err(TicketError::Invalid("Subject and message are required.".to_string()));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(TicketError::Invalid(format!("Subject cannot exceed {} characters.", MAX_SUBJECT_LEN)));
    }
    let ticket = tickets_db_operations::insert_ticket(conn, &subject, &message, priority, &actor.id)?;
    log::info!("Ticket {} opened by {} ({})", ticket.id, actor.id, ticket.priority);
    Ok(ticket)
}

pub fn list_tickets(
    conn: &Connection,
    actor: &Account,
    status: Option<TicketStatus>,
    page: PageRequest,
) -> Result<Page<SupportTicket>, TicketError> {
    let created_by = if actor.role.is_admin_tier() { None } else { Some(actor.id.as_str()) };
    let (data, count) = tickets_db_operations::list_tickets(conn, created_by, status, page)?;
    Ok(Page { data, count })
}

pub fn get_thread(conn: &Connection, actor: &Account, ticket_id: &str) -> Result<TicketThread, TicketError> {
    let ticket = visible_ticket(conn, actor, ticket_id)?;
    let replies = tickets_db_operations::list_replies(conn, ticket_id)?;
    Ok(TicketThread { ticket, replies })
}

pub fn reply(conn: &Connection, actor: &Account, ticket_id: &str, message: &str) -> Result<TicketReply, TicketError> {
    visible_ticket(conn, actor, ticket_id)?;
    let message = sanitization_helpers::strip_all_html(message.trim());
    if message.is_empty() {
        return Err(TicketError::Invalid("Reply cannot be empty.".to_string()));
    }
    // The closed check and the insert are one statement.
    tickets_db_operations::append_reply_if_open(conn, ticket_id, &actor.id, &message)?.ok_or(TicketError::Closed)
}

pub fn set_status(
    conn: &Connection,
    actor: &Account,
    ticket_id: &str,
    status: TicketStatus,
) -> Result<SupportTicket, TicketError> {
    if !actor.role.is_admin_tier() {
        return Err(TicketError::NotAllowed("change a ticket's status"));
    }
    if tickets_db_operations::update_status(conn, ticket_id, status)? == 0 {
        return Err(TicketError::NotFound(ticket_id.to_string()));
    }
    log::info!("Ticket {} set to {} by {}", ticket_id, status, actor.id);
    tickets_db_operations::read_ticket(conn, ticket_id)?.ok_or_else(|| TicketError::NotFound(ticket_id.to_string()))
}

/// Tickets still needing attention (`open` or `in_progress`).
pub fn open_ticket_count(conn: &Connection) -> Result<i64, TicketError> {
    Ok(tickets_db_operations::count_unresolved(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::test_support::account;
    use crate::models::Role;
    use crate::setup::db_setup::test_connection;

    #[test]
    fn reporters_see_only_their_own_tickets() {
        let conn = test_connection();
        let ana = account(&conn, Role::Reporter, &["my-panel"]);
        let ben = account(&conn, Role::Reporter, &["my-panel"]);
        let admin = account(&conn, Role::Admin, &[]);
        let mine = open_ticket(&conn, &ana, "Login", "Cannot upload", TicketPriority::High).unwrap();
        open_ticket(&conn, &ben, "Other", "Something else", TicketPriority::Normal).unwrap();

        assert_eq!(list_tickets(&conn, &ana, None, PageRequest::default()).unwrap().count, 1);
        assert_eq!(list_tickets(&conn, &admin, None, PageRequest::default()).unwrap().count, 2);
        assert!(matches!(get_thread(&conn, &ben, &mine.id), Err(TicketError::NotFound(_))));
        assert_eq!(mine.status, TicketStatus::Open);
    }

    #[test]
    fn replies_append_in_order_until_closed() {
        let conn = test_connection();
        let ana = account(&conn, Role::Reporter, &["my-panel"]);
        let admin = account(&conn, Role::Admin, &[]);
        let ticket = open_ticket(&conn, &ana, "Upload", "Video fails", TicketPriority::Normal).unwrap();

        reply(&conn, &admin, &ticket.id, "Which file?").unwrap();
        reply(&conn, &ana, &ticket.id, "clip.mp4").unwrap();
        let thread = get_thread(&conn, &ana, &ticket.id).unwrap();
        let messages: Vec<&str> = thread.replies.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["Which file?", "clip.mp4"]);

        set_status(&conn, &admin, &ticket.id, TicketStatus::Closed).unwrap();
        assert!(matches!(reply(&conn, &ana, &ticket.id, "still there?"), Err(TicketError::Closed)));
    }

    #[test]
    fn only_admin_tier_changes_status_and_count_tracks_it() {
        let conn = test_connection();
        let ana = account(&conn, Role::Reporter, &["my-panel"]);
        let superadmin = account(&conn, Role::Superadmin, &[]);
        let first = open_ticket(&conn, &ana, "One", "m", TicketPriority::Low).unwrap();
        open_ticket(&conn, &ana, "Two", "m", TicketPriority::Urgent).unwrap();
        assert_eq!(open_ticket_count(&conn).unwrap(), 2);

        assert!(matches!(
            set_status(&conn, &ana, &first.id, TicketStatus::Resolved),
            Err(TicketError::NotAllowed(_))
        ));
        set_status(&conn, &superadmin, &first.id, TicketStatus::Resolved).unwrap();
        assert_eq!(open_ticket_count(&conn).unwrap(), 1);
    }

    #[test]
    fn empty_subject_is_invalid() {
        let conn = test_connection();
        let ana = account(&conn, Role::Reporter, &["my-panel"]);
        assert!(matches!(
            open_ticket(&conn, &ana, "  ", "m", TicketPriority::Normal),
            Err(TicketError::Invalid(_))
        ));
    }
}
