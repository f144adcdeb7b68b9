use crate::models::db_operations::{
    format_timestamp, new_id, optional_timestamp_column, timestamp_column, DbError,
};
use crate::models::{PageRequest, SupportTicket, TicketPriority, TicketReply, TicketStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

const TICKET_COLUMNS: &str = "id, subject, message, priority, status, created_by, created_at, updated_at";

fn map_ticket(row: &Row<'_>) -> rusqlite::Result<SupportTicket> {
    Ok(SupportTicket {
        id: row.get(0)?,
        subject: row.get(1)?,
        message: row.get(2)?,
        priority: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        updated_at: optional_timestamp_column(row, 7)?,
    })
}

fn map_reply(row: &Row<'_>) -> rusqlite::Result<TicketReply> {
    Ok(TicketReply {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        author_id: row.get(2)?,
        message: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

pub fn insert_ticket(
    conn: &Connection,
    subject: &str,
    message: &str,
    priority: TicketPriority,
    created_by: &str,
) -> Result<SupportTicket, DbError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO support_tickets (id, subject, message, priority, status, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, subject, message, priority, TicketStatus::Open, created_by, format_timestamp(Utc::now())],
    )?;
    read_ticket(conn, &id)?.ok_or(DbError::NotFound(id))
}

pub fn read_ticket(conn: &Connection, id: &str) -> Result<Option<SupportTicket>, DbError> {
    let sql = format!("SELECT {} FROM support_tickets WHERE id = ?1", TICKET_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_ticket).optional()?)
}

pub fn list_tickets(
    conn: &Connection,
    created_by: Option<&str>,
    status: Option<TicketStatus>,
    page: PageRequest,
) -> Result<(Vec<SupportTicket>, i64), DbError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();
    if let Some(created_by) = &created_by {
        values.push(created_by);
        clauses.push(format!("created_by = ?{}", values.len()));
    }
    if let Some(status) = &status {
        values.push(status);
        clauses.push(format!("status = ?{}", values.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM support_tickets {}", where_sql),
        values.as_slice(),
        |row| row.get(0),
    )?;
    let sql = format!(
        "SELECT {} FROM support_tickets {} ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
        TICKET_COLUMNS,
        where_sql,
        page.limit(),
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(values.as_slice(), map_ticket)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((tickets, count))
}

pub fn update_status(conn: &Connection, id: &str, status: TicketStatus) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE support_tickets SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, format_timestamp(Utc::now()), id],
    )?)
}

pub fn count_unresolved(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM support_tickets WHERE status IN ('open', 'in_progress')",
        [],
        |row| row.get(0),
    )?)
}

/// Appends a reply, but only while the ticket is not closed. The status
/// check and the insert are one statement so a concurrent close wins.
pub fn append_reply_if_open(
    conn: &Connection,
    ticket_id: &str,
    author_id: &str,
    message: &str,
) -> Result<Option<TicketReply>, DbError> {
    let id = new_id();
    let inserted = conn.execute(
        "INSERT INTO ticket_replies (id, ticket_id, author_id, message, created_at)
         SELECT ?1, id, ?2, ?3, ?4 FROM support_tickets WHERE id = ?5 AND status != 'closed'",
        params![id, author_id, message, format_timestamp(Utc::now()), ticket_id],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    conn.execute(
        "UPDATE support_tickets SET updated_at = ?1 WHERE id = ?2",
        params![format_timestamp(Utc::now()), ticket_id],
    )?;
    Ok(conn
        .query_row(
            "SELECT id, ticket_id, author_id, message, created_at FROM ticket_replies WHERE id = ?1",
            [&id],
            map_reply,
        )
        .optional()?)
}

pub fn list_replies(conn: &Connection, ticket_id: &str) -> Result<Vec<TicketReply>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticket_id, author_id, message, created_at FROM ticket_replies
         WHERE ticket_id = ?1 ORDER BY created_at, rowid",
    )?;
    let replies = stmt.query_map([ticket_id], map_reply)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(replies)
}
