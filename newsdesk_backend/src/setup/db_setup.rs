use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Creates every table and index. Safe to run against an existing database.
///
/// `articles.category_id` carries no foreign key: category deletion is
/// guarded by the application, the store itself neither cascades nor restricts.
pub fn setup_newsdesk_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    log::info!("Creating 'accounts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('reporter', 'admin', 'superadmin')),
            permissions TEXT NOT NULL DEFAULT '[]',
            documents_verified INTEGER NOT NULL DEFAULT 0,
            verification_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(verification_status IN ('pending', 'approved', 'rejected')),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'categories' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'articles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            excerpt TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            cover_image TEXT,
            media TEXT NOT NULL DEFAULT '[]',
            links TEXT NOT NULL DEFAULT '[]',
            category_id TEXT,
            author_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending', 'processing', 'approved', 'rejected')),
            is_breaking INTEGER NOT NULL DEFAULT 0,
            reviewed_by TEXT,
            reviewed_at TEXT,
            views INTEGER NOT NULL DEFAULT 0,
            shares INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            CHECK((reviewed_by IS NULL) = (reviewed_at IS NULL))
        )",
        [],
    )?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_articles_status_created ON articles (status, created_at)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_articles_category ON articles (category_id)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_articles_author ON articles (author_id)", [])?;

    log::info!("Creating 'support_tickets' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS support_tickets (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'normal'
                CHECK(priority IN ('low', 'normal', 'high', 'urgent')),
            status TEXT NOT NULL DEFAULT 'open'
                CHECK(status IN ('open', 'in_progress', 'resolved', 'closed')),
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    log::info!("Creating 'ticket_replies' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS ticket_replies (
            id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (ticket_id) REFERENCES support_tickets(id) ON DELETE CASCADE
        )",
        [],
    )?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_ticket_replies_ticket ON ticket_replies (ticket_id, created_at)", [])?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let mut conn = Connection::open_in_memory().expect("in-memory database");
    setup_newsdesk_db(&mut conn).expect("schema setup");
    conn
}
