use crate::models::db_operations::{
    format_timestamp, json_column, new_id, timestamp_column, to_json, DbError,
};
use crate::models::{Account, PageRequest, Role, VerificationStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const ACCOUNT_COLUMNS: &str =
    "id, email, display_name, role, permissions, documents_verified, verification_status, created_at";

fn map_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: row.get(3)?,
        permissions: json_column(row, 4)?,
        documents_verified: row.get(5)?,
        verification_status: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

pub struct NewAccount<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub permissions: BTreeSet<String>,
    pub documents_verified: bool,
    pub verification_status: VerificationStatus,
}

pub fn insert_account(conn: &Connection, account: &NewAccount<'_>) -> Result<Account, DbError> {
    let id = new_id();
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO accounts (id, email, display_name, password_hash, role, permissions,
                               documents_verified, verification_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            account.email,
            account.display_name,
            account.password_hash,
            account.role,
            to_json(&account.permissions)?,
            account.documents_verified,
            account.verification_status,
            format_timestamp(created_at),
        ],
    )?;
    read_account(conn, &id)?.ok_or(DbError::NotFound(id))
}

pub fn read_account(conn: &Connection, id: &str) -> Result<Option<Account>, DbError> {
    let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_account).optional()?)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?)
}

/// Returns the account together with its stored password hash.
pub fn read_credentials(conn: &Connection, email: &str) -> Result<Option<(Account, String)>, DbError> {
    let sql = format!("SELECT {}, password_hash FROM accounts WHERE email = ?1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, [email], |row| Ok((map_account(row)?, row.get(8)?)))
        .optional()?)
}

pub fn list_accounts(
    conn: &Connection,
    roles: &[Role],
    page: PageRequest,
) -> Result<(Vec<Account>, i64), DbError> {
    if roles.is_empty() {
        return Ok((Vec::new(), 0));
    }
    let placeholders = (1..=roles.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
    let role_params: Vec<&dyn rusqlite::ToSql> = roles.iter().map(|r| r as &dyn rusqlite::ToSql).collect();

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM accounts WHERE role IN ({})", placeholders),
        role_params.as_slice(),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM accounts WHERE role IN ({}) ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
        ACCOUNT_COLUMNS,
        placeholders,
        page.limit(),
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map(role_params.as_slice(), map_account)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((accounts, count))
}

pub fn list_by_role(conn: &Connection, role: Role) -> Result<Vec<Account>, DbError> {
    let sql = format!("SELECT {} FROM accounts WHERE role = ?1 ORDER BY email", ACCOUNT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map([role], map_account)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(accounts)
}

pub fn update_permissions(conn: &Connection, id: &str, permissions: &BTreeSet<String>) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE accounts SET permissions = ?1 WHERE id = ?2",
        params![to_json(permissions)?, id],
    )?)
}

pub fn update_verification(
    conn: &Connection,
    id: &str,
    documents_verified: bool,
    status: VerificationStatus,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE accounts SET documents_verified = ?1, verification_status = ?2 WHERE id = ?3",
        params![documents_verified, status, id],
    )?)
}

pub fn update_password_hash(conn: &Connection, email: &str, password_hash: &str) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE accounts SET password_hash = ?1 WHERE email = ?2",
        params![password_hash, email],
    )?)
}

pub fn delete_account(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::test_connection;

    fn reporter(email: &str) -> NewAccount<'_> {
        NewAccount {
            email,
            display_name: "Reporter",
            password_hash: "x",
            role: Role::Reporter,
            permissions: ["my-panel".to_string()].into_iter().collect(),
            documents_verified: false,
            verification_status: VerificationStatus::Pending,
        }
    }

    #[test]
    fn insert_then_read_keeps_permissions() {
        let conn = test_connection();
        let created = insert_account(&conn, &reporter("a@desk.test")).unwrap();
        let read = read_account(&conn, &created.id).unwrap().unwrap();
        assert_eq!(read, created);
        assert!(read.permissions.contains("my-panel"));
        assert!(email_exists(&conn, "a@desk.test").unwrap());
    }

    #[test]
    fn list_filters_by_role_and_counts() {
        let conn = test_connection();
        insert_account(&conn, &reporter("a@desk.test")).unwrap();
        insert_account(&conn, &reporter("b@desk.test")).unwrap();
        let mut admin = reporter("c@desk.test");
        admin.role = Role::Admin;
        insert_account(&conn, &admin).unwrap();

        let (rows, count) = list_accounts(&conn, &[Role::Reporter], PageRequest::new(1, 1)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].email, "b@desk.test");
    }
}
