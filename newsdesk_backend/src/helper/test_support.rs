//! Fixtures shared by the helper unit tests.

use crate::models::db_operations::accounts_db_operations::{self, NewAccount};
use crate::models::db_operations::articles_db_operations::{self, ArticleContent};
use crate::models::{Account, Article, Role, VerificationStatus};
use rusqlite::Connection;

/// Inserts a verified account holding exactly `permissions`.
pub fn account(conn: &Connection, role: Role, permissions: &[&str]) -> Account {
    let email = format!("{}@desk.test", uuid::Uuid::new_v4());
    accounts_db_operations::insert_account(
        conn,
        &NewAccount {
            email: &email,
            display_name: role.as_str(),
            password_hash: "unused",
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            documents_verified: true,
            verification_status: VerificationStatus::Approved,
        },
    )
    .expect("insert account")
}

pub fn article(conn: &Connection, title: &str, category_id: Option<&str>) -> Article {
    articles_db_operations::insert_article(
        conn,
        &ArticleContent {
            title,
            excerpt: "",
            content: "<p>body</p>",
            cover_image: None,
            media: &[],
            links: &[],
            category_id,
            is_breaking: false,
        },
        None,
    )
    .expect("insert article")
}
