use crate::models::db_operations::{format_timestamp, new_id, timestamp_column, DbError};
use crate::models::Category;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: timestamp_column(row, 2)?,
    })
}

pub fn insert_category(conn: &Connection, name: &str) -> Result<Category, DbError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id, name, format_timestamp(Utc::now())],
    )?;
    read_category(conn, &id)?.ok_or(DbError::NotFound(id))
}

pub fn read_category(conn: &Connection, id: &str) -> Result<Option<Category>, DbError> {
    Ok(conn
        .query_row("SELECT id, name, created_at FROM categories WHERE id = ?1", [id], map_category)
        .optional()?)
}

/// Case-insensitive lookup, matching the column collation.
pub fn name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?1 COLLATE NOCASE AND id IS NOT ?2)",
        params![name, except_id],
        |row| row.get(0),
    )?)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM categories ORDER BY name COLLATE NOCASE")?;
    let rows = stmt.query_map([], map_category)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn rename_category(conn: &Connection, id: &str, name: &str) -> Result<usize, DbError> {
    Ok(conn.execute("UPDATE categories SET name = ?1 WHERE id = ?2", params![name, id])?)
}

/// Deletes the category only while no article references it. The reference
/// check and the delete are one statement.
pub fn delete_category_if_unused(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute(
        "DELETE FROM categories
         WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM articles WHERE category_id = ?1)",
        [id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::articles_db_operations::{self, ArticleContent};
    use crate::setup::db_setup::test_connection;

    #[test]
    fn referenced_category_survives_the_conditional_delete() {
        let conn = test_connection();
        let politics = insert_category(&conn, "Politics").unwrap();
        let article = articles_db_operations::insert_article(
            &conn,
            &ArticleContent {
                title: "Vote",
                excerpt: "",
                content: "body",
                cover_image: None,
                media: &[],
                links: &[],
                category_id: Some(&politics.id),
                is_breaking: false,
            },
            None,
        )
        .unwrap();

        assert_eq!(delete_category_if_unused(&conn, &politics.id).unwrap(), 0);
        assert!(read_category(&conn, &politics.id).unwrap().is_some());

        articles_db_operations::delete_article(&conn, &article.id).unwrap();
        assert_eq!(delete_category_if_unused(&conn, &politics.id).unwrap(), 1);
        assert!(read_category(&conn, &politics.id).unwrap().is_none());
    }
}
