use crate::models::db_operations::{
    format_timestamp, json_column, new_id, optional_timestamp_column, timestamp_column, to_json, DbError,
};
use crate::models::{Article, ArticleStatus, ExternalLink, MediaItem, PageRequest};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

const ARTICLE_COLUMNS: &str = "id, title, excerpt, content, cover_image, media, links, category_id, author_id, \
     status, is_breaking, reviewed_by, reviewed_at, views, shares, created_at, updated_at";

fn map_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        excerpt: row.get(2)?,
        content: row.get(3)?,
        cover_image: row.get(4)?,
        media: json_column(row, 5)?,
        links: json_column(row, 6)?,
        category_id: row.get(7)?,
        author_id: row.get(8)?,
        status: row.get(9)?,
        is_breaking: row.get(10)?,
        reviewed_by: row.get(11)?,
        reviewed_at: optional_timestamp_column(row, 12)?,
        views: row.get(13)?,
        shares: row.get(14)?,
        created_at: timestamp_column(row, 15)?,
        updated_at: optional_timestamp_column(row, 16)?,
    })
}

/// Content columns shared by insert and full-row updates.
pub struct ArticleContent<'a> {
    pub title: &'a str,
    pub excerpt: &'a str,
    pub content: &'a str,
    pub cover_image: Option<&'a str>,
    pub media: &'a [MediaItem],
    pub links: &'a [ExternalLink],
    pub category_id: Option<&'a str>,
    pub is_breaking: bool,
}

/// Inserts a new article. Every article enters the store as `pending`.
pub fn insert_article(
    conn: &Connection,
    content: &ArticleContent<'_>,
    author_id: Option<&str>,
) -> Result<Article, DbError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO articles (id, title, excerpt, content, cover_image, media, links, category_id,
                               author_id, status, is_breaking, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            content.title,
            content.excerpt,
            content.content,
            content.cover_image,
            to_json(&content.media)?,
            to_json(&content.links)?,
            content.category_id,
            author_id,
            ArticleStatus::Pending,
            content.is_breaking,
            format_timestamp(Utc::now()),
        ],
    )?;
    read_article(conn, &id)?.ok_or(DbError::NotFound(id))
}

pub fn read_article(conn: &Connection, id: &str) -> Result<Option<Article>, DbError> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_article).optional()?)
}

/// Rewrites the content columns of an article. Status and review columns are untouched.
pub fn update_article_content(conn: &Connection, id: &str, content: &ArticleContent<'_>) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE articles SET title = ?1, excerpt = ?2, content = ?3, cover_image = ?4, media = ?5,
                             links = ?6, category_id = ?7, is_breaking = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            content.title,
            content.excerpt,
            content.content,
            content.cover_image,
            to_json(&content.media)?,
            to_json(&content.links)?,
            content.category_id,
            content.is_breaking,
            format_timestamp(Utc::now()),
            id,
        ],
    )?)
}

/// Compare-and-set of the workflow columns. Status, reviewer and review time
/// are written by one single-row UPDATE, and only while the stored status
/// still equals `expected`. Returns the number of rows changed (0 or 1).
pub fn update_status_if(
    conn: &Connection,
    id: &str,
    expected: ArticleStatus,
    target: ArticleStatus,
    reviewer_id: &str,
    reviewed_at: DateTime<Utc>,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE articles SET status = ?1, reviewed_by = ?2, reviewed_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![target, reviewer_id, format_timestamp(reviewed_at), id, expected],
    )?)
}

pub fn delete_article(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM articles WHERE id = ?1", [id])?)
}

/// Whether any article still uses `url` as its cover or in its gallery.
pub fn media_url_in_use(conn: &Connection, url: &str) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM articles
             WHERE cover_image = ?1
                OR EXISTS (SELECT 1 FROM json_each(articles.media)
                           WHERE json_extract(json_each.value, '$.url') = ?1)
         )",
        [url],
        |row| row.get(0),
    )?)
}

pub fn count_by_category(conn: &Connection, category_id: &str) -> Result<i64, DbError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM articles WHERE category_id = ?1",
        [category_id],
        |row| row.get(0),
    )?)
}

#[derive(Debug, Default, Clone)]
pub struct ArticleFilter {
    pub statuses: Vec<ArticleStatus>,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
}

/// Filtered listing, newest first, with the total count of matching rows.
pub fn list_articles(
    conn: &Connection,
    filter: &ArticleFilter,
    page: PageRequest,
) -> Result<(Vec<Article>, i64), DbError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if !filter.statuses.is_empty() {
        let start = values.len();
        let placeholders = (0..filter.statuses.len())
            .map(|i| format!("?{}", start + i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        clauses.push(format!("status IN ({})", placeholders));
        values.extend(filter.statuses.iter().map(|s| s as &dyn ToSql));
    }
    if let Some(category_id) = &filter.category_id {
        values.push(category_id);
        clauses.push(format!("category_id = ?{}", values.len()));
    }
    if let Some(author_id) = &filter.author_id {
        values.push(author_id);
        clauses.push(format!("author_id = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM articles {}", where_sql),
        values.as_slice(),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM articles {} ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
        ARTICLE_COLUMNS,
        where_sql,
        page.limit(),
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let articles = stmt
        .query_map(values.as_slice(), map_article)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((articles, count))
}
