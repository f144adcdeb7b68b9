use crate::helper::access_helpers::{self, AccessDenied, Section};
use crate::helper::media_helpers::{self, MediaError, MediaStore};
use crate::helper::sanitization_helpers;
use crate::models::db_operations::articles_db_operations::{self, ArticleContent, ArticleFilter};
use crate::models::db_operations::{categories_db_operations, DbError};
use crate::models::{
    Account, Article, ArticleDraft, ArticlePatch, ArticleStatus, ExternalLink, MediaItem, Page, PageRequest, Role,
};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArticleError {
    #[error("Article not found: {0}")]
    NotFound(String),
    #[error("Category not found: {0}")]
    UnknownCategory(String),
    #[error("{0}")]
    Invalid(String),
    #[error("You do not have permission to {0} this article.")]
    NotAllowed(&'static str),
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Media storage error: {0}")]
    Media(#[from] MediaError),
}

/// Submitting articles or uploading their media needs `news` or `my-panel`.
pub fn require_submit_access(actor: &Account) -> Result<(), AccessDenied> {
    if access_helpers::can_access(actor.role, &actor.permissions, Section::News)
        || access_helpers::can_access(actor.role, &actor.permissions, Section::MyPanel)
    {
        Ok(())
    } else {
        Err(AccessDenied { section: Section::News })
    }
}

fn is_author(actor: &Account, article: &Article) -> bool {
    article.author_id.as_deref() == Some(actor.id.as_str())
}

fn clean_media(media: &[MediaItem]) -> Vec<MediaItem> {
    let mut items: Vec<MediaItem> = media
        .iter()
        .filter(|item| !item.url.trim().is_empty())
        .map(|item| MediaItem { kind: item.kind, url: item.url.trim().to_string(), order: item.order })
        .collect();
    items.sort_by_key(|item| item.order);
    items
}

fn clean_links(links: &[ExternalLink]) -> Vec<ExternalLink> {
    links
        .iter()
        .filter(|link| !link.url.trim().is_empty())
        .map(|link| ExternalLink {
            url: link.url.trim().to_string(),
            label: sanitization_helpers::strip_all_html(link.label.trim()),
        })
        .collect()
}

/// Store URLs an article may carry: objects the actor uploaded, plus any the
/// article already had. Foreign URLs are not ours to check.
fn ensure_media_allowed<'a>(
    store: &MediaStore,
    actor: &Account,
    urls: impl IntoIterator<Item = &'a str>,
    already_attached: &[&str],
) -> Result<(), ArticleError> {
    for url in urls {
        let Some(path) = store.object_path_for_url(url) else { continue };
        if !media_helpers::uploaded_by(&path, &actor.id) && !already_attached.iter().any(|known| *known == url) {
            log::warn!("Account {} tried to attach media it did not upload: {}", actor.id, path);
            return Err(ArticleError::Invalid(format!("Media '{}' was not uploaded by you.", url)));
        }
    }
    Ok(())
}

fn attached_urls(article: &Article) -> Vec<&str> {
    article
        .cover_image
        .as_deref()
        .into_iter()
        .chain(article.media.iter().map(|item| item.url.as_str()))
        .collect()
}

fn ensure_category(conn: &Connection, category_id: Option<&str>) -> Result<(), ArticleError> {
    if let Some(id) = category_id {
        if categories_db_operations::read_category(conn, id)?.is_none() {
            return Err(ArticleError::UnknownCategory(id.to_string()));
        }
    }
    Ok(())
}

/// Submits a new article. It always enters the workflow as `pending`.
pub fn create_article(
    conn: &Connection,
    store: &MediaStore,
    actor: &Account,
    draft: &ArticleDraft,
) -> Result<Article, ArticleError> {
    require_submit_access(actor)?;

    let title = sanitization_helpers::strip_all_html(draft.title.trim());
    let excerpt = sanitization_helpers::strip_all_html(draft.excerpt.trim());
    let content = sanitization_helpers::sanitize_rich_text(draft.content.trim());
    if title.is_empty() || content.is_empty() {
        return Err(ArticleError::Invalid("Title and content are required.".to_string()));
    }
    let category_id = draft.category_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    ensure_category(conn, category_id)?;

    let media = clean_media(&draft.media);
    let links = clean_links(&draft.links);
    let cover_image = draft.cover_image.as_deref().map(str::trim).filter(|s| !s.is_empty());
    ensure_media_allowed(store, actor, cover_image.into_iter().chain(media.iter().map(|m| m.url.as_str())), &[])?;

    let article = articles_db_operations::insert_article(
        conn,
        &ArticleContent {
            title: &title,
            excerpt: &excerpt,
            content: &content,
            cover_image,
            media: &media,
            links: &links,
            category_id,
            is_breaking: draft.is_breaking,
        },
        Some(&actor.id),
    )?;
    log::info!("Article {} submitted by {}", article.id, actor.id);
    Ok(article)
}

/// Reads one article. Reporters can only read their own.
pub fn get_article(conn: &Connection, actor: &Account, id: &str) -> Result<Article, ArticleError> {
    let article = articles_db_operations::read_article(conn, id)?
        .ok_or_else(|| ArticleError::NotFound(id.to_string()))?;
    if actor.role == Role::Reporter && !is_author(actor, &article) {
        return Err(ArticleError::NotFound(id.to_string()));
    }
    Ok(article)
}

/// Lists articles newest first. Reporters are always scoped to their own.
pub fn list_articles(
    conn: &Connection,
    actor: &Account,
    mut filter: ArticleFilter,
    page: PageRequest,
) -> Result<Page<Article>, ArticleError> {
    match actor.role {
        Role::Reporter => {
            access_helpers::require_section(actor, Section::MyPanel)?;
            filter.author_id = Some(actor.id.clone());
        }
        Role::Admin | Role::Superadmin => access_helpers::require_section(actor, Section::News)?,
    }
    let (data, count) = articles_db_operations::list_articles(conn, &filter, page)?;
    Ok(Page { data, count })
}

/// Edits content in place. Admin-tier accounts with `news` may edit any
/// article in any status; an author may edit their own while it is pending.
/// Status is not part of the patch and cannot change here.
pub fn edit_article(
    conn: &Connection,
    store: &MediaStore,
    actor: &Account,
    id: &str,
    patch: &ArticlePatch,
) -> Result<Article, ArticleError> {
    let current = articles_db_operations::read_article(conn, id)?
        .ok_or_else(|| ArticleError::NotFound(id.to_string()))?;

    let allowed = if actor.role.is_admin_tier() {
        access_helpers::require_section(actor, Section::News)?;
        true
    } else {
        is_author(actor, &current) && current.status == ArticleStatus::Pending
    };
    if !allowed {
        return Err(ArticleError::NotAllowed("edit"));
    }

    let title = match &patch.title {
        Some(t) => sanitization_helpers::strip_all_html(t.trim()),
        None => current.title.clone(),
    };
    let excerpt = match &patch.excerpt {
        Some(e) => sanitization_helpers::strip_all_html(e.trim()),
        None => current.excerpt.clone(),
    };
    let content = match &patch.content {
        Some(c) => sanitization_helpers::sanitize_rich_text(c.trim()),
        None => current.content.clone(),
    };
    if title.is_empty() || content.is_empty() {
        return Err(ArticleError::Invalid("Title and content cannot be empty.".to_string()));
    }

    let category_id = match &patch.category_id {
        Some(c) if c.trim().is_empty() => None,
        Some(c) => Some(c.trim().to_string()),
        None => current.category_id.clone(),
    };
    ensure_category(conn, category_id.as_deref())?;

    let cover_image = match &patch.cover_image {
        Some(c) if c.trim().is_empty() => None,
        Some(c) => Some(c.trim().to_string()),
        None => current.cover_image.clone(),
    };
    let media = patch.media.as_deref().map(clean_media).unwrap_or_else(|| current.media.clone());
    let links = patch.links.as_deref().map(clean_links).unwrap_or_else(|| current.links.clone());
    ensure_media_allowed(
        store,
        actor,
        cover_image.as_deref().into_iter().chain(media.iter().map(|m| m.url.as_str())),
        &attached_urls(&current),
    )?;

    articles_db_operations::update_article_content(
        conn,
        id,
        &ArticleContent {
            title: &title,
            excerpt: &excerpt,
            content: &content,
            cover_image: cover_image.as_deref(),
            media: &media,
            links: &links,
            category_id: category_id.as_deref(),
            is_breaking: patch.is_breaking.unwrap_or(current.is_breaking),
        },
    )?;
    log::info!("Article {} edited by {}", id, actor.id);
    articles_db_operations::read_article(conn, id)?.ok_or_else(|| ArticleError::NotFound(id.to_string()))
}

/// Object paths the article owns: uploads by its author that no other
/// article references. Call after the article row is gone.
pub fn owned_media_paths(conn: &Connection, store: &MediaStore, article: &Article) -> Result<Vec<String>, DbError> {
    let Some(author_id) = article.author_id.as_deref() else { return Ok(Vec::new()) };
    let mut paths: Vec<String> = Vec::new();
    for url in attached_urls(article) {
        let Some(path) = store.object_path_for_url(url) else { continue };
        if !media_helpers::uploaded_by(&path, author_id) || paths.contains(&path) {
            continue;
        }
        if articles_db_operations::media_url_in_use(conn, url)? {
            log::debug!("Keeping '{}', another article still uses it", path);
            continue;
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Deletes an article (author, or admin-tier with `news`) and releases the
/// media objects it owns. The row goes first; storage cleanup failures are
/// logged, not surfaced, since the article is already gone.
pub fn delete_article(conn: &Connection, store: &MediaStore, actor: &Account, id: &str) -> Result<Article, ArticleError> {
    let article = articles_db_operations::read_article(conn, id)?
        .ok_or_else(|| ArticleError::NotFound(id.to_string()))?;

    let allowed = is_author(actor, &article)
        || (actor.role.is_admin_tier()
            && access_helpers::can_access(actor.role, &actor.permissions, Section::News));
    if !allowed {
        return Err(ArticleError::NotAllowed("delete"));
    }

    articles_db_operations::delete_article(conn, id)?;
    let owned = owned_media_paths(conn, store, &article)?;
    if !owned.is_empty() {
        if let Err(e) = store.remove(&owned) {
            log::error!("Article {} deleted but its media could not be removed: {}", id, e);
        }
    }
    log::info!("Article {} deleted by {}", id, actor.id);
    Ok(article)
}
