use crate::helper::access_helpers::{self, AccessDenied, Section};
use crate::helper::sanitization_helpers;
use crate::models::db_operations::{articles_db_operations, categories_db_operations, DbError};
use crate::models::{Account, Category};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CategoryError {
    #[error("Category not found: {0}")]
    NotFound(String),
    #[error("Category name cannot be empty.")]
    EmptyName,
    #[error("A category named '{0}' already exists.")]
    Duplicate(String),
    #[error("Cannot delete this category: {count} article(s) still use it.")]
    InUse { count: i64 },
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

fn clean_name(name: &str) -> Result<String, CategoryError> {
    let name = sanitization_helpers::strip_all_html(name.trim());
    if name.is_empty() {
        return Err(CategoryError::EmptyName);
    }
    Ok(name)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, CategoryError> {
    Ok(categories_db_operations::list_categories(conn)?)
}

pub fn create_category(conn: &Connection, actor: &Account, name: &str) -> Result<Category, CategoryError> {
    access_helpers::require_section(actor, Section::Categories)?;
    let name = clean_name(name)?;
    if categories_db_operations::name_taken(conn, &name, None)? {
        return Err(CategoryError::Duplicate(name));
    }
    let category = categories_db_operations::insert_category(conn, &name)?;
    log::info!("Category '{}' created by {}", category.name, actor.id);
    Ok(category)
}

pub fn rename_category(conn: &Connection, actor: &Account, id: &str, name: &str) -> Result<Category, CategoryError> {
    access_helpers::require_section(actor, Section::Categories)?;
    let name = clean_name(name)?;
    if categories_db_operations::name_taken(conn, &name, Some(id))? {
        return Err(CategoryError::Duplicate(name));
    }
    if categories_db_operations::rename_category(conn, id, &name)? == 0 {
        return Err(CategoryError::NotFound(id.to_string()));
    }
    categories_db_operations::read_category(conn, id)?.ok_or_else(|| CategoryError::NotFound(id.to_string()))
}

/// Number of articles that would block deleting the category.
pub fn blocking_article_count(conn: &Connection, id: &str) -> Result<i64, CategoryError> {
    Ok(articles_db_operations::count_by_category(conn, id)?)
}

/// Deletes a category only when no article references it. The store does
/// not enforce this relation; the reference check is folded into the delete.
pub fn delete_category(conn: &Connection, actor: &Account, id: &str) -> Result<Category, CategoryError> {
    access_helpers::require_section(actor, Section::Categories)?;
    let category = categories_db_operations::read_category(conn, id)?
        .ok_or_else(|| CategoryError::NotFound(id.to_string()))?;

    if categories_db_operations::delete_category_if_unused(conn, id)? == 0 {
        let count = blocking_article_count(conn, id)?;
        if count == 0 {
            return Err(CategoryError::NotFound(id.to_string()));
        }
        log::warn!("Refused to delete category '{}': {} article(s) reference it", category.name, count);
        return Err(CategoryError::InUse { count });
    }

    log::info!("Category '{}' deleted by {}", category.name, actor.id);
    Ok(category)
}
