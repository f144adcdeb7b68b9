use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::helper::feed_helpers::ChangeFeed;
use crate::helper::media_helpers::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared by every worker; cloned into `web::Data` once at startup.
pub struct AppState {
    pub change_feed: ChangeFeed,
    pub media: MediaStore,
    pub request_timeout: Duration,
    /// bcrypt cost for new password hashes.
    pub password_cost: u32,
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
