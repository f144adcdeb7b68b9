#![allow(dead_code)]

use actix_web::cookie::Key;
use actix_web::web;
use newsdesk_backend::helper::account_helpers;
use newsdesk_backend::helper::feed_helpers::ChangeFeed;
use newsdesk_backend::helper::media_helpers::MediaStore;
use newsdesk_backend::models::{Account, Role, VerificationStatus};
use newsdesk_backend::setup::db_setup;
use newsdesk_backend::{AppState, DbPool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery";
pub const COST: u32 = 4;

/// A file-backed database and media root that live as long as the test.
pub struct Desk {
    pub pool: DbPool,
    pub state: web::Data<AppState>,
    pub key: Key,
    _dir: TempDir,
}

pub fn desk() -> Desk {
    let dir = TempDir::new().unwrap();
    let db_file = dir.path().join("newsdesk.db");
    let mut conn = Connection::open(&db_file).unwrap();
    db_setup::setup_newsdesk_db(&mut conn).unwrap();

    let pool = r2d2::Pool::builder()
        .max_size(4)
        .build(SqliteConnectionManager::file(&db_file))
        .unwrap();
    let media = MediaStore::new(dir.path().join("media"), "http://localhost:8080", 1024 * 1024).unwrap();
    let state = web::Data::new(AppState {
        change_feed: ChangeFeed::default(),
        media,
        request_timeout: Duration::from_secs(5),
        password_cost: COST,
    });
    Desk { pool, state, key: Key::generate(), _dir: dir }
}

impl Desk {
    pub fn superadmin(&self, email: &str) -> Account {
        let conn = self.pool.get().unwrap();
        account_helpers::create_superadmin(&conn, email, "Chief", PASSWORD, COST).unwrap()
    }

    /// An admin created by `by`, optionally with its permissions replaced.
    pub fn admin(&self, by: &Account, email: &str, permissions: Option<&[&str]>) -> Account {
        let conn = self.pool.get().unwrap();
        let admin = account_helpers::create_admin(&conn, by, email, "Editor", PASSWORD, COST).unwrap();
        match permissions {
            Some(p) => {
                let p: Vec<String> = p.iter().map(|s| s.to_string()).collect();
                account_helpers::update_permissions(&conn, by, &admin.id, &p).unwrap()
            }
            None => admin,
        }
    }

    pub fn reporter(&self, by: &Account, email: &str, verified: bool) -> Account {
        let conn = self.pool.get().unwrap();
        let reporter = account_helpers::sign_up(&conn, email, "Reporter", PASSWORD, COST).unwrap();
        if verified {
            account_helpers::set_verification(&conn, by, &reporter.id, VerificationStatus::Approved).unwrap()
        } else {
            assert_eq!(reporter.role, Role::Reporter);
            reporter
        }
    }
}

/// Builds the `/api` service the way the server mounts it.
macro_rules! desk_app {
    ($desk:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($desk.pool.clone()))
                .app_data($desk.state.clone())
                .service(
                    actix_web::web::scope("/api")
                        .wrap(
                            actix_session::SessionMiddleware::builder(
                                actix_session::storage::CookieSessionStore::default(),
                                $desk.key.clone(),
                            )
                            .cookie_secure(false)
                            .build(),
                        )
                        .configure(newsdesk_backend::routes::config_api),
                ),
        )
        .await
    };
}

/// Logs in over HTTP and returns the session cookie.
macro_rules! log_in {
    ($app:expr, $email:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": $email, "password": common::PASSWORD }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK, "login of {} failed", $email);
        resp.response()
            .cookies()
            .find(|c| c.name() == "id")
            .expect("session cookie")
            .into_owned()
    }};
}
