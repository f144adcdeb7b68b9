use crate::helper::access_helpers::AccessList;
use crate::helper::account_helpers::{self, AccountError};
use crate::helper::feed_helpers::{self, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::middleware::{CurrentAccount, SESSION_ACCOUNT_KEY};
use crate::models::Account;
use crate::routes::{ApiError, ApiResponse};
use crate::{AppState, DbPool};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// What the console needs to decide which sections to show.
#[derive(Serialize)]
pub struct SessionView {
    pub account: Account,
    pub access: AccessList,
}

impl SessionView {
    pub fn new(account: Account) -> Self {
        let access = AccessList::for_account(&account);
        SessionView { account, access }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/signup", web::post().to(sign_up))
        .route("/auth/login", web::post().to(log_in))
        .route("/auth/logout", web::post().to(log_out))
        .route("/session", web::get().to(current_session));
}

async fn sign_up(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse, ApiError> {
    let form = body.into_inner();
    let cost = state.password_cost;
    let account = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::sign_up(conn, &form.email, &form.display_name, &form.password, cost)
    })
    .await?;
    state.change_feed.publish(feed_helpers::ACCOUNTS, ChangeKind::Insert, &account.id);
    Ok(HttpResponse::Created().json(ApiResponse::ok(account)))
}

async fn log_in(
    session: Session,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let form = body.into_inner();
    let result = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::log_in(conn, &form.email, &form.password)
    })
    .await;

    match result {
        Ok(account) => {
            session.renew();
            session.insert(SESSION_ACCOUNT_KEY, account.id.clone()).map_err(|e| {
                log::error!("Failed to write session: {}", e);
                ApiError::internal()
            })?;
            Ok(HttpResponse::Ok().json(ApiResponse::ok(SessionView::new(account))))
        }
        Err(e @ (AccountError::PendingVerification | AccountError::VerificationRejected)) => {
            // Credentials were right; no session may survive the gate.
            session.purge();
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn log_out(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(ApiResponse::ok("Logged out."))
}

async fn current_session(actor: CurrentAccount) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(SessionView::new(actor.0)))
}
