use crate::helper::account_helpers;
use crate::helper::feed_helpers::{self, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::middleware::CurrentAccount;
use crate::models::{PageRequest, Role, VerificationStatus};
use crate::routes::{ApiError, ApiResponse};
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct AccountListQuery {
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct NewAdminRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub status: VerificationStatus,
}

#[derive(Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Vec<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/accounts", web::get().to(list_accounts))
        .route("/accounts/admins", web::post().to(create_admin))
        .route("/accounts/{id}/verification", web::put().to(set_verification))
        .route("/accounts/{id}/permissions", web::put().to(update_permissions))
        .route("/accounts/{id}", web::delete().to(delete_account));
}

async fn list_accounts(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    query: web::Query<AccountListQuery>,
) -> Result<HttpResponse, ApiError> {
    let role = query.role;
    let page = PageRequest { page: query.page, limit: query.limit };
    let account = actor.0;
    let listed = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::list_accounts(conn, &account, role, page)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listed)))
}

async fn create_admin(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<NewAdminRequest>,
) -> Result<HttpResponse, ApiError> {
    let form = body.into_inner();
    let account = actor.0;
    let cost = state.password_cost;
    let created = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::create_admin(conn, &account, &form.email, &form.display_name, &form.password, cost)
    })
    .await?;
    state.change_feed.publish(feed_helpers::ACCOUNTS, ChangeKind::Insert, &created.id);
    Ok(HttpResponse::Created().json(ApiResponse::ok(created)))
}

async fn set_verification(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<VerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let decision = body.into_inner().status;
    let account = actor.0;
    let updated = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::set_verification(conn, &account, &id, decision)
    })
    .await?;
    state.change_feed.publish(feed_helpers::ACCOUNTS, ChangeKind::Update, &updated.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(updated)))
}

async fn update_permissions(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PermissionsRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let requested = body.into_inner().permissions;
    let account = actor.0;
    let updated = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::update_permissions(conn, &account, &id, &requested)
    })
    .await?;
    // Open session streams of this account re-derive their access list.
    state.change_feed.publish(feed_helpers::ACCOUNTS, ChangeKind::Update, &updated.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(updated)))
}

async fn delete_account(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let account = actor.0;
    let deleted = with_conn(&pool, state.request_timeout, move |conn| {
        account_helpers::delete_account(conn, &account, &id)
    })
    .await?;
    state.change_feed.publish(feed_helpers::ACCOUNTS, ChangeKind::Delete, &deleted.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(deleted)))
}
