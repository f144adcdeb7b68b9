use crate::helper::category_helpers;
use crate::helper::feed_helpers::{self, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::middleware::CurrentAccount;
use crate::routes::{ApiError, ApiResponse};
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/categories", web::get().to(list_categories))
        .route("/categories", web::post().to(create_category))
        .route("/categories/{id}", web::put().to(rename_category))
        .route("/categories/{id}", web::delete().to(delete_category));
}

async fn list_categories(
    _actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let categories = with_conn(&pool, state.request_timeout, category_helpers::list_categories).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(categories)))
}

async fn create_category(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<CategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = body.into_inner().name;
    let account = actor.0;
    let category = with_conn(&pool, state.request_timeout, move |conn| {
        category_helpers::create_category(conn, &account, &name)
    })
    .await?;
    state.change_feed.publish(feed_helpers::CATEGORIES, ChangeKind::Insert, &category.id);
    Ok(HttpResponse::Created().json(ApiResponse::ok(category)))
}

async fn rename_category(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let name = body.into_inner().name;
    let account = actor.0;
    let category = with_conn(&pool, state.request_timeout, move |conn| {
        category_helpers::rename_category(conn, &account, &id, &name)
    })
    .await?;
    state.change_feed.publish(feed_helpers::CATEGORIES, ChangeKind::Update, &category.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(category)))
}

async fn delete_category(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let account = actor.0;
    let deleted = with_conn(&pool, state.request_timeout, move |conn| {
        category_helpers::delete_category(conn, &account, &id)
    })
    .await?;
    state.change_feed.publish(feed_helpers::CATEGORIES, ChangeKind::Delete, &deleted.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(deleted)))
}
