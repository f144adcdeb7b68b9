use crate::helper::article_helpers;
use crate::helper::feed_helpers::{self, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::helper::workflow_helpers;
use crate::middleware::CurrentAccount;
use crate::models::db_operations::articles_db_operations::ArticleFilter;
use crate::models::{Article, ArticleDraft, ArticlePatch, ArticleStatus, PageRequest};
use crate::routes::{ApiError, ApiResponse, PaginationQuery};
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ArticleListQuery {
    /// Comma separated, e.g. `pending,processing`.
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ArticleListQuery {
    fn filter(&self) -> Result<ArticleFilter, ApiError> {
        let statuses = match &self.status {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<ArticleStatus>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(ArticleFilter {
            statuses,
            category_id: self.category_id.clone().filter(|s| !s.is_empty()),
            author_id: self.author_id.clone().filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    /// The status the caller last saw; the write is refused if it changed.
    pub expected: ArticleStatus,
    pub target: ArticleStatus,
}

/// An article plus the transitions the viewer may trigger on it.
#[derive(Serialize)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    pub available_transitions: Vec<ArticleStatus>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/articles", web::get().to(list_articles))
        .route("/articles", web::post().to(create_article))
        .route("/articles/{id}", web::get().to(get_article))
        .route("/articles/{id}", web::put().to(edit_article))
        .route("/articles/{id}", web::delete().to(delete_article))
        .route("/articles/{id}/transition", web::post().to(transition_article))
        .route("/approval-queue", web::get().to(approval_queue));
}

async fn list_articles(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    query: web::Query<ArticleListQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.filter()?;
    let page = PageRequest { page: query.page, limit: query.limit };
    let account = actor.0;
    let listed = with_conn(&pool, state.request_timeout, move |conn| {
        article_helpers::list_articles(conn, &account, filter, page)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listed)))
}

async fn create_article(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<ArticleDraft>,
) -> Result<HttpResponse, ApiError> {
    let draft = body.into_inner();
    let account = actor.0;
    let store = state.media.clone();
    let article = with_conn(&pool, state.request_timeout, move |conn| {
        article_helpers::create_article(conn, &store, &account, &draft)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::ARTICLES, ChangeKind::Insert, &article.id, article.author_id.as_deref());
    Ok(HttpResponse::Created().json(ApiResponse::ok(article)))
}

async fn get_article(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let account = actor.0;
    let viewer = account.clone();
    let article = with_conn(&pool, state.request_timeout, move |conn| {
        article_helpers::get_article(conn, &account, &id)
    })
    .await?;
    let available_transitions = workflow_helpers::transitions_for(article.status, &viewer);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(ArticleView { article, available_transitions })))
}

async fn edit_article(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ArticlePatch>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let patch = body.into_inner();
    let account = actor.0;
    let store = state.media.clone();
    let article = with_conn(&pool, state.request_timeout, move |conn| {
        article_helpers::edit_article(conn, &store, &account, &id, &patch)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::ARTICLES, ChangeKind::Update, &article.id, article.author_id.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::ok(article)))
}

async fn delete_article(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let account = actor.0;
    let store = state.media.clone();
    let deleted = with_conn(&pool, state.request_timeout, move |conn| {
        article_helpers::delete_article(conn, &store, &account, &id)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::ARTICLES, ChangeKind::Delete, &deleted.id, deleted.author_id.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::ok(deleted)))
}

async fn transition_article(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TransitionRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let TransitionRequest { expected, target } = body.into_inner();
    let account = actor.0;
    let article = with_conn(&pool, state.request_timeout, move |conn| {
        workflow_helpers::transition_article(conn, &account, &id, expected, target)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::ARTICLES, ChangeKind::Update, &article.id, article.author_id.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::ok(article)))
}

async fn approval_queue(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page_request();
    let account = actor.0;
    let queue = with_conn(&pool, state.request_timeout, move |conn| {
        workflow_helpers::approval_queue(conn, &account, page)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(queue)))
}
