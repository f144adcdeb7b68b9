use crate::helper::feed_helpers::{self, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::helper::ticket_helpers::{self, TicketError};
use crate::middleware::CurrentAccount;
use crate::models::db_operations::tickets_db_operations;
use crate::models::{PageRequest, TicketPriority, TicketStatus};
use crate::routes::{ApiError, ApiResponse};
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct NewTicketRequest {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/tickets", web::get().to(list_tickets))
        .route("/tickets", web::post().to(open_ticket))
        .route("/tickets/open-count", web::get().to(open_ticket_count))
        .route("/tickets/{id}", web::get().to(get_thread))
        .route("/tickets/{id}/replies", web::post().to(reply))
        .route("/tickets/{id}/status", web::put().to(set_status));
}

async fn list_tickets(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    query: web::Query<TicketListQuery>,
) -> Result<HttpResponse, ApiError> {
    let status = query.status;
    let page = PageRequest { page: query.page, limit: query.limit };
    let account = actor.0;
    let listed = with_conn(&pool, state.request_timeout, move |conn| {
        ticket_helpers::list_tickets(conn, &account, status, page)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listed)))
}

async fn open_ticket(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<NewTicketRequest>,
) -> Result<HttpResponse, ApiError> {
    let form = body.into_inner();
    let account = actor.0;
    let ticket = with_conn(&pool, state.request_timeout, move |conn| {
        ticket_helpers::open_ticket(conn, &account, &form.subject, &form.message, form.priority)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::SUPPORT_TICKETS, ChangeKind::Insert, &ticket.id, Some(ticket.created_by.as_str()));
    Ok(HttpResponse::Created().json(ApiResponse::ok(ticket)))
}

async fn open_ticket_count(
    _actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let count = with_conn(&pool, state.request_timeout, ticket_helpers::open_ticket_count).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "count": count }))))
}

async fn get_thread(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let account = actor.0;
    let thread = with_conn(&pool, state.request_timeout, move |conn| {
        ticket_helpers::get_thread(conn, &account, &id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(thread)))
}

async fn reply(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReplyRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let message = body.into_inner().message;
    let account = actor.0;
    let (reply, ticket_owner) = with_conn(&pool, state.request_timeout, move |conn| {
        let reply = ticket_helpers::reply(conn, &account, &id, &message)?;
        let owner = tickets_db_operations::read_ticket(conn, &id)?.map(|t| t.created_by);
        Ok::<_, TicketError>((reply, owner))
    })
    .await?;
    state
        .change_feed
        .publish_owned(feed_helpers::TICKET_REPLIES, ChangeKind::Insert, &reply.id, ticket_owner.as_deref());
    Ok(HttpResponse::Created().json(ApiResponse::ok(reply)))
}

async fn set_status(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    let account = actor.0;
    let ticket = with_conn(&pool, state.request_timeout, move |conn| {
        ticket_helpers::set_status(conn, &account, &id, status)
    })
    .await?;
    state.change_feed.publish_owned(feed_helpers::SUPPORT_TICKETS, ChangeKind::Update, &ticket.id, Some(ticket.created_by.as_str()));
    Ok(HttpResponse::Ok().json(ApiResponse::ok(ticket)))
}
