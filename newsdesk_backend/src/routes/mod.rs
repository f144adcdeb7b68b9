use crate::helper::access_helpers::AccessDenied;
use crate::helper::account_helpers::AccountError;
use crate::helper::article_helpers::ArticleError;
use crate::helper::category_helpers::CategoryError;
use crate::helper::media_helpers::MediaError;
use crate::helper::ticket_helpers::TicketError;
use crate::helper::workflow_helpers::WorkflowError;
use crate::models::db_operations::DbError;
use crate::models::PageRequest;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod accounts;
pub mod articles;
pub mod auth;
pub mod categories;
pub mod feed;
pub mod media;
pub mod tickets;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse { success: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse { success: false, data: None, error: Some(message.into()) }
    }
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest { page: self.page, limit: self.limit }
    }
}

// --- Error to HTTP mapping ---

/// Every handler error ends up here and is rendered as `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError { status, message: message.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not logged in.")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ApiResponse::failure(self.message.clone()))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Timeout(_) => Self::new(StatusCode::GATEWAY_TIMEOUT, "The data store did not answer in time."),
            DbError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, format!("Not found: {}", what)),
            other => {
                log::error!("Store failure: {}", other);
                Self::internal()
            }
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self {
        Self::new(StatusCode::FORBIDDEN, e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        use AccountError::*;
        let status = match e {
            Database(db) => return db.into(),
            Hash(ref hash) => {
                log::error!("Password hashing failed: {}", hash);
                return Self::internal();
            }
            InvalidEmail | EmptyName | WeakPassword | InvalidPermissions(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EmailTaken => StatusCode::CONFLICT,
            InvalidCredentials | Unauthenticated => StatusCode::UNAUTHORIZED,
            PendingVerification | VerificationRejected | NotAllowed(_) | Access(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
        };
        Self::new(status, e.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        let status = match e {
            WorkflowError::Database(db) => return db.into(),
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::IllegalTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Forbidden { .. } | WorkflowError::Access(_) => StatusCode::FORBIDDEN,
            WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ArticleError> for ApiError {
    fn from(e: ArticleError) -> Self {
        let status = match e {
            ArticleError::Database(db) => return db.into(),
            ArticleError::Media(media) => return media.into(),
            ArticleError::NotFound(_) => StatusCode::NOT_FOUND,
            ArticleError::UnknownCategory(_) | ArticleError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ArticleError::NotAllowed(_) | ArticleError::Access(_) => StatusCode::FORBIDDEN,
        };
        Self::new(status, e.to_string())
    }
}

impl From<CategoryError> for ApiError {
    fn from(e: CategoryError) -> Self {
        let status = match e {
            CategoryError::Database(db) => return db.into(),
            CategoryError::NotFound(_) => StatusCode::NOT_FOUND,
            CategoryError::EmptyName => StatusCode::UNPROCESSABLE_ENTITY,
            CategoryError::Duplicate(_) | CategoryError::InUse { .. } => StatusCode::CONFLICT,
            CategoryError::Access(_) => StatusCode::FORBIDDEN,
        };
        Self::new(status, e.to_string())
    }
}

impl From<TicketError> for ApiError {
    fn from(e: TicketError) -> Self {
        let status = match e {
            TicketError::Database(db) => return db.into(),
            TicketError::NotFound(_) => StatusCode::NOT_FOUND,
            TicketError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TicketError::Closed => StatusCode::CONFLICT,
            TicketError::NotAllowed(_) => StatusCode::FORBIDDEN,
        };
        Self::new(status, e.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        let status = match e {
            MediaError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MediaError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            MediaError::InvalidPath(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MediaError::Io(_) | MediaError::Url(_) => {
                log::error!("Media storage failure: {}", e);
                return Self::internal();
            }
        };
        Self::new(status, e.to_string())
    }
}

// --- Route Configuration ---

/// Mounts the whole JSON API; the caller wraps it in `/api` with sessions.
pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.configure(auth::config)
        .configure(feed::config)
        .configure(articles::config)
        .configure(categories::config)
        .configure(accounts::config)
        .configure(tickets::config)
        .configure(media::config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleStatus, Role};

    #[test]
    fn refusals_map_to_distinct_statuses() {
        let conflict: ApiError = WorkflowError::Conflict {
            expected: ArticleStatus::Pending,
            actual: ArticleStatus::Rejected,
        }
        .into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let forbidden: ApiError = WorkflowError::Forbidden {
            role: Role::Admin,
            from: ArticleStatus::Processing,
            to: ArticleStatus::Approved,
        }
        .into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let pending: ApiError = AccountError::PendingVerification.into();
        assert_eq!(pending.status(), StatusCode::FORBIDDEN);
        let in_use: ApiError = CategoryError::InUse { count: 3 }.into();
        assert_eq!(in_use.status(), StatusCode::CONFLICT);
        assert_eq!(in_use.message, "Cannot delete this category: 3 article(s) still use it.");
    }

    #[test]
    fn store_timeouts_are_gateway_timeouts() {
        let err: ApiError = TicketError::Database(DbError::Timeout(std::time::Duration::from_secs(10))).into();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        let err: ApiError = DbError::Blocking("worker gone".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
