use crate::helper::account_helpers::{self, AccountError};
use crate::helper::store_helpers;
use crate::models::Account;
use crate::routes::ApiError;
use crate::{AppState, DbPool};
use actix_session::{Session, SessionExt};
use actix_web::{dev, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;

pub const SESSION_ACCOUNT_KEY: &str = "account_id";

pub fn session_account_id(session: &Session) -> Option<String> {
    session.get::<String>(SESSION_ACCOUNT_KEY).unwrap_or_else(|e| {
        log::warn!("Unreadable session cookie: {}", e);
        None
    })
}

/// The logged-in account, re-read from the store on every request so that
/// role, permission and verification changes apply immediately.
pub struct CurrentAccount(pub Account);

impl FromRequest for CurrentAccount {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        let pool = req.app_data::<web::Data<DbPool>>().cloned();
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let (pool, state) = match (pool, state) {
                (Some(pool), Some(state)) => (pool, state),
                _ => {
                    log::error!("CurrentAccount used without DbPool/AppState app data");
                    return Err(ApiError::unauthorized());
                }
            };
            let account_id = session_account_id(&session).ok_or_else(ApiError::unauthorized)?;

            let loaded = store_helpers::with_conn(&pool, state.request_timeout, move |conn| {
                account_helpers::load_session_account(conn, Some(&account_id))
            })
            .await;

            match loaded {
                Ok(account) => Ok(CurrentAccount(account)),
                Err(AccountError::Database(e)) => Err(e.into()),
                Err(e) => {
                    // Deleted, or no longer verified: the session is over.
                    session.purge();
                    Err(e.into())
                }
            }
        })
    }
}
