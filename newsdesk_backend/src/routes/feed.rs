use crate::helper::account_helpers::{self, AccountError};
use crate::helper::feed_helpers::{self, ChangeEvent, ChangeKind};
use crate::helper::store_helpers::with_conn;
use crate::middleware::CurrentAccount;
use crate::models::Account;
use crate::routes::auth::SessionView;
use crate::{AppState, DbPool};
use actix_web::{web, Responder};
use actix_web_lab::sse::{self, Sse};
use futures_util::stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/feed", web::get().to(change_feed))
        .route("/session/stream", web::get().to(session_stream));
}

fn json_event(name: &'static str, value: &impl serde::Serialize) -> Option<sse::Event> {
    match sse::Data::new_json(value) {
        Ok(data) => Some(data.event(name).into()),
        Err(e) => {
            log::error!("Could not encode '{}' event: {}", name, e);
            None
        }
    }
}

/// Row-level change events for as long as the client keeps the stream open.
/// Reporters only receive changes to rows they can read.
async fn change_feed(actor: CurrentAccount, state: web::Data<AppState>) -> impl Responder {
    let viewer = actor.0;
    log::debug!("Account {} subscribed to the change feed", viewer.id);
    let rx = state.change_feed.subscribe();

    let events = stream::unfold((rx, viewer), |(mut rx, viewer)| async move {
        loop {
            match rx.recv().await {
                Ok(change) if change.visible_to(&viewer) => {
                    if let Some(event) = json_event("change", &change) {
                        return Some((Ok::<_, Infallible>(event), (rx, viewer)));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Change feed subscriber lagged, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::from_stream(events).with_keep_alive(KEEP_ALIVE)
}

struct SessionWatch {
    rx: broadcast::Receiver<ChangeEvent>,
    pool: DbPool,
    timeout: Duration,
    account_id: String,
    initial: Option<Account>,
    ended: bool,
}

impl SessionWatch {
    fn concerns_me(&self, change: &ChangeEvent) -> bool {
        change.table == feed_helpers::ACCOUNTS && change.row_id == self.account_id
    }

    async fn reload(&self) -> Result<Account, AccountError> {
        let id = self.account_id.clone();
        with_conn(&self.pool, self.timeout, move |conn| {
            account_helpers::load_session_account(conn, Some(&id))
        })
        .await
    }
}

/// The current account's access list, re-derived and re-sent whenever the
/// account row changes. Ends with an `ended` event once the session is no
/// longer valid (account deleted or no longer verified).
async fn session_stream(
    actor: CurrentAccount,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    let watch = SessionWatch {
        rx: state.change_feed.subscribe(),
        pool: pool.get_ref().clone(),
        timeout: state.request_timeout,
        account_id: actor.0.id.clone(),
        initial: Some(actor.0),
        ended: false,
    };

    let events = stream::unfold(watch, |mut watch| async move {
        if watch.ended {
            return None;
        }
        if let Some(account) = watch.initial.take() {
            let event = json_event("access", &SessionView::new(account))?;
            return Some((Ok::<_, Infallible>(event), watch));
        }
        loop {
            let refresh = match watch.rx.recv().await {
                Ok(change) if watch.concerns_me(&change) => {
                    if change.kind == ChangeKind::Delete {
                        watch.ended = true;
                        let event = json_event("ended", &json!({ "reason": "Account deleted." }))?;
                        return Some((Ok(event), watch));
                    }
                    true
                }
                Ok(_) => false,
                // Missed events may have included ours.
                Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => return None,
            };
            if !refresh {
                continue;
            }
            match watch.reload().await {
                Ok(account) => {
                    let event = json_event("access", &SessionView::new(account))?;
                    return Some((Ok(event), watch));
                }
                Err(AccountError::Database(e)) => {
                    log::error!("Could not refresh session of {}: {}", watch.account_id, e);
                }
                Err(e) => {
                    log::info!("Session of {} ended: {}", watch.account_id, e);
                    watch.ended = true;
                    let event = json_event("ended", &json!({ "reason": e.to_string() }))?;
                    return Some((Ok(event), watch));
                }
            }
        }
    });

    Sse::from_stream(events).with_keep_alive(KEEP_ALIVE)
}
