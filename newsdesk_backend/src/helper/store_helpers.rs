use crate::models::db_operations::DbError;
use crate::DbPool;
use actix_web::web;
use rusqlite::Connection;
use std::time::Duration;

/// Runs `f` with a pooled connection on the blocking thread pool, bounded by
/// `timeout`. Dropping the returned future (client went away) abandons the
/// wait; the blocking call itself finishes on its own thread.
pub async fn with_conn<F, T, E>(pool: &DbPool, timeout: Duration, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<DbError> + Send + 'static,
{
    let pool = pool.clone();
    let task = web::block(move || {
        let conn = pool.get().map_err(|e| E::from(DbError::from(e)))?;
        f(&conn)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(blocking)) => {
            log::error!("Blocking store call failed: {}", blocking);
            Err(DbError::Blocking(blocking.to_string()).into())
        }
        Err(_) => {
            log::error!("Store call exceeded {:?}", timeout);
            Err(DbError::Timeout(timeout).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_sqlite::SqliteConnectionManager;

    fn pool() -> DbPool {
        r2d2::Pool::builder()
            .max_size(2)
            .build(SqliteConnectionManager::memory())
            .unwrap()
    }

    #[actix_web::test]
    async fn returns_the_closure_result() {
        let value: Result<i64, DbError> = with_conn(&pool(), Duration::from_secs(5), |conn| {
            Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get(0))?)
        })
        .await;
        assert_eq!(value.unwrap(), 42);
    }

    #[actix_web::test]
    async fn slow_calls_time_out() {
        let result: Result<(), DbError> = with_conn(&pool(), Duration::from_millis(20), |_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DbError::Timeout(_))));
    }
}
