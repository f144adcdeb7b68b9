use crate::helper::article_helpers;
use crate::helper::media_helpers::{self, MediaError};
use crate::middleware::CurrentAccount;
use crate::routes::{ApiError, ApiResponse};
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{web, web::BytesMut, HttpResponse};
use futures_util::StreamExt;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/media", web::post().to(upload_media));
}

/// Accepts one `file` part and stores it in the uploader's folder. The size
/// cap is enforced while streaming so an oversized upload is never fully buffered.
async fn upload_media(
    actor: CurrentAccount,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    article_helpers::require_submit_access(&actor.0)?;
    let max_size = state.media.max_size_bytes();

    let mut upload: Option<(String, BytesMut)> = None;
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?;
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        let mime = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .ok_or_else(|| ApiError::bad_request("Content-Type not available."))?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?;
            if (data.len() + chunk.len()) as u64 > max_size {
                return Err(MediaError::TooLarge(max_size / (1024 * 1024)).into());
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((mime, data));
        break;
    }

    let (mime, data) = upload.ok_or_else(|| ApiError::bad_request("No 'file' part in the upload."))?;
    let store = state.media.clone();
    let prefix = media_helpers::owner_prefix(&actor.0.id);
    let stored = web::block(move || store.upload(&prefix, &data, &mime))
        .await
        .map_err(|e| {
            log::error!("Upload task failed: {}", e);
            ApiError::internal()
        })??;

    log::info!("Account {} uploaded {}", actor.0.id, stored.path);
    Ok(HttpResponse::Created().json(ApiResponse::ok(stored)))
}
