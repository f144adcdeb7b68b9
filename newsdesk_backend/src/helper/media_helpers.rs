use crate::config::Config;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File type '{0}' is not allowed.")]
    UnsupportedType(String),
    #[error("File exceeds the maximum upload size of {0} MB.")]
    TooLarge(u64),
    #[error("Invalid object path '{0}'.")]
    InvalidPath(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid public URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Maps an allow-listed MIME type to the extension the object is stored with.
/// Only image and video types are accepted for article media.
pub fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

/// Article media lives under `articles/<account id>/`; the folder records who uploaded it.
pub const ARTICLE_MEDIA_PREFIX: &str = "articles";

pub fn owner_prefix(account_id: &str) -> String {
    format!("{}/{}", ARTICLE_MEDIA_PREFIX, account_id)
}

/// True when `object_path` sits directly in `account_id`'s upload folder.
pub fn uploaded_by(object_path: &str, account_id: &str) -> bool {
    let prefix = format!("{}/", owner_prefix(account_id));
    match object_path.strip_prefix(&prefix) {
        Some(name) => !name.is_empty() && !name.contains('/'),
        None => false,
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// Object storage rooted at `MEDIA_PATH`, served read-only under `/media`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    media_base: Url,
    max_size_bytes: u64,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_size_bytes: u64) -> Result<Self, MediaError> {
        let mut base = Url::parse(public_base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(MediaStore { root: root.into(), media_base: base.join("media/")?, max_size_bytes })
    }

    pub fn from_config(config: &Config) -> Result<Self, MediaError> {
        Self::new(&config.media_path, &config.public_base_url, config.max_upload_size_bytes())
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Object paths are relative, slash separated and may not escape the root.
    fn resolve(&self, object_path: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(object_path);
        let is_safe = !object_path.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_safe {
            return Err(MediaError::InvalidPath(object_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Stores `bytes` under `prefix/` with a generated name and returns its path and URL.
    pub fn upload(&self, prefix: &str, bytes: &[u8], mime_type: &str) -> Result<StoredObject, MediaError> {
        let extension = mime_to_safe_extension(mime_type)
            .ok_or_else(|| MediaError::UnsupportedType(mime_type.to_string()))?;
        if bytes.len() as u64 > self.max_size_bytes {
            return Err(MediaError::TooLarge(self.max_size_bytes / (1024 * 1024)));
        }

        let object_path = format!("{}/{}.{}", prefix.trim_matches('/'), Uuid::new_v4(), extension);
        let target = self.resolve(&object_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&target)?;
        file.write_all(bytes)?;

        log::info!("Stored media object '{}' ({} bytes)", object_path, bytes.len());
        Ok(StoredObject { url: self.public_url(&object_path)?, path: object_path })
    }

    pub fn public_url(&self, object_path: &str) -> Result<String, MediaError> {
        self.resolve(object_path)?;
        Ok(self.media_base.join(object_path)?.to_string())
    }

    /// Maps one of our own public URLs back to its object path. Foreign URLs
    /// (embeds, external images) yield `None`.
    pub fn object_path_for_url(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(self.media_base.as_str())?;
        self.resolve(rest).ok().map(|_| rest.to_string())
    }

    /// Removes objects; already-missing objects are not an error.
    pub fn remove(&self, object_paths: &[String]) -> Result<usize, MediaError> {
        let mut removed = 0;
        for object_path in object_paths {
            match fs::remove_file(self.resolve(object_path)?) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::warn!("Media object '{}' was already gone", object_path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}
