// Image hosting - uploads return a public URL, deletes take the id derived from that URL

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store an image payload and return the URL it is served from.
    async fn upload(&self, payload: &str) -> AppResult<String>;

    /// Remove a previously uploaded image. Unknown ids are not an error.
    async fn destroy(&self, public_id: &str) -> AppResult<()>;
}

/// Last path segment of an image URL with its extension stripped,
/// e.g. `https://host/uploads/abc123.png` -> `abc123`.
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let file_name = path.rsplit('/').next()?;
    let id = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    (!id.is_empty()).then_some(id)
}

/// Release a hosted image without failing the caller.
pub async fn release_image(host: &dyn ImageHost, url: &str) {
    if url.is_empty() {
        return;
    }
    match public_id_from_url(url) {
        Some(public_id) => {
            if let Err(e) = host.destroy(public_id).await {
                warn!("Failed to release hosted image {}: {}", url, e);
            }
        }
        None => warn!("Cannot derive hosted image id from {:?}", url),
    }
}

const SUPPORTED_TYPES: [(&str, &str); 5] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Decoded `data:<mime>;base64,<payload>` image.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUrlImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub fn parse_data_url(payload: &str) -> AppResult<DataUrlImage> {
    let invalid = || AppError::BadRequest("Image must be a base64 data URL".to_string());

    let rest = payload.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, data) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = meta.strip_suffix(";base64").ok_or_else(invalid)?;

    let extension = SUPPORTED_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported image type: {}", mime)))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DataUrlImage { extension, bytes })
}

/// Stores images on local disk; the directory is served by the HTTP router.
pub struct LocalImageHost {
    dir: PathBuf,
    public_url: String,
}

impl LocalImageHost {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload(&self, payload: &str) -> AppResult<String> {
        let image = parse_data_url(payload)?;
        let public_id = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}.{}", public_id, image.extension);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::ImageHostError(format!("Failed to create {}: {}", self.dir.display(), e)))?;
        tokio::fs::write(self.dir.join(&file_name), &image.bytes)
            .await
            .map_err(|e| AppError::ImageHostError(format!("Failed to store {}: {}", file_name, e)))?;

        info!("Stored image {} ({} bytes)", file_name, image.bytes.len());
        Ok(format!("{}/{}", self.public_url, file_name))
    }

    async fn destroy(&self, public_id: &str) -> AppResult<()> {
        // Ids are generated hex strings; anything else cannot name one of our files
        if public_id.is_empty() || !public_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(AppError::ImageHostError(format!("Invalid image id {:?}", public_id)));
        }

        for (_, extension) in SUPPORTED_TYPES {
            let path = self.dir.join(format!("{}.{}", public_id, extension));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Removed image {}", path.display());
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(AppError::ImageHostError(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    // 1x1 transparent PNG
    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn host(dir: &Path) -> LocalImageHost {
        LocalImageHost::new(&MediaConfig {
            dir: dir.to_path_buf(),
            route: "/uploads".to_string(),
            public_url: "http://localhost:5000/uploads/".to_string(),
        })
    }

    #[test]
    fn test_public_id_from_url() {
        assert_eq!(public_id_from_url("https://cdn.example.com/v1/abc123.png"), Some("abc123"));
        assert_eq!(public_id_from_url("/uploads/abc123.jpg?w=200"), Some("abc123"));
        assert_eq!(public_id_from_url("/uploads/abc123"), Some("abc123"));
        assert_eq!(public_id_from_url("https://cdn.example.com/"), None);
        assert_eq!(public_id_from_url(""), None);
    }

    #[test]
    fn test_parse_data_url() {
        let image = parse_data_url(PIXEL).unwrap();
        assert_eq!(image.extension, "png");
        assert!(image.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        assert!(matches!(parse_data_url("https://example.com/a.png"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_data_url("data:text/plain;base64,aGk="), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_data_url("data:image/png;base64,%%%"), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_upload_then_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(dir.path());

        let url = host.upload(PIXEL).await.unwrap();
        assert!(url.starts_with("http://localhost:5000/uploads/"));
        assert!(url.ends_with(".png"));

        let public_id = public_id_from_url(&url).unwrap();
        let stored = dir.path().join(format!("{}.png", public_id));
        assert!(stored.exists());

        host.destroy(public_id).await.unwrap();
        assert!(!stored.exists());

        // second delete is a no-op
        host.destroy(public_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(dir.path());
        assert!(host.destroy("../secrets").await.is_err());
    }
}
