//! Object storage (`/storage/v1/object/*`).

use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use super::BackendClient;
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

impl BackendClient {
    /// Uploads `body` to `bucket/path`, replacing any existing object.
    /// Returns the stored object key.
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, AppError> {
        let size = body.len();
        let request = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .await?
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(body);
        let response: UploadResponse = self.send_json(request).await?;
        info!("Uploaded {size} bytes to {bucket}/{path}");
        Ok(response.key.unwrap_or_else(|| format!("{bucket}/{path}")))
    }

    /// Public URL of an object in a public bucket. No request is made.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{bucket}/{path}"))
    }
}

/// Guesses a content type from a file name, for image uploads.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::session::SessionStore;

    #[test]
    fn test_public_url() {
        let config = Config::for_backend("https://abc.supabase.co", "anon");
        let client = BackendClient::new(&config, Arc::new(SessionStore::in_memory())).unwrap();
        assert_eq!(
            client.public_url("planes", "p1/foto.png"),
            "https://abc.supabase.co/storage/v1/object/public/planes/p1/foto.png"
        );
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("plan.JPG"), "image/jpeg");
        assert_eq!(content_type_for("plan.png"), "image/png");
        assert_eq!(content_type_for("plan"), "application/octet-stream");
    }
}
