use reqwest::StatusCode;
use teammap_core::error::AssetFailure;
use teammap_core::icons::PhotoSource;
use tracing::debug;

/// Fetches profile photos from the directory service.
#[derive(Debug, Clone)]
pub struct HttpPhotos {
    client: reqwest::Client,
    base: Option<String>,
}

impl HttpPhotos {
    pub fn new(base: Option<String>) -> Self {
        HttpPhotos {
            client: reqwest::Client::new(),
            base: base.map(|b| b.trim_end_matches('/').to_string()),
        }
    }

    pub fn photo_url(&self, photo_ref: &str) -> Option<String> {
        self.base
            .as_ref()
            .map(|base| format!("{base}/api/user-photo/{photo_ref}"))
    }
}

impl PhotoSource for HttpPhotos {
    async fn fetch(&self, photo_ref: &str) -> Result<Vec<u8>, AssetFailure> {
        let Some(url) = self.photo_url(photo_ref) else {
            return Err(AssetFailure::Missing);
        };
        debug!(%url, "Fetching photo");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AssetFailure::Fetch(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(AssetFailure::Missing),
            status if !status.is_success() => Err(AssetFailure::Fetch(format!("HTTP {status}"))),
            _ => resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| AssetFailure::Fetch(e.to_string())),
        }
    }
}
