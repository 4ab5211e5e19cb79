use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::source::{ResolvedVideo, VideoSource};

/// Proxies downloads through an external download API: POST the URL,
/// stream the response body back as the video file.
///
/// The API exposes no metadata endpoint, so there is no title and no size
/// estimate up front; the post-download size check is the only enforcement.
pub struct ApiSource {
    client: reqwest::Client,
    base_url: String,
}

impl ApiSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl VideoSource for ApiSource {
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo> {
        Ok(ResolvedVideo {
            title: url.to_string(),
            format_id: None,
            size_hint: None,
        })
    }

    async fn fetch(&self, url: &str, _video: &ResolvedVideo, dest: &Path) -> Result<PathBuf> {
        info!("Requesting download from {}", self.base_url);

        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({ "url": url }))
            .send()
            .await
            .context("Download API request failed")?
            .error_for_status()
            .context("Download API returned an error status")?;

        let path = dest.join("video.mp4");
        let mut file = tokio::fs::File::create(&path)
            .await
            .context("Failed to create scratch file")?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Download API stream failed")?;
            file.write_all(&chunk)
                .await
                .context("Failed to write scratch file")?;
        }
        file.flush().await.context("Failed to flush scratch file")?;

        Ok(path)
    }
}
