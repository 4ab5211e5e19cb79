pub mod api;
pub mod ytdlp;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

/// A video the source has agreed to deliver, with whatever it knows up front.
#[derive(Debug, Clone)]
pub struct ResolvedVideo {
    pub title: String,
    /// Source-specific format identifier; None when the source picks for us.
    pub format_id: Option<String>,
    /// Reported byte size of the chosen format, when the source knows it.
    /// Checked against the upload cap before any transfer starts.
    pub size_hint: Option<u64>,
}

/// The video collaborator: metadata lookup plus fetching one chosen format.
/// Format negotiation stays inside the implementation; the handler only
/// sees a title and a size estimate.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Look up the video behind `url` and choose a format.
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo>;

    /// Download the chosen format into `dest` and return the file path.
    async fn fetch(&self, url: &str, video: &ResolvedVideo, dest: &Path) -> Result<PathBuf>;
}
