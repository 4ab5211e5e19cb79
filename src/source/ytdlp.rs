use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Quality;
use crate::source::{ResolvedVideo, VideoSource};

/// Downloads videos by shelling out to yt-dlp on this host.
pub struct YtdlpSource {
    bin: String,
    quality: Quality,
}

/// The slice of `yt-dlp -j` output we care about.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    #[serde(default)]
    formats: Vec<Format>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Format {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
}

impl Format {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }

    fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// Pick a muxed (video+audio) format by the configured quality policy.
/// Prefers mp4 renditions when any exist, since Telegram streams those inline.
pub(crate) fn select_format(formats: &[Format], quality: Quality) -> Option<&Format> {
    let muxed: Vec<&Format> = formats
        .iter()
        .filter(|f| f.has_video() && f.has_audio())
        .collect();

    let mp4: Vec<&Format> = muxed
        .iter()
        .copied()
        .filter(|f| f.ext.as_deref() == Some("mp4"))
        .collect();

    let mut pool = if mp4.is_empty() { muxed } else { mp4 };
    pool.sort_by_key(|f| f.height.unwrap_or(0));

    match quality {
        Quality::Lowest => pool.first().copied(),
        Quality::Highest => pool.last().copied(),
    }
}

/// Last part of a command's stderr, enough to show the actual error line.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().nth_back(399) {
        Some((idx, _)) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}

impl YtdlpSource {
    pub fn new(bin: String, quality: Quality) -> Self {
        Self { bin, quality }
    }
}

#[async_trait]
impl VideoSource for YtdlpSource {
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo> {
        let output = Command::new(&self.bin)
            .args(["--no-playlist", "--no-warnings", "-j", url])
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", self.bin))?;

        if !output.status.success() {
            bail!("yt-dlp metadata lookup failed: {}", stderr_tail(&output.stderr));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)
            .context("Failed to parse yt-dlp metadata JSON")?;

        let format = select_format(&info.formats, self.quality)
            .context("No muxed video+audio format available")?;

        debug!(
            "Resolved '{}': format {} ({}p, {:?} bytes)",
            info.title,
            format.format_id,
            format.height.unwrap_or(0),
            format.size()
        );

        Ok(ResolvedVideo {
            title: info.title,
            format_id: Some(format.format_id.clone()),
            size_hint: format.size(),
        })
    }

    async fn fetch(&self, url: &str, video: &ResolvedVideo, dest: &Path) -> Result<PathBuf> {
        let template = dest.join("video.%(ext)s");
        let template = template
            .to_str()
            .context("Scratch directory path is not valid UTF-8")?;

        let mut cmd = Command::new(&self.bin);
        cmd.args(["--no-playlist", "--no-warnings", "-o", template]);
        if let Some(id) = &video.format_id {
            cmd.args(["-f", id]);
        }
        cmd.arg(url);

        info!("Downloading '{}' via {}", video.title, self.bin);
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", self.bin))?;

        if !output.status.success() {
            bail!("yt-dlp download failed: {}", stderr_tail(&output.stderr));
        }

        find_downloaded(dest)
    }
}

/// yt-dlp chooses the extension, so locate whatever landed under "video.*".
fn find_downloaded(dest: &Path) -> Result<PathBuf> {
    for entry in std::fs::read_dir(dest).context("Failed to read scratch directory")? {
        let path = entry.context("Failed to read scratch directory entry")?.path();
        let is_video = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("video."));
        if path.is_file() && is_video {
            return Ok(path);
        }
    }
    bail!("yt-dlp reported success but no output file was found");
}
