use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;
use tracing::{error, warn};

use crate::config::DownloadConfig;
use crate::source::VideoSource;

pub const GREETING: &str =
    "Send me a YouTube URL and I'll download the video for you!\n\
     Note: Telegram limits bot uploads to 50 MB.";
pub const REJECTION: &str = "Please send a valid YouTube URL!";
pub const PROCESSING: &str = "Downloading video... Please wait.";
pub const TOO_LARGE: &str = "Video is too large (>50MB). Try a shorter video!";
pub const FAILED: &str = "Sorry, I couldn't download that video. Try another URL!";

/// Hostname check only. Playlists, private videos and live streams are the
/// downloader's problem and surface as a download failure.
static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+$").expect("valid pattern")
});

pub fn is_youtube_url(text: &str) -> bool {
    YOUTUBE_URL.is_match(text)
}

/// The outbound chat operations the handler needs, so the same flow runs
/// against a real Telegram client or a recording mock in tests.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a text message, returning its id so it can be deleted later.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32>;
    async fn send_video(&self, chat_id: i64, file: &Path, caption: &str) -> Result<()>;
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;
}

/// How one update ended. Never an error: whatever happens inside, the
/// transport acknowledges the update so Telegram does not redeliver it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Greeted,
    Rejected,
    TooLarge,
    Sent,
    Failed,
}

/// Handle one inbound message: classify it, and for a valid URL run
/// lookup -> size check -> download -> send -> cleanup.
pub async fn handle_update(
    chat: &dyn ChatClient,
    source: &dyn VideoSource,
    download: &DownloadConfig,
    chat_id: i64,
    text: &str,
) -> Outcome {
    let text = text.trim();

    if text == "/start" {
        if let Err(e) = chat.send_text(chat_id, GREETING).await {
            warn!("Failed to send greeting to chat {}: {:#}", chat_id, e);
        }
        return Outcome::Greeted;
    }

    if !is_youtube_url(text) {
        if let Err(e) = chat.send_text(chat_id, REJECTION).await {
            warn!("Failed to send rejection to chat {}: {:#}", chat_id, e);
        }
        return Outcome::Rejected;
    }

    let processing = match chat.send_text(chat_id, PROCESSING).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Failed to send status message to chat {}: {:#}", chat_id, e);
            None
        }
    };

    let outcome = match download_and_send(chat, source, download, chat_id, text).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Download failed for chat {}: {:#}", chat_id, e);
            chat.send_text(chat_id, FAILED).await.ok();
            Outcome::Failed
        }
    };

    // The status message goes away on every path, success or not.
    if let Some(id) = processing {
        chat.delete_message(chat_id, id).await.ok();
    }

    outcome
}

async fn download_and_send(
    chat: &dyn ChatClient,
    source: &dyn VideoSource,
    download: &DownloadConfig,
    chat_id: i64,
    url: &str,
) -> Result<Outcome> {
    let video = source.resolve(url).await?;

    // Reject on the reported size before any bytes move. An unknown size
    // proceeds optimistically and is caught by the check below.
    if let Some(size) = video.size_hint {
        if size > download.max_video_bytes {
            chat.send_text(chat_id, TOO_LARGE).await?;
            return Ok(Outcome::TooLarge);
        }
    }

    // Scratch dir is removed when this drops, on every exit path.
    let scratch = match &download.work_dir {
        Some(dir) => TempDir::new_in(dir)?,
        None => TempDir::new()?,
    };

    let path = source.fetch(url, &video, scratch.path()).await?;

    let actual = tokio::fs::metadata(&path).await?.len();
    if actual > download.max_video_bytes {
        chat.send_text(chat_id, TOO_LARGE).await?;
        return Ok(Outcome::TooLarge);
    }

    chat.send_video(chat_id, &path, &video.title).await?;
    Ok(Outcome::Sent)
}
