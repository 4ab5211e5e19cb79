use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How the bot receives updates from Telegram.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Polling,
    Webhook,
}

/// Which rendition to pick when a video offers several muxed formats.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Smallest rendition, least likely to trip the upload limit.
    #[default]
    Lowest,
    Highest,
}

/// Where downloaded bytes come from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Shell out to yt-dlp on this host.
    #[default]
    Ytdlp,
    /// Proxy through an external download API.
    Api,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// May be left empty in the file; falls back to the TELEGRAM_TOKEN
    /// environment variable at load time.
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Local socket address to bind, e.g. "0.0.0.0:8443".
    pub listen: String,
    /// Public URL Telegram delivers updates to.
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    /// Telegram rejects bot uploads above 50 MB, so that is the default cap.
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
    #[serde(default)]
    pub quality: Quality,
    /// Parent directory for per-request scratch dirs. System temp when unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    /// Base URL of the download API, required when source = "api".
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_video_bytes: default_max_video_bytes(),
            quality: Quality::default(),
            work_dir: None,
            source: SourceKind::default(),
            ytdlp_bin: default_ytdlp_bin(),
            api_url: None,
        }
    }
}

fn default_max_video_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.telegram.bot_token = resolve_token(
            &config.telegram.bot_token,
            std::env::var("TELEGRAM_TOKEN").ok(),
        )?;

        if config.telegram.transport == Transport::Webhook && config.telegram.webhook.is_none() {
            bail!("transport = \"webhook\" requires a [telegram.webhook] section");
        }

        if config.download.source == SourceKind::Api && config.download.api_url.is_none() {
            bail!("source = \"api\" requires api_url in [download]");
        }

        Ok(config)
    }
}

/// File value wins; the TELEGRAM_TOKEN environment variable is the fallback.
/// No token from either place is a startup error.
pub(crate) fn resolve_token(from_file: &str, from_env: Option<String>) -> Result<String> {
    let from_file = from_file.trim();
    if !from_file.is_empty() {
        return Ok(from_file.to_string());
    }
    match from_env {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => bail!(
            "No bot token: set bot_token in [telegram] or the TELEGRAM_TOKEN environment variable"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.transport, Transport::Polling);
        assert!(config.telegram.webhook.is_none());
        assert_eq!(config.download.max_video_bytes, 50 * 1024 * 1024);
        assert_eq!(config.download.quality, Quality::Lowest);
        assert_eq!(config.download.source, SourceKind::Ytdlp);
        assert_eq!(config.download.ytdlp_bin, "yt-dlp");
    }

    #[test]
    fn test_full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            transport = "webhook"

            [telegram.webhook]
            listen = "0.0.0.0:8443"
            url = "https://bot.example.com/webhook"

            [download]
            max_video_bytes = 10485760
            quality = "highest"
            source = "api"
            api_url = "https://dl.example.com/api/download"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.transport, Transport::Webhook);
        assert_eq!(config.telegram.webhook.unwrap().listen, "0.0.0.0:8443");
        assert_eq!(config.download.max_video_bytes, 10 * 1024 * 1024);
        assert_eq!(config.download.quality, Quality::Highest);
        assert_eq!(config.download.source, SourceKind::Api);
    }

    #[test]
    fn test_resolve_token_prefers_file() {
        let token = resolve_token("123:abc", Some("456:def".to_string())).unwrap();
        assert_eq!(token, "123:abc");
    }

    #[test]
    fn test_resolve_token_falls_back_to_env() {
        let token = resolve_token("", Some("456:def".to_string())).unwrap();
        assert_eq!(token, "456:def");

        let token = resolve_token("  ", Some("456:def".to_string())).unwrap();
        assert_eq!(token, "456:def");
    }

    #[test]
    fn test_resolve_token_missing_is_an_error() {
        assert!(resolve_token("", None).is_err());
        assert!(resolve_token("", Some("   ".to_string())).is_err());
    }
}
