use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::SendVideoSetters;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::update_listeners::webhooks;
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, DownloadConfig, SourceKind, Transport};
use crate::handler::{self, ChatClient};
use crate::source::api::ApiSource;
use crate::source::ytdlp::YtdlpSource;
use crate::source::VideoSource;

/// Shared application state
pub struct AppState {
    source: Box<dyn VideoSource>,
    download: DownloadConfig,
}

/// ChatClient backed by a teloxide Bot.
struct TelegramChat {
    bot: Bot,
}

#[async_trait]
impl ChatClient for TelegramChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32> {
        let message = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(message.id.0)
    }

    async fn send_video(&self, chat_id: i64, file: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(file.to_path_buf()))
            .caption(caption.to_string())
            .supports_streaming(true)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await?;
        Ok(())
    }
}

fn build_source(download: &DownloadConfig) -> Result<Box<dyn VideoSource>> {
    match download.source {
        SourceKind::Ytdlp => Ok(Box::new(YtdlpSource::new(
            download.ytdlp_bin.clone(),
            download.quality,
        ))),
        SourceKind::Api => {
            let api_url = download
                .api_url
                .clone()
                .context("source = \"api\" requires api_url in [download]")?;
            Ok(Box::new(ApiSource::new(api_url)))
        }
    }
}

/// Start the Telegram bot on the configured transport
pub async fn run(config: Config) -> Result<()> {
    let bot = Bot::new(&config.telegram.bot_token);
    let source = build_source(&config.download)?;
    let state = Arc::new(AppState {
        source,
        download: config.download.clone(),
    });

    let handler = Update::filter_message().endpoint(handle_message);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build();

    match config.telegram.transport {
        Transport::Polling => {
            info!("Starting Telegram bot (long polling)...");
            dispatcher.dispatch().await;
        }
        Transport::Webhook => {
            let webhook = config
                .telegram
                .webhook
                .context("transport = \"webhook\" requires a [telegram.webhook] section")?;
            let addr = webhook
                .listen
                .parse()
                .with_context(|| format!("Invalid webhook listen address: {}", webhook.listen))?;
            let url = Url::parse(&webhook.url)
                .with_context(|| format!("Invalid webhook URL: {}", webhook.url))?;

            info!("Starting Telegram bot (webhook at {})...", url);
            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url))
                .await
                .context("Failed to set up the webhook listener")?;

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook"),
                )
                .await;
        }
    }

    Ok(())
}

/// Endpoint for one update. Always returns Ok so the transport acknowledges
/// the update and Telegram never redelivers it; failures are reported to the
/// user inside the handler.
async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let chat_id = msg.chat.id.0;
    info!("Message from chat {}: {}", chat_id, text);

    let chat = TelegramChat { bot };
    let outcome = handler::handle_update(
        &chat,
        state.source.as_ref(),
        &state.download,
        chat_id,
        &text,
    )
    .await;

    info!("Chat {}: {:?}", chat_id, outcome);
    Ok(())
}
