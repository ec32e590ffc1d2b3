use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::error::{AppError, AppResult};

/// Delivery collaborator: side-effecting `notify(user, text)` used for both
/// change alerts and reminders.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, text: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
}

impl TelegramService {
    pub async fn new(token: String) -> AppResult<Self> {
        let bot = Bot::new(token);

        // Verify the bot token by getting bot info
        match bot.get_me().await {
            Ok(me) => {
                tracing::info!("Telegram bot initialized: @{}", me.username());
                Ok(Self { bot })
            }
            Err(e) => {
                tracing::error!("Failed to initialize Telegram bot: {}", e);
                Err(AppError::Telegram(format!(
                    "Failed to initialize bot: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn notify(&self, user_id: i64, text: &str) -> AppResult<()> {
        match self.bot.send_message(ChatId(user_id), text).await {
            Ok(sent) => {
                tracing::debug!("Telegram message sent to {}: message_id={}", user_id, sent.id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send Telegram message to {}: {}", user_id, e);
                Err(AppError::Telegram(format!("Failed to send message: {}", e)))
            }
        }
    }
}

/// Fallback notifier used when no bot token is configured; logs instead of
/// sending, so the engine can run end to end in development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> AppResult<()> {
        tracing::info!("Notification for {}: {}", user_id, text);
        Ok(())
    }
}
