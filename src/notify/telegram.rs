use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use super::Notifier;
use crate::config::ConfigTelegram;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts messages to a chat through the Telegram Bot API `sendMessage` method
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    credentials: Option<(String, String)>,
}

impl TelegramNotifier {
    pub fn new(config: &ConfigTelegram) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(NotifyError::ConnectionError)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &ConfigTelegram) -> Self {
        let credentials = match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some((token.clone(), chat.clone()))
            }
            _ => None,
        };
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let (token, chat_id) = self
            .credentials
            .as_ref()
            .ok_or(NotifyError::NotConfigured)?;
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let res = self
            .client
            .post(url)
            .form(&[("chat_id", chat_id.as_str()), ("text", message)])
            .send()
            .await
            // The URL carries the bot token, keep it out of the logs
            .map_err(|e| NotifyError::ConnectionError(e.without_url()))?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&mut self, message: &str) -> bool {
        match self.send(message).await {
            Ok(()) => {
                debug!("Notification delivered");
                true
            }
            Err(NotifyError::NotConfigured) => {
                warn!("Telegram credentials not set, skipping alert: {:?}", message);
                false
            }
            Err(e) => {
                error!("Telegram send failed: {}", e);
                false
            }
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum NotifyError {
        NotConfigured {
            display("Bot token or chat id missing")
        }
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach the Telegram API: {}", error)
            source(error)
        }
        Rejected(status: StatusCode, body: String) {
            display("Telegram rejected the message ({}): {}", status, body)
        }
    }
}
