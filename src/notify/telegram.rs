use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::notify::MessageSink;
use crate::state::Config;

/// Telegram Bot API `sendMessage`.
pub struct TelegramSink {
    client: Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Serialize, Debug)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize, Debug, Default)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSink {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                cfg.telegram_base.trim_end_matches('/'),
                cfg.bot_token
            ),
            chat_id: cfg.chat_id.clone(),
        })
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage { chat_id: &self.chat_id, text, parse_mode: "Markdown" }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn deliver(&self, text: &str) -> Result<()> {
        // reqwest errors carry the URL, which embeds the bot token.
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("telegram request failed")?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let reply: ApiReply = resp.json().await.unwrap_or_default();
        bail!(
            "telegram returned status {}: {}",
            status.as_u16(),
            reply.description.unwrap_or_else(|| "no description".to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_at(base: &str) -> Config {
        let vars = [
            ("API_KEY", "k"),
            ("CHAT_ID", "-100123"),
            ("BOT_TOKEN", "42:secret"),
            ("TELEGRAM_BASE", base),
            ("HTTP_TIMEOUT_SECS", "5"),
        ];
        Config::from_lookup(|key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()))
            .unwrap()
    }

    fn cfg() -> Config {
        cfg_at("http://localhost:8081/")
    }

    #[test]
    fn test_endpoint_built_from_token() {
        let sink = TelegramSink::new(&cfg()).unwrap();
        assert_eq!(sink.endpoint, "http://localhost:8081/bot42:secret/sendMessage");
    }

    #[test]
    fn test_payload_uses_markdown() {
        let sink = TelegramSink::new(&cfg()).unwrap();
        let body = serde_json::to_value(sink.payload("*hi*")).unwrap();
        assert_eq!(body["chat_id"], "-100123");
        assert_eq!(body["text"], "*hi*");
        assert_eq!(body["parse_mode"], "Markdown");
    }

    #[tokio::test]
    async fn test_rejection_reports_status_and_description() {
        let addr = crate::testutil::serve_once(
            "500 Internal Server Error",
            r#"{"ok":false,"error_code":500,"description":"Bad Request: chat not found"}"#,
        )
        .await;
        let sink = TelegramSink::new(&cfg_at(&format!("http://{addr}"))).unwrap();
        let err = format!("{:#}", sink.deliver("*hi*").await.unwrap_err());
        assert!(err.contains("500"), "{err}");
        assert!(err.contains("chat not found"), "{err}");
    }

    #[tokio::test]
    async fn test_unreachable_api_error_hides_token() {
        let addr = crate::testutil::closed_port().await;
        let sink = TelegramSink::new(&cfg_at(&format!("http://{addr}"))).unwrap();
        let err = format!("{:#}", sink.deliver("*hi*").await.unwrap_err());
        assert!(err.contains("telegram request failed"), "{err}");
        assert!(!err.contains("42:secret"), "{err}");
    }

    #[tokio::test]
    async fn test_success_status_delivers() {
        let addr = crate::testutil::serve_once("200 OK", r#"{"ok":true,"result":{}}"#).await;
        let sink = TelegramSink::new(&cfg_at(&format!("http://{addr}"))).unwrap();
        sink.deliver("*hi*").await.unwrap();
    }
}
