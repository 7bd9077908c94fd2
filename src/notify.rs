use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::env;
use std::fmt::Write;
use tracing::{info, warn};

use crate::error::{FinderError, Result};
use crate::finder::RunStats;
use crate::types::Settlement;

const DISCORD_MAX_CHARS: usize = 2000;
const TELEGRAM_MAX_CHARS: usize = 4096;

/// What gets sent after a run with new settlements
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub subject: String,
    pub settlements: Vec<Settlement>,
    pub stats: RunStats,
}

impl NotificationPayload {
    pub fn new(settlements: Vec<Settlement>, stats: RunStats, date: NaiveDate) -> Self {
        Self {
            subject: format!(
                "New Class Action Settlements - No Proof Required ({})",
                date.format("%Y-%m-%d")
            ),
            settlements,
            stats,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.subject);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} new settlement(s) that do not require proof of purchase:",
            self.settlements.len()
        );

        for (i, s) in self.settlements.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}. {}", i + 1, s.title);
            let deadline = s
                .deadline
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "not listed".to_string());
            let _ = writeln!(out, "   Deadline: {}", deadline);
            if let Some(amount) = &s.amount {
                let _ = writeln!(out, "   Amount: {}", amount);
            }
            let _ = writeln!(out, "   Claim: {}", s.claim_url);
            let _ = writeln!(out, "   Source: {}", s.source);
        }

        let _ = writeln!(out);
        let _ = write!(out, "{}", self.stats);
        out
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Telegram { token: String, chat_id: String },
    Slack { webhook: String },
    Discord { webhook: String },
}

impl Channel {
    fn name(&self) -> &'static str {
        match self {
            Channel::Telegram { .. } => "telegram",
            Channel::Slack { .. } => "slack",
            Channel::Discord { .. } => "discord",
        }
    }
}

/// Posts the digest to every configured chat webhook
pub struct WebhookNotifier {
    client: Client,
    channels: Vec<Channel>,
}

impl WebhookNotifier {
    pub fn new(client: Client, channels: Vec<Channel>) -> Self {
        Self { client, channels }
    }

    /// Channels from `TELEGRAM_BOT_TOKEN` + `TELEGRAM_CHAT_ID`,
    /// `SLACK_WEBHOOK_URL` and `DISCORD_WEBHOOK_URL`. `None` when none are set.
    pub fn from_env(client: Client) -> Option<Self> {
        let channels = channels_from(|key| env::var(key).ok());
        if channels.is_empty() {
            None
        } else {
            Some(Self::new(client, channels))
        }
    }

    async fn post(&self, channel: &Channel, text: &str) -> std::result::Result<(), reqwest::Error> {
        let request = match channel {
            Channel::Telegram { token, chat_id } => {
                let text = truncate(text, TELEGRAM_MAX_CHARS);
                self.client
                    .post(format!("https://api.telegram.org/bot{}/sendMessage", token))
                    .form(&[("chat_id", chat_id.as_str()), ("text", text.as_str())])
            }
            Channel::Slack { webhook } => self.client.post(webhook).json(&serde_json::json!({ "text": text })),
            Channel::Discord { webhook } => self
                .client
                .post(webhook)
                .json(&serde_json::json!({ "content": truncate(text, DISCORD_MAX_CHARS) })),
        };
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    /// Tries every channel; fails if any of them failed.
    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let text = payload.render_text();
        let mut failures = Vec::new();

        for channel in &self.channels {
            match self.post(channel, &text).await {
                Ok(()) => info!(channel = channel.name(), count = payload.settlements.len(), "notification sent"),
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "notification failed");
                    failures.push(format!("{}: {}", channel.name(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FinderError::NotificationSend(failures.join("; ")))
        }
    }
}

/// Fallback when no channel is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        info!("no notification channels configured; digest follows");
        println!("{}", payload.render_text());
        Ok(())
    }
}

fn channels_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<Channel> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut channels = Vec::new();

    if let (Some(token), Some(chat_id)) = (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
        channels.push(Channel::Telegram { token, chat_id });
    }
    if let Some(webhook) = get("SLACK_WEBHOOK_URL") {
        channels.push(Channel::Slack { webhook });
    }
    if let Some(webhook) = get("DISCORD_WEBHOOK_URL") {
        channels.push(Channel::Discord { webhook });
    }
    channels
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
