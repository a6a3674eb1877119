//! Microsoft Teams incoming-webhook notifications.

use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct MessageCard<'a> {
    #[serde(rename = "@type")]
    card_type: &'static str,
    #[serde(rename = "@context")]
    context: &'static str,
    summary: &'a str,
    title: &'a str,
    text: &'a str,
    #[serde(rename = "themeColor")]
    theme_color: &'static str,
}

pub struct TeamsNotifier {
    webhook_url: String,
    http: reqwest::Client,
}

impl TeamsNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// `None` for an unset or blank webhook URL.
    pub fn from_url(webhook_url: Option<&str>) -> Option<Self> {
        webhook_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(Self::new)
    }

    /// Post a card. Line breaks in `text` are kept.
    pub async fn send(&self, title: &str, text: &str, success: bool) -> Result<()> {
        let text = text.replace('\n', "<br>");
        let card = MessageCard {
            card_type: "MessageCard",
            context: "http://schema.org/extensions",
            summary: title,
            title,
            text: &text,
            theme_color: if success { "2EB886" } else { "D40E0D" },
        };

        let response = self.http.post(&self.webhook_url).json(&card).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Teams webhook rejected the message: {}", body);
            return Err(Error::Http {
                method: "POST".into(),
                url: "<teams webhook>".into(),
                status: status.as_u16(),
                body,
            });
        }
        info!("Posted '{}' to Teams", title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_url_disables_notifications() {
        assert!(TeamsNotifier::from_url(None).is_none());
        assert!(TeamsNotifier::from_url(Some("  ")).is_none());
        assert!(TeamsNotifier::from_url(Some("https://example.webhook.office.com/x")).is_some());
    }
}
