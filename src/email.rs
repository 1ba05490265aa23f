// ABOUTME: Outbound email delivery through an HTTP email API
// ABOUTME: Explicitly constructed client; a missing endpoint disables delivery for dev/test

use serde_json::json;

use crate::error::{AppError, Result};

const SENDER_NAME: &str = "Fix It Wand";

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl Mailer {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub async fn send(&self, email: OutboundEmail) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                "email delivery disabled, skipping send"
            );
            return Ok(());
        };

        let response = self
            .http
            .post(endpoint)
            .json(&json!({
                "name": SENDER_NAME,
                "email": email.to,
                "subject": email.subject,
                "content": email.text,
                "html": email.html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "email API returned {}: {}",
                status, body
            )));
        }

        tracing::info!(to = %email.to, "email sent");
        Ok(())
    }
}
