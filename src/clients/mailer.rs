use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

/// One outbound message, fully rendered.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Extra message headers, e.g. List-Unsubscribe.
    pub headers: Vec<(String, String)>,
}

/// Email delivery capability. Digest dispatch, welcome and login-link mail
/// all go through this trait; tests substitute a recording fake.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Resend HTTP API client.
pub struct ResendMailer {
    http: Client,
    api_key: String,
    from: String,
    reply_to: Option<String>,
    base_url: String,
}

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

impl ResendMailer {
    pub fn new(
        http: Client,
        api_key: impl Into<String>,
        from: impl Into<String>,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            from: from.into(),
            reply_to,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let mut body = json!({
            "from": self.from,
            "to": email.to,
            "subject": email.subject,
            "html": email.html,
        });

        if let Some(reply_to) = &self.reply_to {
            body["reply_to"] = Value::String(reply_to.clone());
        }
        if !email.headers.is_empty() {
            let headers: Map<String, Value> = email
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            body["headers"] = Value::Object(headers);
        }

        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach mail provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("mail provider rejected send ({status}): {text}");
        }

        Ok(())
    }
}
