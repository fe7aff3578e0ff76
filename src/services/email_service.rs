use reqwest::Client;
use tracing::info;

use crate::config::EmailConfig;
use crate::errors::{AppError, Result};

/// Transactional mail over the provider's HTTP API. Callers on the payment
/// and intake paths treat failures as non-fatal: log and move on.
#[derive(Debug, Clone)]
pub struct EmailService {
    config: EmailConfig,
    client: Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Address that receives internal notifications (new submissions).
    pub fn notify_address(&self) -> &str {
        &self.config.from
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "from": self.config.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Mail API error: {}", e)))?;

        if response.status().is_success() {
            info!("Email sent to {}: {}", to, subject);
            Ok(())
        } else {
            Err(AppError::ExternalApi(format!(
                "Email sending failed with status: {}",
                response.status()
            )))
        }
    }
}
