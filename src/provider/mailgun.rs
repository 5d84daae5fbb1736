//! Mailgun Messages API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::config::schema::MailgunConfig;
use crate::config::ConfigError;
use crate::mail::EmailMessage;
use crate::provider::{check_response, endpoint, ProviderAdapter, ProviderError};

/// Adapter for the Mailgun HTTP API.
#[derive(Debug, Clone)]
pub struct MailgunProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl MailgunProvider {
    pub const NAME: &'static str = "Mailgun";

    pub fn from_config(config: &MailgunConfig, request_timeout: Duration) -> Result<Self, ConfigError> {
        let missing = |setting| ConfigError::MissingSetting {
            provider: Self::NAME.to_string(),
            setting,
        };
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing("mailgun.api_key"))?;
        let domain = config
            .domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| missing("mailgun.domain"))?;

        let endpoint = endpoint(
            &config.base_url,
            &format!("v3/{domain}/messages"),
            "provider.mailgun.base_url",
        )?;

        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn form(message: &EmailMessage) -> Result<Form, ProviderError> {
        let mut form = Form::new()
            .text("from", message.from().to_string())
            .text("to", message.to().to_string())
            .text("subject", message.subject().to_string())
            .text("html", message.html().to_string())
            .text("text", message.text().to_string());

        for attachment in message.attachments() {
            let part = Part::bytes(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.content_type)?;
            form = form.part("attachment", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl ProviderAdapter for MailgunProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth("api", Some(&self.api_key))
            .multipart(Self::form(message)?)
            .send()
            .await?;

        check_response(response).await
    }
}
