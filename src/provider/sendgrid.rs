//! SendGrid v3 Mail Send adapter.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use url::Url;

use crate::config::schema::SendGridConfig;
use crate::config::ConfigError;
use crate::mail::EmailMessage;
use crate::provider::{check_response, endpoint, ProviderAdapter, ProviderError};

#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    mime: &'a str,
    disposition: &'static str,
}

impl<'a> SendGridRequest<'a> {
    fn from_message(message: &'a EmailMessage) -> Self {
        // SendGrid requires text/plain before text/html and rejects empty values.
        let mut content = Vec::with_capacity(2);
        if !message.text().is_empty() {
            content.push(Content {
                mime: "text/plain",
                value: message.text(),
            });
        }
        if !message.html().is_empty() {
            content.push(Content {
                mime: "text/html",
                value: message.html(),
            });
        }

        Self {
            personalizations: [Personalization {
                to: [Address { email: message.to() }],
            }],
            from: Address {
                email: message.from(),
            },
            subject: message.subject(),
            content,
            attachments: message
                .attachments()
                .iter()
                .map(|a| SendGridAttachment {
                    content: STANDARD.encode(&a.content),
                    filename: &a.filename,
                    mime: &a.content_type,
                    disposition: "attachment",
                })
                .collect(),
        }
    }
}

/// Adapter for the SendGrid HTTP API.
#[derive(Debug, Clone)]
pub struct SendGridProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl SendGridProvider {
    pub const NAME: &'static str = "SendGrid";

    pub fn from_config(config: &SendGridConfig, request_timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingSetting {
                provider: Self::NAME.to_string(),
                setting: "sendgrid.api_key",
            })?;

        let endpoint = endpoint(&config.base_url, "v3/mail/send", "provider.sendgrid.base_url")?;

        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ProviderAdapter for SendGridProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&SendGridRequest::from_message(message))
            .send()
            .await?;

        check_response(response).await
    }
}
