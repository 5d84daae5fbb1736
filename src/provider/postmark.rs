//! Postmark email API adapter.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use url::Url;

use crate::config::schema::PostmarkConfig;
use crate::config::ConfigError;
use crate::mail::EmailMessage;
use crate::provider::{check_response, endpoint, ProviderAdapter, ProviderError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<PostmarkAttachment<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkAttachment<'a> {
    name: &'a str,
    content: String,
    content_type: &'a str,
}

/// Adapter for the Postmark HTTP API.
#[derive(Debug, Clone)]
pub struct PostmarkProvider {
    client: reqwest::Client,
    endpoint: Url,
    server_token: String,
}

impl PostmarkProvider {
    pub const NAME: &'static str = "Postmark";

    pub fn from_config(config: &PostmarkConfig, request_timeout: Duration) -> Result<Self, ConfigError> {
        let server_token = config
            .server_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingSetting {
                provider: Self::NAME.to_string(),
                setting: "postmark.server_token",
            })?;

        let endpoint = endpoint(&config.base_url, "email", "provider.postmark.base_url")?;

        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            server_token,
        })
    }
}

#[async_trait]
impl ProviderAdapter for PostmarkProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let body = PostmarkRequest {
            from: message.from(),
            to: message.to(),
            subject: message.subject(),
            html_body: message.html(),
            text_body: message.text(),
            attachments: message
                .attachments()
                .iter()
                .map(|a| PostmarkAttachment {
                    name: &a.filename,
                    content: STANDARD.encode(&a.content),
                    content_type: &a.content_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.server_token)
            .json(&body)
            .send()
            .await?;

        check_response(response).await
    }
}
