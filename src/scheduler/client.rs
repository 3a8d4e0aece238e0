//! HTTP client for the admin center API.

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ExecutorConfig;
use crate::error::SchedulerError;
use crate::protocol::{ACCESS_TOKEN_HEADER, ReturnEnvelope};

/// JSON-over-HTTP client for `{server_addr}/api/*`.
pub struct SchedulerClient {
    http: reqwest::Client,
    server_addr: String,
    access_token: Option<SecretString>,
}

impl SchedulerClient {
    pub fn new(config: &ExecutorConfig) -> Result<Self, SchedulerError> {
        let http = reqwest::Client::builder()
            .timeout(config.client_timeout)
            .build()?;
        Ok(Self {
            http,
            server_addr: config.server_addr.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// POST `body` to `{server_addr}{action}` and decode the
    /// `{code, msg, content}` envelope. A non-200 envelope code is an error.
    pub async fn post_api<B, T>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<ReturnEnvelope<T>, SchedulerError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(format!("{}{}", self.server_addr, action))
            .json(body)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8");
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token.expose_secret());
        }

        let response = request.send().await?;
        let envelope: ReturnEnvelope<T> = response
            .json()
            .await
            .map_err(|e| SchedulerError::InvalidResponse(e.to_string()))?;

        if !envelope.is_success() {
            return Err(SchedulerError::Rejected {
                code: envelope.code,
                msg: envelope.msg.unwrap_or_default(),
            });
        }
        Ok(envelope)
    }
}
