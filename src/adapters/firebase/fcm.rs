//! Cloud Messaging HTTP v1 adapter. Implements MessagingPort.

use crate::domain::{DomainError, GatewayResponse, PushMessage};
use crate::ports::MessagingPort;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Wire shape: `{"message": {"token": ..., "notification": {"title": ..., "body": ...}}}`.
#[derive(Serialize)]
struct SendRequest<'a> {
    message: MessageBody<'a>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    token: &'a str,
    notification: Notification<'a>,
}

#[derive(Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

impl<'a> From<&'a PushMessage> for SendRequest<'a> {
    fn from(m: &'a PushMessage) -> Self {
        SendRequest {
            message: MessageBody {
                token: m.token.as_str(),
                notification: Notification {
                    title: &m.title,
                    body: &m.body,
                },
            },
        }
    }
}

pub struct FcmAdapter {
    client: reqwest::Client,
    send_url: String,
    timeout: Duration,
}

impl FcmAdapter {
    /// # Arguments
    /// * `base_url` - Gateway origin, e.g. `https://fcm.googleapis.com`
    /// * `project_id` - Project the messages are sent under
    /// * `timeout` - Deadline for each send request
    pub fn new(base_url: &str, project_id: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            timeout,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }
}

#[async_trait::async_trait]
impl MessagingPort for FcmAdapter {
    async fn send(
        &self,
        message: &PushMessage,
        access_token: &str,
    ) -> Result<GatewayResponse, DomainError> {
        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&SendRequest::from(message))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport_error)?;
        debug!(status, "gateway replied");

        Ok(GatewayResponse { status, body })
    }
}

fn map_transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::Timeout(e.to_string())
    } else {
        DomainError::Gateway(e.to_string())
    }
}
