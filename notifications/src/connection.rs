//! HTTP implementation of [`NotificationApi`]: JSON REST calls through reqwest
//! and the server-push stream through eventsource-client.

use crate::error::{http_error, Error, HttpErrorKind};
use crate::message::{Notification, Page};
use crate::transport::{NotificationApi, NotificationStream};
use async_trait::async_trait;
use eventsource_client::{self as es, Client as _};
use futures_util::future;
use futures_util::stream::StreamExt;
use log::*;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/notifications";

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Notification API root, without a trailing slash.
    pub base_url: String,
    /// Bearer token. Sent as a header on REST calls and as the `token` query
    /// parameter on the stream.
    pub auth_token: Option<String>,
    /// Request timeout for REST calls.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            timeout: Duration::from_secs(5),
            user_agent: format!("notifications/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct HttpNotificationApi {
    client: Client,
    config: HttpApiConfig,
}

impl HttpNotificationApi {
    pub fn new(mut config: HttpApiConfig) -> Result<Self, Error> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// `{base}/{id}/read`, with the id percent-encoded as a single path segment.
    fn read_url(&self, notification_id: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| http_error(HttpErrorKind::BuilderFailed, &e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| http_error(HttpErrorKind::BuilderFailed, "base url cannot take a path"))?
            .push(notification_id)
            .push("read");
        Ok(url)
    }

    fn stream_url(&self, user_id: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/stream", self.config.base_url))
            .map_err(|e| http_error(HttpErrorKind::BuilderFailed, &e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("userId", user_id);
            if let Some(token) = &self.config.auth_token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turns one raw SSE item into a stream item. Keep-alives and malformed
/// payloads produce nothing.
fn decode_event(item: Result<es::SSE, es::Error>) -> Option<Result<Notification, Error>> {
    match item {
        Ok(es::SSE::Event(event)) => match serde_json::from_str::<Notification>(&event.data) {
            Ok(notification) => Some(Ok(notification)),
            Err(e) => {
                debug!("Dropping malformed notification event: {e}");
                None
            }
        },
        Ok(_) => None,
        Err(e) => Some(Err(e.into())),
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn unread_count(&self, user_id: &str) -> Result<i64, Error> {
        let url = format!("{}/unread-count", self.config.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .query(&[("userId", user_id)])
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn list(&self, user_id: &str, page: u32, size: u32) -> Result<Page, Error> {
        let response = self
            .authorize(self.client.get(&self.config.base_url))
            .query(&[
                ("userId", user_id.to_string()),
                ("page", page.to_string()),
                ("size", size.to_string()),
            ])
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn mark_read(&self, notification_id: &str) -> Result<(), Error> {
        let url = self.read_url(notification_id)?;

        let response = self
            .authorize(self.client.post(url))
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16()));
        }
        Ok(())
    }

    fn open_stream(&self, user_id: &str) -> Result<NotificationStream, Error> {
        let url = self.stream_url(user_id)?;
        debug!("Opening notification stream at {}/stream", self.config.base_url);

        // Reconnection is the manager's call, not the SSE client's.
        let client = es::ClientBuilder::for_url(url.as_str())?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let stream = client
            .stream()
            .filter_map(|item| future::ready(decode_event(item)));

        Ok(Box::pin(stream))
    }
}
