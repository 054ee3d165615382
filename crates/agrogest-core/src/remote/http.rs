use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::config::SyncConfig;
use crate::models::Collection;
use crate::util::compact_text;
use crate::{Error, Result};

use super::RemoteBackend;

/// REST client for the AgroGest document API.
///
/// Routes live under `{base}/v1/users/{user}/{collection}[/{id}]`.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base_url = config
            .remote_url
            .clone()
            .ok_or_else(|| Error::InvalidInput("no remote URL configured".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            base_url,
            token: config.auth_token.clone(),
            poll_interval: config.probe_interval(),
            client,
        })
    }

    fn collection_url(&self, user: &str, collection: Collection) -> String {
        format!(
            "{}/v1/users/{}/{}",
            self.base_url,
            urlencoding::encode(user),
            collection.as_str()
        )
    }

    fn document_url(&self, user: &str, collection: Collection, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(user, collection),
            urlencoding::encode(id)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn documents(builder: RequestBuilder) -> Result<Vec<Value>> {
        let response = check(builder.send().await?).await?;
        let payload = response.json::<ListResponse>().await?;
        Ok(payload.into_documents())
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn list(&self, user: &str, collection: Collection) -> Result<Vec<Value>> {
        let url = self.collection_url(user, collection);
        Self::documents(
            self.request(Method::GET, &url)
                .query(&[("order_by", collection.order_field())]),
        )
        .await
    }

    async fn list_where(
        &self,
        user: &str,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>> {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let url = self.collection_url(user, collection);
        Self::documents(self.request(Method::GET, &url).query(&[
            ("order_by", collection.order_field()),
            ("field", field),
            ("equals", value.as_str()),
        ]))
        .await
    }

    async fn get(&self, user: &str, collection: Collection, id: &str) -> Result<Option<Value>> {
        let url = self.document_url(user, collection, id);
        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn put(&self, user: &str, collection: Collection, id: &str, doc: Value) -> Result<()> {
        let url = self.document_url(user, collection, id);
        check(self.request(Method::PUT, &url).json(&doc).send().await?).await?;
        Ok(())
    }

    async fn patch(
        &self,
        user: &str,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<()> {
        let url = self.document_url(user, collection, id);
        check(self.request(Method::PATCH, &url).json(&fields).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, user: &str, collection: Collection, id: &str) -> Result<()> {
        let url = self.document_url(user, collection, id);
        let response = self.request(Method::DELETE, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    /// Polls `list` every probe interval and publishes when the list changes.
    ///
    /// The poller stops once every receiver is dropped.
    async fn subscribe(
        &self,
        user: &str,
        collection: Collection,
    ) -> Result<watch::Receiver<Vec<Value>>> {
        let initial = self.list(user, collection).await?;
        let (tx, rx) = watch::channel(initial);

        let backend = self.clone();
        let user = user.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(backend.poll_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    _ = ticker.tick() => {}
                }
                match backend.list(&user, collection).await {
                    Ok(documents) => {
                        tx.send_if_modified(|current| {
                            if *current == documents {
                                false
                            } else {
                                *current = documents;
                                true
                            }
                        });
                    }
                    Err(error) => {
                        tracing::warn!("Polling {collection} for changes failed: {error}");
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/v1/health", self.base_url);
        check(self.request(Method::GET, &url).send().await?).await?;
        Ok(())
    }
}

/// Accepts either a bare array or `{ "documents": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Value>),
    Wrapped { documents: Vec<Value> },
}

impl ListResponse {
    fn into_documents(self) -> Vec<Value> {
        match self {
            Self::Bare(documents) | Self::Wrapped { documents } => documents,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
