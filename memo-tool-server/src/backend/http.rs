use super::{BackendError, Memo, MemoBackend, MemoPatch, NewMemo};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

const MEMO_RESOURCE: &str = "api/v1/memos";

/// Talks to the memo CRUD service over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base: format!("{}/{MEMO_RESOURCE}", base_url.trim_end_matches('/')),
        }
    }

    pub fn resource_url(&self) -> &str {
        &self.base
    }

    fn item_url(&self, id: i64) -> String {
        format!("{}/{id}", self.base)
    }
}

fn unreachable(err: reqwest::Error) -> BackendError {
    BackendError::Unreachable(err.to_string())
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "memo backend rejected request");
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let response = check(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| BackendError::Decode(err.to_string()))
}

#[async_trait]
impl MemoBackend for HttpBackend {
    async fn create(&self, memo: NewMemo) -> Result<Memo, BackendError> {
        let response = self
            .http
            .post(&self.base)
            .json(&memo)
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Memo>, BackendError> {
        let response = self
            .http
            .get(&self.base)
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn get(&self, id: i64) -> Result<Memo, BackendError> {
        let response = self
            .http
            .get(self.item_url(id))
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn update(&self, id: i64, patch: MemoPatch) -> Result<Memo, BackendError> {
        let response = self
            .http
            .put(self.item_url(id))
            .json(&patch)
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn delete(&self, id: i64) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(unreachable)?;
        check(response).await.map(|_| ())
    }
}
