use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{trace, warn};
use reqwest::Client;
use serde_json::Value;

use crate::types::point::{FieldValue, Fields};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("body is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("expected a json object, got {0}")]
    NotAnObject(&'static str),
}

/// Something that produces one document of fields per cycle.
pub trait Source {
    fn fetch(&self) -> impl Future<Output = Result<Fields, FetchError>>;
}

pub struct Fetcher {
    client: Client,
    url: String,
}

impl Fetcher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("could not build http client")?;

        Ok(Fetcher {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Source for Fetcher {
    async fn fetch(&self) -> Result<Fields, FetchError> {
        let resp = self.client.get(&self.url)
            .send()
            .await?;

        // non-2xx bodies are still decoded; an html error page fails there
        let status = resp.status();
        if !status.is_success() {
            warn!("{} answered with {}, decoding the body anyway", self.url, status);
        }

        let body = resp.bytes().await?;

        trace!("fetched {} bytes from {}", body.len(), self.url);

        decode(&body)
    }
}

pub fn decode(body: &[u8]) -> Result<Fields, FetchError> {
    let map = match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => map,
        Value::Null => return Err(FetchError::NotAnObject("null")),
        Value::Bool(_) => return Err(FetchError::NotAnObject("a boolean")),
        Value::Number(_) => return Err(FetchError::NotAnObject("a number")),
        Value::String(_) => return Err(FetchError::NotAnObject("a string")),
        Value::Array(_) => return Err(FetchError::NotAnObject("an array")),
    };

    Ok(map.into_iter()
        .map(|(key, value)| (key, FieldValue::from(value)))
        .collect())
}
