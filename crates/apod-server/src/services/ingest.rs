//! Startup ingestion of the day's APOD record

use crate::storage::Database;
use anyhow::{Context, Result};
use apod_types::Record;
use reqwest::Client as ReqwestClient;
use tracing::info;

/// Client for the NASA APOD API
pub struct ApodClient {
    http: ReqwestClient,
    api_url: String,
    api_key: String,
}

impl ApodClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: ReqwestClient::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Fetch today's record. Non-2xx responses are errors.
    pub async fn fetch_today(&self) -> Result<Record> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to reach APOD API at {}", self.api_url))?
            .error_for_status()
            .context("APOD API returned an error status")?;

        let record: Record = response
            .json()
            .await
            .context("Failed to parse APOD response")?;

        Ok(record)
    }
}

/// Fetch today's record and store its explanation, title and url
pub async fn ingest(db: &Database, client: &ApodClient) -> Result<Record> {
    info!("Fetching today's APOD record...");
    let record = client.fetch_today().await?;
    info!("Fetched \"{}\" ({:?})", record.title, record.date);

    let stored = db
        .insert_ingested(&record)
        .await
        .context("Failed to store APOD record")?;
    info!("Stored APOD record with id {:?}", stored.id);

    Ok(stored)
}
