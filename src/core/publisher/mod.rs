use crate::core::error::QmError;
use crate::core::results_processor::ResultRecord;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

const ERROR_BODY_LIMIT: usize = 512;

/// Destination for result records.
#[async_trait]
pub trait ResultPublisher: Send + Sync + 'static {
    async fn publish(&self, record: &ResultRecord) -> Result<(), QmError>;
}

/// Posts each record as its own JSON document to a CouchDB database URL.
#[derive(Clone)]
pub struct CouchDbPublisher {
    http: reqwest::Client,
    url: Url,
}

impl CouchDbPublisher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, QmError> {
        let url = Url::parse(url)
            .map_err(|e| QmError::Config(format!("invalid store url '{}': {}", url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QmError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(CouchDbPublisher { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ResultPublisher for CouchDbPublisher {
    async fn publish(&self, record: &ResultRecord) -> Result<(), QmError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| QmError::Publication {
                id: record.id.clone(),
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        tracing::info!(id = %record.id, status = status.as_u16(), "document store responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
            return Err(QmError::Publication {
                id: record.id.clone(),
                status: Some(status.as_u16()),
                detail,
            });
        }
        Ok(())
    }
}
