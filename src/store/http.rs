use super::{FilterPage, FilterRequest, LogStore, Result, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const FILTER_TARGET: &str = "Logs_20140328.FilterLogEvents";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Client for a CloudWatch-Logs-compatible JSON endpoint.
///
/// Requests are sent unsigned, so the endpoint is expected to be a local
/// emulator or a signing proxy in front of the real service.
#[derive(Debug)]
pub struct HttpLogStore {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterLogEventsBody<'a> {
    log_group_name: &'a str,
    log_stream_names: [&'a str; 1],
    #[serde(skip_serializing_if = "String::is_empty")]
    filter_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

impl HttpLogStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn request_body(request: &FilterRequest) -> FilterLogEventsBody<'_> {
    FilterLogEventsBody {
        log_group_name: &request.log_group,
        log_stream_names: [&request.log_stream],
        filter_pattern: request.pattern.to_string(),
        next_token: request.next_token.as_deref(),
        limit: request.limit,
    }
}

#[async_trait]
impl LogStore for HttpLogStore {
    async fn filter_events(&self, request: &FilterRequest) -> Result<FilterPage> {
        let url = format!("{}/", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("X-Amz-Target", FILTER_TARGET)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(serde_json::to_vec(&request_body(request))?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Service {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        let page: FilterPage = serde_json::from_slice(&bytes)?;

        tracing::trace!(
            log_stream = %request.log_stream,
            events = page.events.len(),
            has_more = page.next_token.is_some(),
            "Fetched page from log store"
        );
        Ok(page)
    }
}
