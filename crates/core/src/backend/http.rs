// crates/core/src/backend/http.rs
//! [`Backend`] over the backend's JSON/HTTP API (`/api/...`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use text2sql_types::{
    sample_counts_from_wire, Ack, ExecuteRequest, ExecutionResult, GenerateRequest, GeneratedQuery,
    HealthStatus, HistoryEntry, HistoryRecord, SampleCounts, SchemaDescription, SourceListing,
    UploadOutcome,
};

use super::Backend;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, Operation, RequestError};

/// HTTP client for the text2sql backend.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
    upload_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            upload_timeout: config.upload_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Send `request` and decode a successful body as `T`.
    ///
    /// Non-2xx responses become [`RequestError::Backend`] carrying the
    /// `detail` field of the error body when there is one.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, RequestError> {
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|source| RequestError::Transport { operation, source })?;
        let status = response.status();
        tracing::debug!(
            %operation,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Backend responded"
        );

        let body = response
            .bytes()
            .await
            .map_err(|source| RequestError::Transport { operation, source })?;

        if !status.is_success() {
            let detail = parse_detail(&body);
            return Err(RequestError::backend(operation, status.as_u16(), detail));
        }

        serde_json::from_slice(&body).map_err(|e| RequestError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

/// Extract the human-readable detail from an error body.
///
/// Handles `{"detail": "..."}` and validation-style
/// `{"detail": [{"msg": "..."}, ...]}`. Anything else yields `None`.
fn parse_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let detail = value.get("detail")?;
    let text = match detail {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate_query(&self, question: &str) -> Result<GeneratedQuery, RequestError> {
        let body = GenerateRequest {
            question: question.to_string(),
        };
        let request = self.client.post(self.url("generate-sql")).json(&body);
        self.send(Operation::GenerateQuery, request).await
    }

    async fn execute_query(&self, sql: &str) -> Result<ExecutionResult, RequestError> {
        let body = ExecuteRequest { sql: sql.to_string() };
        let request = self.client.post(self.url("execute-query")).json(&body);
        self.send(Operation::ExecuteQuery, request).await
    }

    async fn record_history(&self, record: &HistoryRecord) -> Result<(), RequestError> {
        let request = self.client.post(self.url("history")).json(record);
        self.send::<IgnoredAny>(Operation::RecordHistory, request)
            .await
            .map(|_| ())
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, RequestError> {
        let request = self.client.get(self.url("history"));
        self.send(Operation::FetchHistory, request).await
    }

    async fn list_sources(&self) -> Result<SourceListing, RequestError> {
        let request = self.client.get(self.url("databases"));
        self.send(Operation::ListSources, request).await
    }

    async fn switch_source(&self, name: &str) -> Result<Ack, RequestError> {
        let request = self
            .client
            .post(self.url("switch-database"))
            .query(&[("db_name", name)]);
        self.send(Operation::SwitchSource, request).await
    }

    async fn delete_source(&self, name: &str) -> Result<Ack, RequestError> {
        let path = format!("delete-upload/{}", urlencoding::encode(name));
        let request = self.client.delete(self.url(&path));
        self.send(Operation::DeleteSource, request).await
    }

    async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome, RequestError> {
        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let request = self
            .client
            .post(self.url("upload-data"))
            .timeout(self.upload_timeout)
            .multipart(form);
        tracing::debug!(file_name, size, "Uploading file");
        self.send(Operation::UploadFile, request).await
    }

    async fn active_schema(&self) -> Result<SchemaDescription, RequestError> {
        let request = self.client.get(self.url("active-schema"));
        self.send(Operation::ActiveSchema, request).await
    }

    async fn sample_counts(&self) -> Result<SampleCounts, RequestError> {
        let request = self.client.get(self.url("sample-data"));
        let payload: serde_json::Value = self.send(Operation::SampleCounts, request).await?;
        Ok(sample_counts_from_wire(&payload))
    }

    async fn health(&self) -> Result<HealthStatus, RequestError> {
        let request = self.client.get(self.url("health"));
        self.send(Operation::Health, request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detail_string() {
        let body = br#"{"detail": "Database not found"}"#;
        assert_eq!(parse_detail(body).as_deref(), Some("Database not found"));
    }

    #[test]
    fn test_parse_detail_validation_list() {
        let body = br#"{"detail": [{"loc": ["body", "question"], "msg": "field required"},
                                   {"loc": ["body"], "msg": "bad json"}]}"#;
        assert_eq!(
            parse_detail(body).as_deref(),
            Some("field required; bad json")
        );
    }

    #[test]
    fn test_parse_detail_absent_or_unreadable() {
        assert_eq!(parse_detail(b"Internal Server Error"), None);
        assert_eq!(parse_detail(br#"{"error": "x"}"#), None);
        assert_eq!(parse_detail(br#"{"detail": "  "}"#), None);
        assert_eq!(parse_detail(br#"{"detail": null}"#), None);
        assert_eq!(parse_detail(b""), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ClientConfig {
            base_url: "http://localhost:8000/".into(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.url("databases"), "http://localhost:8000/api/databases");
    }
}
