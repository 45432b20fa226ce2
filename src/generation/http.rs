/// HTTP client for the language model service
use super::{DocumentGenerator, GenerationRequest};
use crate::{
    config::GenerationConfig,
    documents::DocumentType,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Calls `POST {service_url}/generate/{sop|lor}`
#[derive(Clone)]
pub struct HttpDocumentGenerator {
    client: reqwest::Client,
    service_url: String,
}

impl HttpDocumentGenerator {
    pub fn new(config: &GenerationConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service_url: config.service_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, document_type: DocumentType) -> String {
        format!("{}/generate/{}", self.service_url, document_type.as_str())
    }
}

/// Pull the generated text out of a `{"success": true, "<type>": "..."}` body
fn extract_content(body: &Value, document_type: DocumentType) -> AppResult<String> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(AppError::Generation(error.to_string()));
    }

    body.get(document_type.as_str())
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Generation("Empty response from generation service".to_string()))
}

#[async_trait]
impl DocumentGenerator for HttpDocumentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AppResult<String> {
        let url = self.endpoint(request.document_type);
        tracing::debug!("Requesting {} generation from {}", request.document_type.as_str(), url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Generation request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Invalid generation response: {}", e)))?;

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(AppError::Generation(format!(
                "Generation service returned {}: {}",
                status, message
            )));
        }

        extract_content(&body, request.document_type)
    }
}
