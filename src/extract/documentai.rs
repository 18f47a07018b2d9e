use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Entity, EntityExtractor, ExtractedDocument};
use crate::config::DocumentAiConfig;
use crate::document::{DocumentKind, SourceDocument};
use crate::error::PipelineError;

/// Google Document AI `processors:process` client.
pub struct DocumentAiExtractor {
    client: Client,
    endpoint: String,
    auth: Auth,
    field_mask: String,
    target_entities: Vec<String>,
}

enum Auth {
    Bearer(String),
    ApiKey(String),
}

#[derive(Serialize)]
struct ProcessRequest<'a> {
    #[serde(rename = "rawDocument")]
    raw_document: RawDocument<'a>,
    #[serde(rename = "fieldMask", skip_serializing_if = "str::is_empty")]
    field_mask: &'a str,
}

#[derive(Serialize)]
struct RawDocument<'a> {
    content: String,
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    document: Option<ResponseDocument>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ResponseDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<ResponseEntity>,
}

#[derive(Deserialize)]
struct ResponseEntity {
    #[serde(rename = "type", default)]
    entity_type: String,
    #[serde(rename = "mentionText", default)]
    mention_text: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl DocumentAiExtractor {
    pub fn new(config: &DocumentAiConfig) -> Result<Self, PipelineError> {
        if config.project_id.is_empty() || config.processor_id.is_empty() {
            return Err(PipelineError::Config(
                "documentai.project_id and documentai.processor_id must be set".to_string(),
            ));
        }

        let auth = if !config.access_token.is_empty() {
            Auth::Bearer(config.access_token.clone())
        } else if !config.api_key.is_empty() {
            Auth::ApiKey(config.api_key.clone())
        } else {
            return Err(PipelineError::Config(
                "Document AI credentials missing. Set documentai.access_token or documentai.api_key."
                    .to_string(),
            ));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: process_endpoint(config),
            auth,
            field_mask: config.field_mask.clone(),
            target_entities: config.target_entities.clone(),
        })
    }

    async fn process(&self, doc: &SourceDocument) -> Result<ProcessResponse, PipelineError> {
        let request = ProcessRequest {
            raw_document: RawDocument {
                content: STANDARD.encode(&doc.bytes),
                mime_type: doc.mime_type(),
            },
            field_mask: &self.field_mask,
        };

        let builder = self.client.post(&self.endpoint).json(&request);
        let builder = match &self.auth {
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::ApiKey(key) => builder.query(&[("key", key)]),
        };

        let response = builder.send().await.map_err(|e| {
            PipelineError::extraction(format!("failed to send request to Document AI: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::extraction(format!(
                "Document AI error ({}): {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            PipelineError::extraction(format!("failed to parse Document AI response: {}", e))
        })
    }
}

fn process_endpoint(config: &DocumentAiConfig) -> String {
    let base = config
        .base_url
        .clone()
        .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", config.location));

    let mut endpoint = format!(
        "{}/v1/projects/{}/locations/{}/processors/{}",
        base.trim_end_matches('/'),
        config.project_id,
        config.location,
        config.processor_id
    );
    if let Some(version) = &config.processor_version {
        endpoint.push_str("/processorVersions/");
        endpoint.push_str(version);
    }
    endpoint.push_str(":process");
    endpoint
}

#[async_trait]
impl EntityExtractor for DocumentAiExtractor {
    async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedDocument, PipelineError> {
        if doc.kind == DocumentKind::Text {
            return Err(PipelineError::UnsupportedDocument(format!(
                "{} ({}) cannot be sent to Document AI",
                doc.name,
                doc.mime_type()
            )));
        }

        debug!("Sending {} ({} bytes) to Document AI", doc.name, doc.bytes.len());
        let response = self.process(doc).await?;

        if let Some(error) = response.error {
            return Err(PipelineError::extraction(format!(
                "Document AI error: {}",
                error.message
            )));
        }

        let document = response
            .document
            .ok_or_else(|| PipelineError::extraction("no document in Document AI response"))?;

        let mut extracted = ExtractedDocument {
            text: document.text,
            entities: document
                .entities
                .into_iter()
                .map(|e| Entity::new(e.entity_type, e.mention_text))
                .collect(),
        };
        extracted.retain_labels(&self.target_entities);

        debug!(
            "Document AI returned {} target entities for {}",
            extracted.entities.len(),
            doc.name
        );
        Ok(extracted)
    }

    fn name(&self) -> &'static str {
        "documentai"
    }
}
