use async_trait::async_trait;
use tracing::{debug, info};

use super::{EntityExtractor, ExtractedDocument, ocr};
use crate::config::OcrConfig;
use crate::document::{DocumentKind, SourceDocument, pdf, text};
use crate::error::PipelineError;

/// Offline backend: PDF text layer first, OCR for scans and images.
///
/// Produces text only. The record parser finds labels in it only when the
/// source already used the `label: value` line convention.
pub struct LocalExtractor {
    config: OcrConfig,
}

impl LocalExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

fn extract_blocking(config: &OcrConfig, doc: &SourceDocument) -> Result<String, PipelineError> {
    match doc.kind {
        DocumentKind::Text => Ok(text::decode(&doc.bytes)),
        DocumentKind::Pdf => {
            let layer = pdf::extract_text(&doc.name, &doc.bytes);
            match layer {
                Ok(text) if pdf::visible_chars(&text) >= config.min_text_chars => Ok(text),
                Ok(text) if !config.enabled => Ok(text),
                Err(e) if !config.enabled => Err(e),
                Ok(_) => {
                    info!("{} has no usable text layer, falling back to OCR", doc.name);
                    ocr::ocr_pdf(config, &doc.name, &doc.bytes)
                }
                Err(e) => {
                    debug!("Text layer of {} unreadable ({}), trying OCR", doc.name, e);
                    ocr::ocr_pdf(config, &doc.name, &doc.bytes)
                }
            }
        }
        _ => ocr::ocr_document(config, doc),
    }
}

#[async_trait]
impl EntityExtractor for LocalExtractor {
    async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedDocument, PipelineError> {
        let config = self.config.clone();
        let doc = doc.clone();

        let text = tokio::task::spawn_blocking(move || extract_blocking(&config, &doc))
            .await
            .map_err(|e| PipelineError::extraction(format!("extraction task failed: {}", e)))??;

        Ok(ExtractedDocument {
            text,
            entities: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
