mod documentai;
mod local;
pub mod ocr;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::Backend;
use crate::config::Config;
use crate::document::SourceDocument;
use crate::error::PipelineError;

pub use documentai::DocumentAiExtractor;
pub use local::LocalExtractor;

/// A labeled text span reported by an extraction backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub label: String,
    pub text: String,
}

impl Entity {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// What a backend found in one document: the full text plus ordered entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub entities: Vec<Entity>,
}

impl ExtractedDocument {
    /// Drop entities whose label is not listed, keeping the order of the rest.
    pub fn retain_labels<S: AsRef<str>>(&mut self, labels: &[S]) {
        if labels.is_empty() {
            return;
        }
        self.entities
            .retain(|e| labels.iter().any(|l| l.as_ref() == e.label));
    }

    /// Render the text dump the record parser reads.
    ///
    /// ```text
    /// Extracted Text:
    /// <text>
    ///
    /// Extracted Entities:
    /// <label>: <text>
    /// ```
    pub fn to_dump(&self) -> String {
        let mut dump = String::new();

        if !self.text.is_empty() {
            dump.push_str("Extracted Text:\n");
            dump.push_str(&self.text);
            dump.push_str("\n\n");
        }

        if self.entities.is_empty() {
            dump.push_str("No entities found in the document.\n");
        } else {
            dump.push_str("Extracted Entities:\n");
            for entity in &self.entities {
                dump.push_str(&entity.label);
                dump.push_str(": ");
                dump.push_str(&entity.text);
                dump.push('\n');
            }
        }

        dump
    }

    /// Text the record parser should scan.
    ///
    /// Entity-producing backends yield the dump; text-only backends (OCR)
    /// yield the raw text, which carries labels only if the source already did.
    pub fn parse_input(&self) -> String {
        if self.entities.is_empty() {
            self.text.clone()
        } else {
            self.to_dump()
        }
    }
}

/// A source of entities for a document.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedDocument, PipelineError>;

    fn name(&self) -> &'static str;
}

/// The configured extraction backend.
pub struct Extractor {
    backend: Box<dyn EntityExtractor>,
}

impl Extractor {
    pub fn new(backend: Backend, config: &Config) -> Result<Self, PipelineError> {
        let backend_impl: Box<dyn EntityExtractor> = match backend {
            Backend::DocumentAi => Box::new(DocumentAiExtractor::new(&config.documentai)?),
            Backend::Local => Box::new(LocalExtractor::new(config.ocr.clone())),
        };

        info!("Using {} extraction backend", backend_impl.name());
        Ok(Self {
            backend: backend_impl,
        })
    }

    /// Wrap an already-built backend.
    #[cfg(test)]
    pub fn from_backend(backend: Box<dyn EntityExtractor>) -> Self {
        Self { backend }
    }

    pub async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedDocument, PipelineError> {
        self.backend.extract(doc).await
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

/// Pick the backend: explicit choice first, then the config default.
pub fn resolve_backend(choice: Option<Backend>, config: &Config) -> Result<Backend, PipelineError> {
    if let Some(backend) = choice {
        return Ok(backend);
    }
    Backend::from_str(&config.default_backend, true).map_err(|_| {
        PipelineError::Config(format!(
            "unknown default_backend '{}' (expected documentai or local)",
            config.default_backend
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records;

    fn sample() -> ExtractedDocument {
        ExtractedDocument {
            text: "CBC\nWBC Normal".to_string(),
            entities: vec![
                Entity::new("dateoftest", "2024-07-18"),
                Entity::new("patientname", "Jane Doe"),
                Entity::new("TestTypeandResult", "WBC\nNormal"),
            ],
        }
    }

    #[test]
    fn test_retain_labels_keeps_order() {
        let mut doc = sample();
        doc.retain_labels(&records::TARGET_LABELS);
        let labels: Vec<&str> = doc.entities.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["dateoftest", "TestTypeandResult"]);
    }

    #[test]
    fn test_retain_labels_empty_list_keeps_everything() {
        let mut doc = sample();
        doc.retain_labels::<&str>(&[]);
        assert_eq!(doc.entities.len(), 3);
    }

    #[test]
    fn test_to_dump_layout() {
        let dump = sample().to_dump();
        assert!(dump.starts_with("Extracted Text:\nCBC\nWBC Normal\n\nExtracted Entities:\n"));
        assert!(dump.contains("dateoftest: 2024-07-18\n"));
        assert!(dump.ends_with("TestTypeandResult: WBC\nNormal\n"));
    }

    #[test]
    fn test_to_dump_without_entities() {
        let doc = ExtractedDocument::default();
        assert_eq!(doc.to_dump(), "No entities found in the document.\n");
    }

    #[test]
    fn test_dump_parses_back_into_records() {
        let report = records::parse_dump(&sample().to_dump());
        assert_eq!(report.date, "2024-07-18");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].test_name, "WBC");
        assert_eq!(report.records[0].result, "Normal");
    }

    #[test]
    fn test_parse_input_for_text_only_backends() {
        let doc = ExtractedDocument {
            text: "TestTypeandResult: Sodium\n142".to_string(),
            entities: Vec::new(),
        };
        assert_eq!(doc.parse_input(), "TestTypeandResult: Sodium\n142");
    }

    #[test]
    fn test_resolve_backend() {
        let mut config = Config::default();
        assert_eq!(resolve_backend(None, &config).unwrap(), Backend::DocumentAi);
        assert_eq!(
            resolve_backend(Some(Backend::Local), &config).unwrap(),
            Backend::Local
        );

        config.default_backend = "LOCAL".to_string();
        assert_eq!(resolve_backend(None, &config).unwrap(), Backend::Local);

        config.default_backend = "textract".to_string();
        assert!(matches!(
            resolve_backend(None, &config),
            Err(PipelineError::Config(_))
        ));
    }
}
