//! OCR through the `pdftoppm` and `tesseract` command line tools.
//!
//! Both tools must be installed (poppler-utils and tesseract-ocr). Every call
//! works in its own temporary directory, which is removed on return.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::document::{DocumentKind, SourceDocument};
use crate::error::PipelineError;

/// OCR a document regardless of any embedded text layer.
pub fn ocr_document(config: &OcrConfig, doc: &SourceDocument) -> Result<String, PipelineError> {
    match doc.kind {
        DocumentKind::Pdf => ocr_pdf(config, &doc.name, &doc.bytes),
        DocumentKind::Png => ocr_image(config, &doc.name, &doc.bytes, "png"),
        DocumentKind::Jpeg => ocr_image(config, &doc.name, &doc.bytes, "jpg"),
        DocumentKind::Tiff => ocr_image(config, &doc.name, &doc.bytes, "tif"),
        DocumentKind::Text => Err(PipelineError::UnsupportedDocument(format!(
            "{} is already text",
            doc.name
        ))),
    }
}

/// Rasterize every page of a PDF and OCR the pages in order.
pub fn ocr_pdf(config: &OcrConfig, name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
    ensure_enabled(config)?;

    let temp_dir = tempfile::tempdir()
        .map_err(|e| PipelineError::extraction(format!("failed to create temp dir: {}", e)))?;
    let input = temp_dir.path().join("input.pdf");
    std::fs::write(&input, bytes)
        .map_err(|e| PipelineError::extraction(format!("failed to stage {}: {}", name, e)))?;

    let output_prefix = temp_dir.path().join("page");
    let output = Command::new(&config.pdftoppm_path)
        .arg("-png")
        .arg("-r")
        .arg(config.dpi.to_string())
        .arg(&input)
        .arg(&output_prefix)
        .output()
        .map_err(|e| {
            PipelineError::extraction(format!(
                "failed to run pdftoppm (is it installed? path='{}'): {}",
                config.pdftoppm_path, e
            ))
        })?;

    if !output.status.success() {
        return Err(PipelineError::extraction(format!(
            "pdftoppm failed on {}: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut pages: Vec<_> = std::fs::read_dir(temp_dir.path())
        .map_err(|e| PipelineError::extraction(format!("failed to list rendered pages: {}", e)))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    // pdftoppm zero-pads page numbers, so lexical order is page order.
    pages.sort();

    if pages.is_empty() {
        return Err(PipelineError::extraction(format!(
            "pdftoppm produced no pages for {}",
            name
        )));
    }

    info!("Running OCR on {} pages of {}", pages.len(), name);
    let mut texts = Vec::with_capacity(pages.len());
    for page in &pages {
        texts.push(run_tesseract(config, page)?);
    }

    Ok(texts.join("\n"))
}

/// OCR a single image.
pub fn ocr_image(
    config: &OcrConfig,
    name: &str,
    bytes: &[u8],
    extension: &str,
) -> Result<String, PipelineError> {
    ensure_enabled(config)?;

    let temp_dir = tempfile::tempdir()
        .map_err(|e| PipelineError::extraction(format!("failed to create temp dir: {}", e)))?;
    let input = temp_dir.path().join(format!("image.{}", extension));
    std::fs::write(&input, bytes)
        .map_err(|e| PipelineError::extraction(format!("failed to stage {}: {}", name, e)))?;

    debug!("Running OCR on image {}", name);
    run_tesseract(config, &input)
}

fn run_tesseract(config: &OcrConfig, image: &Path) -> Result<String, PipelineError> {
    let output = Command::new(&config.tesseract_path)
        .arg(image)
        .arg("stdout")
        .arg("-l")
        .arg(&config.language)
        .output()
        .map_err(|e| {
            PipelineError::extraction(format!(
                "failed to run tesseract (is it installed? path='{}'): {}",
                config.tesseract_path, e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // tesseract exits non-zero on some recoverable page warnings
        if output.stdout.is_empty() {
            return Err(PipelineError::extraction(format!(
                "tesseract failed on {}: {}",
                image.display(),
                stderr.trim()
            )));
        }
        warn!("tesseract warning on {}: {}", image.display(), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

pub fn ensure_enabled(config: &OcrConfig) -> Result<(), PipelineError> {
    if config.enabled {
        Ok(())
    } else {
        Err(PipelineError::Config(
            "OCR is disabled (ocr.enabled = false)".to_string(),
        ))
    }
}

/// Whether a tool answers `--version`.
pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
