mod archive;
pub mod pdf;
pub mod text;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::PipelineError;

pub use archive::{DEFAULT_EXPANDED_LIMIT, expand_zip};

/// Kinds of document the extraction backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    /// An entity dump or OCR text that was already extracted.
    Text,
}

impl DocumentKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Tiff => "image/tiff",
            DocumentKind::Text => "text/plain",
        }
    }
}

/// A document held in memory, ready to hand to an extractor.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name, or `archive.zip/member.pdf` for zip members.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl SourceDocument {
    /// Build a document from bytes received over the wire or from an archive.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PipelineError> {
        let name = name.into();
        let kind = detect_kind(&bytes, &name)
            .ok_or_else(|| PipelineError::UnsupportedDocument(name.clone()))?;
        Ok(Self { name, bytes, kind })
    }

    /// Read a document from disk.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_bytes(name, bytes)
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Name without directories or extension, used for output file names.
    pub fn stem(&self) -> String {
        let base = self.name.rsplit('/').next().unwrap_or(&self.name);
        match base.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => base.to_string(),
        }
    }
}

/// Decide the document kind from magic bytes, falling back to the extension.
pub fn detect_kind(bytes: &[u8], name: &str) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(DocumentKind::Pdf);
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(DocumentKind::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DocumentKind::Jpeg);
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return Some(DocumentKind::Tiff);
    }

    match extension(name).as_deref() {
        Some("pdf") => Some(DocumentKind::Pdf),
        Some("png") => Some(DocumentKind::Png),
        Some("jpg") | Some("jpeg") => Some(DocumentKind::Jpeg),
        Some("tif") | Some("tiff") => Some(DocumentKind::Tiff),
        Some("txt") => Some(DocumentKind::Text),
        _ => None,
    }
}

pub fn is_zip(bytes: &[u8], name: &str) -> bool {
    bytes.starts_with(b"PK\x03\x04") || extension(name).as_deref() == Some("zip")
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Expand one uploaded or on-disk file into documents: zips yield their members.
pub fn documents_from_bytes(
    name: &str,
    bytes: Vec<u8>,
) -> Result<Vec<SourceDocument>, PipelineError> {
    if is_zip(&bytes, name) {
        expand_zip(name, &bytes, DEFAULT_EXPANDED_LIMIT)
    } else {
        Ok(vec![SourceDocument::from_bytes(name, bytes)?])
    }
}

/// Collect documents from a file or a directory tree.
///
/// A single file must be readable and supported. In a directory, unsupported
/// files are skipped and unreadable ones are logged and skipped.
pub fn collect_documents(path: &Path) -> Result<Vec<SourceDocument>, PipelineError> {
    if !path.is_dir() {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        return documents_from_bytes(&display_name(path, path), bytes);
    }

    let mut documents = Vec::new();
    for entry_path in walk_supported(path) {
        let bytes = match std::fs::read(&entry_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", entry_path.display(), e);
                continue;
            }
        };
        match documents_from_bytes(&display_name(path, &entry_path), bytes) {
            Ok(mut found) => documents.append(&mut found),
            Err(e) => warn!("Skipping {}: {}", entry_path.display(), e),
        }
    }

    Ok(documents)
}

/// Supported files below `root`, in a stable order.
fn walk_supported(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported_file(p))
        .collect();
    paths.sort();
    debug!("Found {} supported files under {}", paths.len(), root.display());
    paths
}

/// Documents and archives worth picking up from a directory.
pub fn is_supported_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref(),
        Some("pdf") | Some("zip") | Some("png") | Some("jpg") | Some("jpeg") | Some("tif") | Some("tiff")
    )
}

fn display_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    if relative.as_os_str().is_empty() {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    } else {
        relative.to_string_lossy().replace('\\', "/")
    }
}
