use std::io::{Cursor, Read};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::{SourceDocument, detect_kind};
use crate::error::PipelineError;

/// Upper bound on unpacked archive content when the caller sets none.
pub const DEFAULT_EXPANDED_LIMIT: u64 = 512 * 1024 * 1024;

/// Expand a zip archive into the supported documents it contains.
///
/// Directories, unsupported members and nested archives are skipped. Members
/// are named `<archive>/<member path>` and keep archive order. The archive is
/// rejected once its unpacked members exceed `max_expanded` bytes in total;
/// header sizes are not trusted.
pub fn expand_zip(
    archive_name: &str,
    bytes: &[u8],
    max_expanded: u64,
) -> Result<Vec<SourceDocument>, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::UnsupportedDocument(format!("{}: {}", archive_name, e)))?;

    let mut documents = Vec::new();
    let mut expanded: u64 = 0;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(|e| {
            PipelineError::UnsupportedDocument(format!("{} entry {}: {}", archive_name, index, e))
        })?;

        if member.is_dir() {
            continue;
        }

        let member_name = member.name().to_string();
        let remaining = max_expanded.saturating_sub(expanded);
        let mut content = Vec::new();
        // One byte past the budget is enough to tell that it was exceeded.
        if let Err(e) = (&mut member).take(remaining + 1).read_to_end(&mut content) {
            warn!("Skipping {}/{}: {}", archive_name, member_name, e);
            continue;
        }

        expanded += content.len() as u64;
        if expanded > max_expanded {
            return Err(PipelineError::UnsupportedDocument(format!(
                "{} expands beyond {} bytes",
                archive_name, max_expanded
            )));
        }

        match detect_kind(&content, &member_name) {
            Some(kind) => documents.push(SourceDocument {
                name: format!("{}/{}", archive_name, member_name),
                bytes: content,
                kind,
            }),
            None => debug!("Ignoring unsupported archive member {}", member_name),
        }
    }

    Ok(documents)
}
