use std::path::Path;

use anyhow::{Context, Result};

/// Read a text file such as a saved entity dump.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read text file: {}", path.display()))?;

    Ok(decode(&bytes))
}

/// Decode text bytes leniently, dropping a UTF-8 byte order mark.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
