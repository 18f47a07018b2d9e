use crate::error::PipelineError;

/// Extract the embedded text layer of a PDF.
///
/// Scanned reports usually have no text layer; callers decide whether the
/// result is too thin and fall back to OCR.
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        PipelineError::extraction(format!("failed to read text layer of {}: {}", name, e))
    })?;

    Ok(clean_pdf_text(&text))
}

/// Count of visible characters, used to tell text PDFs from scans.
pub fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Clean up extracted PDF text
fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        // Remove common PDF artifacts
        .replace('\u{0}', "")
        .replace('\u{FEFF}', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_pdf_text() {
        let dirty = "  Sodium  \n\n\n  142  \n  ";
        assert_eq!(clean_pdf_text(dirty), "Sodium\n142");
    }

    #[test]
    fn test_clean_pdf_text_strips_artifacts() {
        assert_eq!(clean_pdf_text("\u{FEFF}WBC\u{0}"), "WBC");
    }

    #[test]
    fn test_visible_chars() {
        assert_eq!(visible_chars(" a b\n\tc "), 3);
        assert_eq!(visible_chars("\n\n"), 0);
    }

    #[test]
    fn test_extract_text_rejects_garbage() {
        let err = extract_text("broken.pdf", b"%PDF-1.4 not really").unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed(_)));
    }
}
