//! Test records reconstructed from an entity dump.
//!
//! The extractor renders its entities as `label: text` lines. Only two labels
//! matter here: `dateoftest` (the report date) and `TestTypeandResult` (a test
//! name, sometimes with its result attached). Everything else is a plain
//! continuation line that may carry a result value.

mod scan;

use serde::{Deserialize, Serialize};

pub use scan::parse;

/// Entity label carrying the report date.
pub const DATE_LABEL: &str = "dateoftest";
/// Entity label carrying a test name and possibly its result.
pub const TEST_LABEL: &str = "TestTypeandResult";

/// The labels the parser understands, in the order the extractor is asked for them.
pub const TARGET_LABELS: [&str; 2] = [DATE_LABEL, TEST_LABEL];

const DATE_PREFIX: &str = "dateoftest:";
const TEST_PREFIX: &str = "TestTypeandResult:";

/// One line of an entity dump, classified by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractedLine<'a> {
    /// `dateoftest:` line; holds the trimmed text after the prefix.
    Date(&'a str),
    /// `TestTypeandResult:` line; holds the trimmed text after the prefix.
    Test(&'a str),
    /// Any other line, untouched.
    Plain(&'a str),
}

impl<'a> ExtractedLine<'a> {
    /// Prefixes only count at the start of the line; indented labels stay plain.
    pub fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix(DATE_PREFIX) {
            ExtractedLine::Date(rest.trim())
        } else if let Some(rest) = line.strip_prefix(TEST_PREFIX) {
            ExtractedLine::Test(rest.trim())
        } else {
            ExtractedLine::Plain(line)
        }
    }

    /// Labeled lines bound the result lookahead of the previous test line.
    /// Indented labels bound it too, although they start no record.
    pub fn is_label(&self) -> bool {
        match self {
            ExtractedLine::Plain(text) => {
                let head = text.trim_start();
                head.starts_with(DATE_PREFIX) || head.starts_with(TEST_PREFIX)
            }
            ExtractedLine::Date(_) | ExtractedLine::Test(_) => true,
        }
    }
}

/// A test name paired with the raw result text found for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_name: String,
    /// Empty when no result could be located; never dropped, so rows stay aligned.
    pub result: String,
}

impl TestRecord {
    pub fn new(test_name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            result: result.into(),
        }
    }
}

/// Everything parsed out of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabReport {
    /// Records in the order their test lines appeared.
    pub records: Vec<TestRecord>,
    /// Date from the last `dateoftest:` line, empty if there was none.
    pub date: String,
}

impl LabReport {
    pub fn date(&self) -> Option<&str> {
        if self.date.is_empty() {
            None
        } else {
            Some(&self.date)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a whole dump as produced by the extractor (`\n` or `\r\n` separated).
pub fn parse_dump(dump: &str) -> LabReport {
    parse(dump.lines())
}
