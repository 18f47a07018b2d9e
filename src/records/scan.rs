//! Line scanner that pairs test lines with their results.
//!
//! The scan is a two-state machine over an index into the classified lines:
//!
//! - `SeekingLabel` walks forward until it meets a test line.
//! - `SeekingResult` looks ahead from that line for a result value and stops
//!   at the next labeled line or at the end of input.
//!
//! The date is resolved separately, from the end of the dump backwards.

use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractedLine, LabReport, TestRecord};

/// A value followed by a flag, embedded in the test name: `Glucose 105 High`.
static EMBEDDED_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*(?:High|Low)").expect("embedded result pattern"));

/// A line that starts with a value, optionally behind a comparison: `4.1`, `<0.5 mg/dL`.
static NUMERIC_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[<>]?\d+(?:\.\d+)?").expect("numeric start pattern"));

static ANY_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("digit pattern"));

enum State {
    SeekingLabel,
    SeekingResult { test_name: String, cursor: usize },
}

/// Outcome of looking at one line during lookahead.
enum Lookahead {
    Continue,
    Found(String),
    Exhausted,
}

/// Parse classified dump lines into a report.
///
/// Never fails: a missing date or result is an empty string, and a dump
/// without test lines yields no records.
pub fn parse<'a, I>(lines: I) -> LabReport
where
    I: IntoIterator<Item = &'a str>,
{
    let lines: Vec<ExtractedLine<'a>> = lines.into_iter().map(ExtractedLine::classify).collect();

    LabReport {
        records: Scanner::new(&lines).run(),
        date: resolve_date(&lines),
    }
}

/// The last date line in document order wins.
fn resolve_date(lines: &[ExtractedLine<'_>]) -> String {
    lines
        .iter()
        .rev()
        .find_map(|line| match line {
            ExtractedLine::Date(date) => Some((*date).to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

struct Scanner<'l, 'a> {
    lines: &'l [ExtractedLine<'a>],
    pos: usize,
    records: Vec<TestRecord>,
}

impl<'l, 'a> Scanner<'l, 'a> {
    fn new(lines: &'l [ExtractedLine<'a>]) -> Self {
        Self {
            lines,
            pos: 0,
            records: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<TestRecord> {
        let mut state = State::SeekingLabel;

        loop {
            state = match state {
                State::SeekingLabel => {
                    let Some(line) = self.lines.get(self.pos) else {
                        break;
                    };
                    self.pos += 1;

                    match line {
                        ExtractedLine::Test(payload) => match split_embedded_result(payload) {
                            (test_name, Some(result)) => {
                                self.records.push(TestRecord::new(test_name, result));
                                State::SeekingLabel
                            }
                            (test_name, None) => State::SeekingResult {
                                test_name,
                                cursor: self.pos,
                            },
                        },
                        _ => State::SeekingLabel,
                    }
                }
                State::SeekingResult { test_name, cursor } => match self.look_at(cursor) {
                    Lookahead::Continue => State::SeekingResult {
                        test_name,
                        cursor: cursor + 1,
                    },
                    Lookahead::Found(result) => {
                        self.records.push(TestRecord::new(test_name, result));
                        State::SeekingLabel
                    }
                    Lookahead::Exhausted => {
                        self.records.push(TestRecord::new(test_name, String::new()));
                        State::SeekingLabel
                    }
                },
            };
        }

        self.records
    }

    fn look_at(&self, cursor: usize) -> Lookahead {
        let text = match self.lines.get(cursor) {
            Some(line @ ExtractedLine::Plain(text)) if !line.is_label() => text.trim(),
            // Next label or end of input: never cross into another record
            _ => return Lookahead::Exhausted,
        };

        if text.starts_with("High") || text.starts_with("Low") {
            if ANY_DIGIT.is_match(text) {
                return Lookahead::Found(text.to_string());
            }
            return match self.lines.get(cursor + 1) {
                Some(ExtractedLine::Plain(next)) if NUMERIC_START.is_match(next.trim()) => {
                    Lookahead::Found(format!("{} {}", text, next.trim()))
                }
                // A bare flag still ends the lookahead, with no result
                _ => Lookahead::Exhausted,
            };
        }

        if NUMERIC_START.is_match(text) || text.starts_with("Normal") {
            return Lookahead::Found(text.to_string());
        }

        Lookahead::Continue
    }
}

/// Split `Glucose 105 High` into `("Glucose", Some("105 High"))`.
fn split_embedded_result(payload: &str) -> (String, Option<String>) {
    let Some(found) = EMBEDDED_RESULT.find(payload) else {
        return (payload.to_string(), None);
    };

    let before = payload[..found.start()].trim_end();
    let after = payload[found.end()..].trim_start();
    let test_name = match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{} {}", before, after),
        (false, true) => before.to_string(),
        (true, _) => after.to_string(),
    };

    (test_name, Some(found.as_str().to_string()))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
