use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::records::LabReport;

pub const TEST_HEADER: &str = "TestType";
pub const RESULT_HEADER: &str = "Result";
pub const DATE_HEADER: &str = "Date";

/// How the report date is placed in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum TableLayout {
    /// `TestType,<date>`: the date is the result column's header.
    #[default]
    DateHeader,
    /// `TestType,Result,Date`: the date repeated on every row.
    DateColumn,
}

/// A rendered result table, ready for review or CSV output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_report(report: &LabReport, layout: TableLayout) -> Self {
        match layout {
            TableLayout::DateHeader => {
                let date_header = report.date().unwrap_or(RESULT_HEADER);
                Self {
                    headers: vec![TEST_HEADER.to_string(), date_header.to_string()],
                    rows: report
                        .records
                        .iter()
                        .map(|r| vec![r.test_name.clone(), r.result.clone()])
                        .collect(),
                }
            }
            TableLayout::DateColumn => Self {
                headers: vec![
                    TEST_HEADER.to_string(),
                    RESULT_HEADER.to_string(),
                    DATE_HEADER.to_string(),
                ],
                rows: report
                    .records
                    .iter()
                    .map(|r| vec![r.test_name.clone(), r.result.clone(), report.date.clone()])
                    .collect(),
            },
        }
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a blank row, as the review grid's "add row" does.
    pub fn push_empty_row(&mut self) {
        self.rows.push(vec![String::new(); self.width()]);
    }

    /// Serialize with the header row first; short rows are padded.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        self.write_records(&mut writer)?;

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output is not UTF-8")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(BufWriter::new(file));
        self.write_records(&mut writer)?;
        writer.flush().context("Failed to write CSV")?;
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).context("Failed to write JSON")?;
        Ok(())
    }

    fn write_records<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        let width = self.width();
        writer
            .write_record(pad(&self.headers, width))
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            writer
                .write_record(pad(row, width))
                .context("Failed to write CSV row")?;
        }
        Ok(())
    }

    /// Read a table back from CSV; the first record is the header.
    pub fn from_csv(data: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut records = reader.records();
        let headers = match records.next() {
            Some(record) => record
                .context("Failed to read CSV header")?
                .iter()
                .map(String::from)
                .collect(),
            None => return Ok(Self::default()),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.context("Failed to read CSV row")?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }
}

fn pad(cells: &[String], width: usize) -> Vec<&str> {
    let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
    padded.resize(width, "");
    padded
}

/// Concatenate per-document tables for a batch.
///
/// The first table's header becomes the header; each later table is preceded
/// by a blank row and its own header row, so every block keeps its date.
/// Tables without rows contribute nothing.
pub fn merge<'a, I>(tables: I) -> Table
where
    I: IntoIterator<Item = &'a Table>,
{
    let mut merged: Option<Table> = None;

    for table in tables.into_iter().filter(|t| !t.is_empty()) {
        match merged.as_mut() {
            None => merged = Some(table.clone()),
            Some(acc) => {
                acc.rows.push(Vec::new());
                acc.rows.push(table.headers.clone());
                acc.rows.extend(table.rows.iter().cloned());
            }
        }
    }

    let mut merged = merged.unwrap_or_default();
    let width = merged.width();
    for row in &mut merged.rows {
        row.resize(width, String::new());
    }
    merged
}
