pub mod drive;
pub mod extract;
pub mod init;
pub mod ocr_batch;
pub mod parse;
pub mod process;
pub mod serve;

use std::path::Path;

use anyhow::Result;

use crate::export::Table;

/// Write a table as JSON when the path ends in `.json`, CSV otherwise.
pub(crate) fn write_table(table: &Table, path: &Path) -> Result<()> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        table.write_json(path)
    } else {
        table.write_csv(path)
    }
}
