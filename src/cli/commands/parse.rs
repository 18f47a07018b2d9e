use anyhow::Result;
use console::{Emoji, style};
use std::path::PathBuf;

use super::write_table;
use crate::document::text;
use crate::export::{Table, TableLayout};
use crate::records;

static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub async fn run(dump: PathBuf, output: Option<PathBuf>, layout: TableLayout) -> Result<()> {
    let content = text::read_text(&dump)?;
    let report = records::parse_dump(&content);
    let table = Table::from_report(&report, layout);

    let Some(output) = output else {
        // Plain CSV on stdout so the command can be piped.
        print!("{}", table.to_csv()?);
        return Ok(());
    };

    write_table(&table, &output)?;

    println!();
    if report.is_empty() {
        println!("{}No test results found in {}", WARN, style(dump.display()).cyan());
    }
    if report.date().is_none() {
        println!("{}No test date found; header set to 'Result'", WARN);
    }
    println!(
        "{}{} results written to {}",
        CHECK,
        style(report.records.len()).green().bold(),
        style(output.display()).cyan()
    );
    println!();

    Ok(())
}
