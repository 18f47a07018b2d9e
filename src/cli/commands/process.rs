use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::write_table;
use crate::cli::{Backend, load_config};
use crate::document;
use crate::export::TableLayout;
use crate::extract::{self, Extractor};
use crate::pipeline;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[x] ");

pub struct ProcessOptions {
    pub backend: Option<Backend>,
    pub output: PathBuf,
    pub layout: TableLayout,
    pub concurrency: usize,
    pub keep_dumps: bool,
}

pub async fn run(config_path: Option<&Path>, path: PathBuf, options: ProcessOptions) -> Result<()> {
    let started = Instant::now();

    println!();
    println!("{}", style(" labextract - Process Reports ").bold().reverse());
    println!();

    let config = load_config(config_path)?;
    let backend = extract::resolve_backend(options.backend, &config)?;
    let extractor = Arc::new(Extractor::new(backend, &config)?);

    println!("{}Backend: {}", BRAIN, style(backend).cyan().bold());
    println!("{}Scanning {}", LOOKING_GLASS, style(path.display()).cyan());

    let documents = document::collect_documents(&path)?;
    if documents.is_empty() {
        println!();
        println!(
            "{}",
            style("No supported documents found (.pdf, .zip, .png, .jpg, .tif)").yellow()
        );
        return Ok(());
    }
    println!(
        "{}Found {} documents",
        PAPER,
        style(documents.len()).green().bold()
    );

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{}{{spinner:.green}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {{msg}}",
                SPARKLE
            ))
            .context("Invalid progress template")?
            .progress_chars("━━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let single = documents.len() == 1;
    let outcome = pipeline::process_batch(
        extractor,
        documents,
        options.layout,
        options.concurrency,
        Some(pb.clone()),
    )
    .await?;
    pb.finish_and_clear();

    for (name, error) in &outcome.failures {
        println!("{}{}: {}", CROSS, style(name).red(), error);
    }

    if outcome.processed.is_empty() {
        anyhow::bail!("No documents could be processed");
    }

    // A lone report keeps its own table; batches get the stacked layout.
    let table = if single {
        outcome.processed[0].table.clone()
    } else {
        outcome.merged_table()
    };
    write_table(&table, &options.output)?;

    if options.keep_dumps {
        let dir = options
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        for processed in &outcome.processed {
            let dump_path = dir.join(dump_file_name(&processed.name));
            fs::write(&dump_path, &processed.dump)
                .with_context(|| format!("Failed to write {}", dump_path.display()))?;
        }
        println!(
            "{}Wrote {} entity dumps to {}",
            PAPER,
            outcome.processed.len(),
            style(dir.display()).cyan()
        );
    }

    let records: usize = outcome.processed.iter().map(|p| p.report.records.len()).sum();

    println!();
    println!(
        "{}Processed {} of {} documents ({} results) in {}",
        CHECK,
        style(outcome.processed.len()).green().bold(),
        outcome.processed.len() + outcome.failures.len(),
        style(records).green().bold(),
        style(HumanDuration(started.elapsed())).green().bold()
    );
    println!("   Table written to {}", style(options.output.display()).cyan());
    println!();

    Ok(())
}

/// Dump file for a document, unique across the batch: `jan/report.pdf` becomes
/// `jan_report.txt`.
fn dump_file_name(name: &str) -> String {
    let without_ext = Path::new(name).with_extension("");
    format!(
        "{}.txt",
        without_ext.to_string_lossy().replace(['/', '\\'], "_")
    )
}
