use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Backend, load_config};
use crate::document::SourceDocument;
use crate::extract::{self, Extractor};

static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");

pub async fn run(
    config_path: Option<&Path>,
    path: PathBuf,
    backend: Option<Backend>,
    output: Option<PathBuf>,
) -> Result<()> {
    println!();
    println!("{}", style(" labextract - Entity Extraction ").bold().reverse());
    println!();

    let config = load_config(config_path)?;
    let backend = extract::resolve_backend(backend, &config)?;
    let extractor = Extractor::new(backend, &config)?;

    println!("{}Backend: {}", BRAIN, style(backend).cyan().bold());
    println!("{}Source: {}", PAPER, style(path.display()).cyan());

    let doc = SourceDocument::load(&path)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Extracting {}...", doc.name));

    let extracted = extractor.extract(&doc).await;
    spinner.finish_and_clear();
    let extracted = extracted?;

    let output = output.unwrap_or_else(|| path.with_extension("txt"));
    fs::write(&output, extracted.to_dump())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}Found {} entities, dump written to {}",
        CHECK,
        style(extracted.entities.len()).green().bold(),
        style(output.display()).cyan()
    );
    println!();

    Ok(())
}
