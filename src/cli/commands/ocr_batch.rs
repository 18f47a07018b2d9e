use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::cli::load_config;
use crate::config::OcrConfig;
use crate::document::{self, SourceDocument};
use crate::extract::ocr;

static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub async fn run(config_path: Option<&Path>, base: PathBuf) -> Result<()> {
    println!();
    println!("{}", style(" labextract - OCR Batch ").bold().reverse());
    println!();

    let config = load_config(config_path)?;
    ocr::ensure_enabled(&config.ocr)?;

    let mut folders: Vec<PathBuf> = fs::read_dir(&base)
        .with_context(|| format!("Failed to read {}", base.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    if folders.is_empty() {
        println!("{}", style("No patient folders found").yellow());
        return Ok(());
    }

    let pb = ProgressBar::new(folders.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{}{{spinner:.green}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {{msg}}",
                FOLDER
            ))
            .context("Invalid progress template")?
            .progress_chars("━━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut compiled = 0usize;
    for folder in &folders {
        pb.set_message(format!("{}", style(folder.display()).dim()));
        let ocr_config = config.ocr.clone();
        let folder_path = folder.clone();
        let result =
            tokio::task::spawn_blocking(move || compile_folder(&ocr_config, &folder_path)).await?;
        match result {
            Ok(Some(path)) => {
                compiled += 1;
                pb.println(format!("{}{}", CHECK, style(path.display()).cyan()));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to OCR {}: {:#}", folder.display(), e);
                pb.println(format!("{}{}: {:#}", WARN, folder.display(), e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!();
    println!(
        "{}Compiled {} of {} folders",
        CHECK,
        style(compiled).green().bold(),
        folders.len()
    );
    println!();

    Ok(())
}

/// OCR every supported file in `folder` into `<folder>/<folder>_compiled.txt`.
///
/// Returns `None` when the folder holds nothing to OCR.
fn compile_folder(config: &OcrConfig, folder: &Path) -> Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && document::is_supported_file(p))
        .filter(|p| !p.extension().is_some_and(|e| e.eq_ignore_ascii_case("zip")))
        .collect();
    files.sort();

    if files.is_empty() {
        return Ok(None);
    }

    let mut pages = Vec::with_capacity(files.len());
    for path in &files {
        let doc = SourceDocument::load(path)?;
        let text = ocr::ocr_document(config, &doc)?;
        pages.push(text);
    }

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "patient".to_string());
    let output = folder.join(format!("{}_compiled.txt", folder_name));
    fs::write(&output, pages.join("\n"))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(Some(output))
}
