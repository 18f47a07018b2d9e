use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::extract::ocr;

static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");

pub async fn run(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    println!();
    println!("{}", style(" labextract - Initialization ").bold().reverse());
    println!();

    let config_path = match config_path {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if config_path.exists() && !force {
        println!(
            "{}Configuration already exists at {}",
            WARN,
            style(config_path.display()).cyan()
        );
        println!("  Use {} to overwrite", style("--force").yellow());
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(&format!("{}{{spinner:.green}} {{msg}}", GEAR))
            .context("Invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Creating configuration...");

    let config_content = toml::to_string_pretty(&Config::template())?;
    fs::write(&config_path, config_content).context("Failed to write config file")?;
    spinner.finish_and_clear();

    println!(
        "{}Created configuration at {}",
        CHECK,
        style(config_path.display()).cyan()
    );

    let defaults = Config::default();
    for tool in [&defaults.ocr.pdftoppm_path, &defaults.ocr.tesseract_path] {
        if !ocr::is_available(tool) {
            println!(
                "{}{} not found; the local backend needs it for scanned reports",
                WARN,
                style(tool).yellow()
            );
        }
    }

    println!();
    println!("{}Next steps:", KEY);
    println!(
        "  1. Set {} and {} in the config file",
        style("documentai.project_id").cyan(),
        style("documentai.processor_id").cyan()
    );
    println!(
        "  2. Export {} (or {}) for Document AI",
        style("GOOGLE_ACCESS_TOKEN").cyan(),
        style("DOCUMENTAI_API_KEY").cyan()
    );
    println!(
        "  3. Export {} before running {}",
        style("LABEXTRACT_PASSWORD").cyan(),
        style("labextract serve").cyan()
    );
    println!();

    Ok(())
}
