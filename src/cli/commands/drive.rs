use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::cli::{Backend, load_config};
use crate::document::SourceDocument;
use crate::drive::{DriveClient, DriveFile};
use crate::export::TableLayout;
use crate::extract::{self, Extractor};
use crate::pipeline;

static CLOUD: Emoji<'_, '_> = Emoji("☁️  ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[x] ");

pub struct DriveOptions {
    pub folder: Option<String>,
    pub output_folder: Option<String>,
    pub backend: Option<Backend>,
    pub layout: TableLayout,
    pub upload_dumps: bool,
}

pub async fn run(config_path: Option<&Path>, options: DriveOptions) -> Result<()> {
    let started = Instant::now();

    println!();
    println!("{}", style(" labextract - Drive Folder ").bold().reverse());
    println!();

    let config = load_config(config_path)?;
    let folder = options
        .folder
        .or_else(|| config.drive.input_folder_id.clone())
        .context("No input folder. Pass --folder or set drive.input_folder_id")?;
    let output_folder = options
        .output_folder
        .or_else(|| config.drive.output_folder_id.clone())
        .unwrap_or_else(|| folder.clone());

    let backend = extract::resolve_backend(options.backend, &config)?;
    let extractor = Extractor::new(backend, &config)?;
    let drive = DriveClient::new(&config.drive)?;

    println!("{}Backend: {}", BRAIN, style(backend).cyan().bold());
    println!("{}Listing folder {}", CLOUD, style(&folder).cyan());

    let files = drive.list_pdfs(&folder).await?;
    if files.is_empty() {
        println!();
        println!("{}", style("No PDFs found in the folder").yellow());
        return Ok(());
    }
    println!("{}Found {} PDFs", PAPER, style(files.len()).green().bold());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{}{{spinner:.green}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {{msg}}",
                CLOUD
            ))
            .context("Invalid progress template")?
            .progress_chars("━━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let summary = process_folder(
        &drive,
        &extractor,
        &files,
        &output_folder,
        options.layout,
        options.upload_dumps,
        Some(pb.clone()),
    )
    .await;
    pb.finish_and_clear();

    for (name, error) in &summary.failed {
        println!("{}{}: {:#}", CROSS, style(name).red(), error);
    }
    summary.check()?;

    println!();
    println!(
        "{}Uploaded {} files for {} of {} PDFs to {} in {}",
        CHECK,
        style(summary.uploaded.len()).green().bold(),
        style(summary.processed).green().bold(),
        files.len(),
        style(&output_folder).cyan(),
        style(HumanDuration(started.elapsed())).green().bold()
    );
    println!();

    Ok(())
}

/// Result of pushing one folder through the pipeline.
#[derive(Debug, Default)]
pub(crate) struct DriveSummary {
    pub processed: usize,
    /// Names uploaded to the output folder, in upload order.
    pub uploaded: Vec<String>,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl DriveSummary {
    /// Fails when files were listed but none of them made it through.
    pub fn check(&self) -> Result<()> {
        if self.processed == 0 && !self.failed.is_empty() {
            anyhow::bail!("No documents could be processed");
        }
        Ok(())
    }
}

/// Download, extract and upload each file in turn. A failing file is
/// recorded and the loop moves on.
pub(crate) async fn process_folder(
    drive: &DriveClient,
    extractor: &Extractor,
    files: &[DriveFile],
    output_folder: &str,
    layout: TableLayout,
    upload_dumps: bool,
    progress: Option<ProgressBar>,
) -> DriveSummary {
    let mut summary = DriveSummary::default();

    for file in files {
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", style(&file.name).dim()));
        }
        let result = async {
            let bytes = drive.download(&file.id).await?;
            let doc = SourceDocument::from_bytes(file.name.clone(), bytes)?;
            let processed = pipeline::process_document(extractor, &doc, layout).await?;

            let mut names = Vec::new();
            let csv = processed.table.to_csv()?;
            let csv_name = format!("processed_{}.csv", processed.stem);
            drive
                .upload(output_folder, &csv_name, "text/csv", csv.as_bytes())
                .await?;
            names.push(csv_name);

            if upload_dumps {
                let dump_name = format!("{}_output.txt", processed.stem);
                drive
                    .upload(output_folder, &dump_name, "text/plain", processed.dump.as_bytes())
                    .await?;
                names.push(dump_name);
            }
            anyhow::Ok(names)
        }
        .await;

        match result {
            Ok(names) => {
                summary.processed += 1;
                summary.uploaded.extend(names);
            }
            Err(e) => {
                warn!("Failed to process {}: {:#}", file.name, e);
                summary.failed.push((file.name.clone(), e));
            }
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    summary
}
