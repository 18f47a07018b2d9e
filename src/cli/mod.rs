pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::config::Config;
use crate::export::TableLayout;

#[derive(Parser)]
#[command(name = "labextract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn lab report PDFs into reviewable test/result tables", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true, env = "LABEXTRACT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long, default_value = "false")]
        force: bool,
    },

    /// Extract entities from a document and write the entity dump
    Extract {
        /// PDF or image to extract from
        #[arg(required = true)]
        path: PathBuf,

        /// Extraction backend (documentai, local)
        #[arg(short, long, env = "LABEXTRACT_BACKEND")]
        backend: Option<Backend>,

        /// Dump file to write (defaults to <name>.txt next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse an entity dump into a result table
    Parse {
        /// Entity dump produced by `extract`
        #[arg(required = true)]
        dump: PathBuf,

        /// CSV (or .json) file to write; prints CSV when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Table layout
        #[arg(short, long, default_value = "date-header")]
        layout: TableLayout,
    },

    /// Extract and parse a document, zip archive or directory in one go
    Process {
        /// PDF, zip archive or directory of reports
        #[arg(required = true)]
        path: PathBuf,

        /// Extraction backend (documentai, local)
        #[arg(short, long, env = "LABEXTRACT_BACKEND")]
        backend: Option<Backend>,

        /// CSV (or .json) file to write
        #[arg(short, long, default_value = "test_results.csv")]
        output: PathBuf,

        /// Table layout
        #[arg(short, long, default_value = "date-header")]
        layout: TableLayout,

        /// Number of concurrent extraction requests
        #[arg(short = 'j', long, default_value = "4")]
        concurrency: usize,

        /// Also write each document's entity dump next to the output
        #[arg(long, default_value = "false")]
        keep_dumps: bool,
    },

    /// Start the review web server
    Serve {
        /// Address to bind, overriding server.bind
        #[arg(long)]
        bind: Option<String>,

        /// Extraction backend (documentai, local)
        #[arg(short, long, env = "LABEXTRACT_BACKEND")]
        backend: Option<Backend>,

        /// Table layout
        #[arg(short, long, default_value = "date-header")]
        layout: TableLayout,

        /// Number of concurrent extraction requests for batch uploads
        #[arg(short = 'j', long, default_value = "4")]
        concurrency: usize,
    },

    /// Process every PDF in a Google Drive folder
    Drive {
        /// Drive folder holding the reports (defaults to drive.input_folder_id)
        #[arg(long)]
        folder: Option<String>,

        /// Drive folder receiving the CSVs (defaults to drive.output_folder_id)
        #[arg(long)]
        output_folder: Option<String>,

        /// Extraction backend (documentai, local)
        #[arg(short, long, env = "LABEXTRACT_BACKEND")]
        backend: Option<Backend>,

        /// Table layout
        #[arg(short, long, default_value = "date-header")]
        layout: TableLayout,

        /// Also upload each entity dump
        #[arg(long, default_value = "false")]
        upload_dumps: bool,
    },

    /// OCR every patient folder under BASE into <folder>/<folder>_compiled.txt
    OcrBatch {
        /// Directory with one sub-folder per patient
        #[arg(required = true)]
        base: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Backend {
    /// Google Document AI custom extractor
    #[default]
    #[value(name = "documentai")]
    DocumentAi,
    /// PDF text layer with tesseract OCR fallback
    Local,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::DocumentAi => write!(f, "documentai"),
            Backend::Local => write!(f, "local"),
        }
    }
}

/// Load the explicit config file, the user config, or built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load_from(path);
    }

    let default_path = Config::config_path()?;
    if default_path.exists() {
        Config::load().context("Failed to load configuration")
    } else {
        warn!(
            "No configuration at {}, using defaults. Run 'labextract init' to create one.",
            default_path.display()
        );
        Ok(Config::default())
    }
}
