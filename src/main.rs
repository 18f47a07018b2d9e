mod cli;
mod config;
mod document;
mod drive;
mod error;
mod export;
mod extract;
mod pipeline;
mod records;
mod server;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::commands::drive::DriveOptions;
use crate::cli::commands::process::ProcessOptions;
use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Only warnings by default, RUST_LOG=info for more detail
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            cli::commands::init::run(cli.config.clone(), force).await?;
        }
        Commands::Extract {
            path,
            backend,
            output,
        } => {
            cli::commands::extract::run(config, path, backend, output).await?;
        }
        Commands::Parse {
            dump,
            output,
            layout,
        } => {
            cli::commands::parse::run(dump, output, layout).await?;
        }
        Commands::Process {
            path,
            backend,
            output,
            layout,
            concurrency,
            keep_dumps,
        } => {
            let options = ProcessOptions {
                backend,
                output,
                layout,
                concurrency,
                keep_dumps,
            };
            cli::commands::process::run(config, path, options).await?;
        }
        Commands::Serve {
            bind,
            backend,
            layout,
            concurrency,
        } => {
            cli::commands::serve::run(config, bind, backend, layout, concurrency).await?;
        }
        Commands::Drive {
            folder,
            output_folder,
            backend,
            layout,
            upload_dumps,
        } => {
            let options = DriveOptions {
                folder,
                output_folder,
                backend,
                layout,
                upload_dumps,
            };
            cli::commands::drive::run(config, options).await?;
        }
        Commands::OcrBatch { base } => {
            cli::commands::ocr_batch::run(config, base).await?;
        }
    }

    Ok(())
}
