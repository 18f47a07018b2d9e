use anyhow::Result;
use console::{Emoji, style};
use std::path::Path;
use tracing::warn;

use crate::cli::{Backend, load_config};
use crate::export::TableLayout;
use crate::extract::{self, Extractor};
use crate::server::{self, AppState};

static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub async fn run(
    config_path: Option<&Path>,
    bind: Option<String>,
    backend: Option<Backend>,
    layout: TableLayout,
    concurrency: usize,
) -> Result<()> {
    let config = load_config(config_path)?;
    let backend = extract::resolve_backend(backend, &config)?;
    let extractor = Extractor::new(backend, &config)?;

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let max_upload_bytes = config.server.max_upload_mb.saturating_mul(1024 * 1024);

    let mut state = AppState::new(extractor, &config.server, layout);
    state.concurrency = concurrency.max(1);

    println!();
    println!("{}", style(" labextract - Review Server ").bold().reverse());
    println!();
    println!("{}Backend: {}", BRAIN, style(backend).cyan().bold());
    if config.server.password.is_empty() {
        warn!("server.password is empty; any password will be accepted");
        println!(
            "{}No password configured, {} to protect the server",
            WARN,
            style("set LABEXTRACT_PASSWORD").yellow()
        );
    }
    println!(
        "{}Open {} in a browser (Ctrl-C to stop)",
        ROCKET,
        style(format!("http://{}", bind)).cyan().bold()
    );
    println!();

    server::serve(&bind, state, max_upload_bytes).await
}
