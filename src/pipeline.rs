use std::sync::Arc;

use anyhow::Result;
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::document::SourceDocument;
use crate::error::PipelineError;
use crate::export::{self, Table, TableLayout};
use crate::extract::Extractor;
use crate::records::{self, LabReport};

/// One document taken all the way from bytes to table.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub name: String,
    /// Output file stem, e.g. `M122 CBC` for `bundle.zip/M122 CBC.pdf`.
    pub stem: String,
    pub dump: String,
    pub report: LabReport,
    pub table: Table,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successful documents, in input order.
    pub processed: Vec<ProcessedDocument>,
    /// Documents that failed, with the reason.
    pub failures: Vec<(String, PipelineError)>,
}

impl BatchOutcome {
    pub fn merged_table(&self) -> Table {
        export::merge(self.processed.iter().map(|p| &p.table))
    }
}

/// Extract, parse and render a single document.
pub async fn process_document(
    extractor: &Extractor,
    doc: &SourceDocument,
    layout: TableLayout,
) -> Result<ProcessedDocument, PipelineError> {
    let extracted = extractor.extract(doc).await?;
    let dump = extracted.to_dump();
    let report = records::parse_dump(&extracted.parse_input());
    debug!(
        "{}: {} records, date '{}'",
        doc.name,
        report.records.len(),
        report.date
    );
    let table = Table::from_report(&report, layout);

    Ok(ProcessedDocument {
        name: doc.name.clone(),
        stem: doc.stem(),
        dump,
        report,
        table,
    })
}

/// Process documents with at most `concurrency` extractions in flight.
///
/// A failed document is logged and reported in the outcome; it never stops
/// the rest of the batch.
pub async fn process_batch(
    extractor: Arc<Extractor>,
    documents: Vec<SourceDocument>,
    layout: TableLayout,
    concurrency: usize,
    progress: Option<ProgressBar>,
) -> Result<BatchOutcome> {
    info!(
        "Processing {} documents with {} ({} concurrent)",
        documents.len(),
        extractor.backend_name(),
        concurrency
    );

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(documents.len());

    for doc in documents {
        let permit = semaphore.clone().acquire_owned().await?;
        let extractor = extractor.clone();
        let progress = progress.clone();

        let name = doc.name.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            let result = process_document(&extractor, &doc, layout).await;
            if let Some(pb) = &progress {
                pb.set_message(doc.name.clone());
                pb.inc(1);
            }
            result
        });

        tasks.push((name, task));
    }

    let mut outcome = BatchOutcome::default();
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(processed)) => outcome.processed.push(processed),
            Ok(Err(e)) => {
                warn!("Failed to process {}: {}", name, e);
                outcome.failures.push((name, e));
            }
            Err(e) => {
                warn!("Task for {} panicked: {}", name, e);
                outcome
                    .failures
                    .push((name, PipelineError::extraction(format!("task panicked: {}", e))));
            }
        }
    }

    Ok(outcome)
}
