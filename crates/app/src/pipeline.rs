use anyhow::Result;
use classify::{CacheStore, ClassificationCache, ClassificationRunner, Classifier, RunSummary};
use extract::{DescriptorExtractor, ExtractOptions, PathKey};
use ingest::{ReaderOptions, ingest_directory};
use report::{PreparedDocument, ReportStats, SheetSink, generate_report};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::metrics::{Metrics, TimedOperation};

/// Documents and descriptors gathered before classification.
pub struct Prepared {
    pub documents: Vec<PreparedDocument>,
    pub descriptors: BTreeMap<PathKey, String>,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub classification: RunSummary,
    pub report: ReportStats,
}

/// Read the input directory, extract descriptors and flatten every document.
pub async fn prepare(config: &AppConfig, metrics: &Metrics) -> Result<Prepared> {
    let timer = TimedOperation::start();

    let documents = ingest_directory(
        &config.input.dir,
        ReaderOptions {
            recursive: config.input.recursive,
        },
    )
    .await?;

    let extractor = DescriptorExtractor::new(ExtractOptions {
        include_undescribed: config.input.include_undescribed,
    });

    let mut descriptors = BTreeMap::new();
    let mut prepared = Vec::with_capacity(documents.len());
    let mut failed = 0;

    for document in &documents {
        match document.value() {
            Some(value) => {
                let found = extractor.extract(value, &document.id);
                info!(document = %document.id, descriptors = found.len(), "Extracted descriptors");
                descriptors.extend(found);
            }
            None => {
                failed += 1;
                warn!(
                    document = %document.id,
                    error = document.error().unwrap_or_default(),
                    "Skipping unreadable document"
                );
            }
        }
        prepared.push(PreparedDocument::from_document(document));
    }

    let rows = prepared.iter().map(PreparedDocument::row_count).sum();
    metrics.record_ingest(timer.elapsed(), documents.len(), failed, descriptors.len(), rows);

    Ok(Prepared {
        documents: prepared,
        descriptors,
    })
}

/// Run all three phases: prepare, classify, report.
pub async fn run<C, S, K>(
    config: &AppConfig,
    classifier: &C,
    cache: &mut ClassificationCache<S>,
    sink: &mut K,
    stop: Arc<AtomicBool>,
    metrics: &Metrics,
) -> Result<PipelineOutcome>
where
    C: Classifier + ?Sized,
    S: CacheStore,
    K: SheetSink + ?Sized,
{
    let prepared = prepare(config, metrics).await?;

    let timer = TimedOperation::start();
    let classification = ClassificationRunner::new(classifier, config.runner_settings())
        .with_stop_flag(stop)
        .run(&prepared.descriptors, cache)
        .await;
    metrics.record_classify(timer.elapsed(), &classification);

    let timer = TimedOperation::start();
    let report = generate_report(
        &prepared.documents,
        &prepared.descriptors,
        cache.entries(),
        sink,
    )?;
    let sheets = report.document_sheets + report.error_sheets + 1 - report.skipped_sheets;
    metrics.record_report(timer.elapsed(), sheets);

    Ok(PipelineOutcome {
        classification,
        report,
    })
}
