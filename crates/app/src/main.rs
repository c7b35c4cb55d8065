mod config;
mod metrics;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use classify::{CacheStore, ClassificationCache, JsonFileStore, OllamaClassifier};
use report::XlsxSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::metrics::Metrics;

/// Classify JSON Schema properties for personal data and write a highlighted report.
#[derive(Parser, Debug)]
#[command(name = "schema-pii-report", version)]
struct Cli {
    /// Directory holding the `.json` documents
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Report file (defaults to Analysis_Report_<model>.xlsx)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Classification cache file
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    ollama_url: Option<String>,

    /// Delete the cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Also read documents in subdirectories
    #[arg(long)]
    recursive: bool,

    /// Classify properties that have no description
    #[arg(long)]
    include_undescribed: bool,

    /// Classification requests in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.input_dir {
            config.input.dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.report.output = Some(output.clone());
        }
        if let Some(cache_file) = &self.cache_file {
            config.cache.path = cache_file.clone();
        }
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama.base_url = url.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.pacing.max_concurrent_llm_calls = concurrency;
        }
        config.input.recursive |= self.recursive;
        config.input.include_undescribed |= self.include_undescribed;
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);

    let store = JsonFileStore::new(&config.cache.path);
    if cli.clear_cache {
        store.clear()?;
    }
    let mut cache = ClassificationCache::load(store);

    let classifier = OllamaClassifier::new(config.ollama_settings(), config.retry_policy())?;
    let output = config.output_path();
    info!(
        model = classifier.model(),
        input = %config.input.dir.display(),
        output = %output.display(),
        cached = cache.len(),
        "Starting analysis"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight requests");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let metrics = Metrics::new();
    let mut sink = XlsxSink::new(&output);
    let outcome = pipeline::run(&config, &classifier, &mut cache, &mut sink, stop, &metrics).await?;

    let snapshot = metrics.snapshot();
    info!(
        documents = snapshot.documents,
        failed_documents = snapshot.failed_documents,
        descriptors = snapshot.descriptors,
        rows = snapshot.rows,
        cached = snapshot.cached,
        classified = snapshot.classified,
        errors = snapshot.classification_errors,
        sheets = snapshot.sheets,
        ingest_ms = snapshot.ingest_time_ms,
        classify_ms = snapshot.classify_time_ms,
        report_ms = snapshot.report_time_ms,
        avg_classify_ms = snapshot.avg_classify_time_ms,
        "Run metrics"
    );

    if outcome.classification.cancelled {
        warn!("Run was interrupted; the report covers what was classified");
    }
    info!(
        report = %sink.path().display(),
        summary_rows = outcome.report.summary_rows,
        skipped_sheets = outcome.report.skipped_sheets,
        "Done"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "schema-pii-report",
            "--model",
            "llama3:8b",
            "--concurrency",
            "3",
            "--recursive",
            "--input-dir",
            "schemas",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ollama.model, "llama3:8b");
        assert_eq!(config.pacing.max_concurrent_llm_calls, 3);
        assert!(config.input.recursive);
        assert!(!config.input.include_undescribed);
        assert_eq!(config.input.dir, PathBuf::from("schemas"));
        assert_eq!(config.output_path(), PathBuf::from("Analysis_Report_llama3_8b.xlsx"));
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["schema-pii-report"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.cache.path, PathBuf::from("ollama_analysis_cache.json"));
        assert!(!cli.clear_cache);
    }
}
