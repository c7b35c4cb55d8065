use classify::RunSummary;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counts
    documents: AtomicUsize,
    failed_documents: AtomicUsize,
    descriptors: AtomicUsize,
    rows: AtomicUsize,
    cached: AtomicUsize,
    classified: AtomicUsize,
    classification_errors: AtomicUsize,
    sheets: AtomicUsize,

    // Timing (in microseconds)
    ingest_time_us: AtomicU64,
    classify_time_us: AtomicU64,
    report_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            documents: AtomicUsize::new(0),
            failed_documents: AtomicUsize::new(0),
            descriptors: AtomicUsize::new(0),
            rows: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
            classified: AtomicUsize::new(0),
            classification_errors: AtomicUsize::new(0),
            sheets: AtomicUsize::new(0),
            ingest_time_us: AtomicU64::new(0),
            classify_time_us: AtomicU64::new(0),
            report_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_ingest(&self, duration: Duration, documents: usize, failed: usize, descriptors: usize, rows: usize) {
        self.ingest_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents.fetch_add(documents, Ordering::Relaxed);
        self.failed_documents.fetch_add(failed, Ordering::Relaxed);
        self.descriptors.fetch_add(descriptors, Ordering::Relaxed);
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_classify(&self, duration: Duration, summary: &RunSummary) {
        self.classify_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.cached.fetch_add(summary.cached, Ordering::Relaxed);
        self.classified.fetch_add(summary.classified, Ordering::Relaxed);
        self.classification_errors.fetch_add(summary.errors, Ordering::Relaxed);
    }

    pub fn record_report(&self, duration: Duration, sheets: usize) {
        self.report_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.sheets.fetch_add(sheets, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents: self.documents.load(Ordering::Relaxed),
            failed_documents: self.failed_documents.load(Ordering::Relaxed),
            descriptors: self.descriptors.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            classified: self.classified.load(Ordering::Relaxed),
            classification_errors: self.classification_errors.load(Ordering::Relaxed),
            sheets: self.sheets.load(Ordering::Relaxed),
            ingest_time_ms: Self::millis(&self.ingest_time_us),
            classify_time_ms: Self::millis(&self.classify_time_us),
            report_time_ms: Self::millis(&self.report_time_us),
            avg_classify_time_ms: self.avg_time_ms(&self.classify_time_us, &self.classified),
        }
    }

    fn millis(total_us: &AtomicU64) -> f64 {
        total_us.load(Ordering::Relaxed) as f64 / 1000.0
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub documents: usize,
    pub failed_documents: usize,
    pub descriptors: usize,
    pub rows: usize,
    pub cached: usize,
    pub classified: usize,
    pub classification_errors: usize,
    pub sheets: usize,
    pub ingest_time_ms: f64,
    pub classify_time_ms: f64,
    pub report_time_ms: f64,
    pub avg_classify_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
