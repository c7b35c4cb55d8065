use extract::PathKey;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, ClassificationCache};
use crate::{ClassificationRequest, Classifier, description_digest};

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Delay before every classification call.
    pub pacing: Duration,
    /// Save the cache after this many new results.
    pub checkpoint_every: usize,
    /// Pause for `cooldown` after this many new results (0 disables).
    pub cooldown_every: usize,
    pub cooldown: Duration,
    pub max_concurrent: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(200),
            checkpoint_every: 5,
            cooldown_every: 10,
            cooldown: Duration::from_secs(1),
            max_concurrent: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub cached: usize,
    /// Cached entries whose description changed since they were classified.
    pub stale: usize,
    pub classified: usize,
    pub errors: usize,
    pub cancelled: bool,
}

/// Classifies every descriptor missing from the cache, one writer for the cache.
pub struct ClassificationRunner<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    settings: RunnerSettings,
    stop: Arc<AtomicBool>,
}

impl<'a, C: Classifier + ?Sized> ClassificationRunner<'a, C> {
    pub fn new(classifier: &'a C, settings: RunnerSettings) -> Self {
        Self {
            classifier,
            settings,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a stop flag owned elsewhere, e.g. by a signal handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Setting the flag stops new requests; in-flight ones finish.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub async fn run<S: CacheStore>(
        &self,
        descriptors: &BTreeMap<PathKey, String>,
        cache: &mut ClassificationCache<S>,
    ) -> RunSummary {
        let mut summary = RunSummary {
            candidates: descriptors.len(),
            ..RunSummary::default()
        };

        let mut pending = Vec::new();
        for (key, description) in descriptors {
            match cache.get(key) {
                Some(cached) => {
                    summary.cached += 1;
                    let current = description_digest(description);
                    if cached.description_digest.as_ref().is_some_and(|d| *d != current) {
                        summary.stale += 1;
                        debug!(key = %key, "Cached classification predates a description change");
                    }
                }
                None => pending.push((key, description)),
            }
        }

        if summary.stale > 0 {
            warn!(stale = summary.stale, "Using cached classifications for changed descriptions");
        }

        info!(
            candidates = summary.candidates,
            cached = summary.cached,
            new = pending.len(),
            "Starting classification"
        );

        if pending.is_empty() {
            return summary;
        }

        let total = pending.len();
        let classifier = self.classifier;
        let pacing = self.settings.pacing;

        let mut results = stream::iter(pending)
            .map(|(key, description)| {
                let stop = self.stop.clone();
                async move {
                    if stop.load(Ordering::SeqCst) {
                        return None;
                    }
                    if !pacing.is_zero() {
                        sleep(pacing).await;
                        if stop.load(Ordering::SeqCst) {
                            return None;
                        }
                    }
                    let request = ClassificationRequest::from_descriptor(key, description);
                    Some((key.clone(), classifier.classify(&request).await))
                }
            })
            .buffered(self.settings.max_concurrent.max(1));

        while let Some(outcome) = results.next().await {
            let Some((key, result)) = outcome else {
                summary.cancelled = true;
                continue;
            };

            if result.label.is_error() {
                summary.errors += 1;
            }
            info!(
                key = %key,
                label = %result.label,
                progress = %format!("{}/{}", summary.classified + 1, total),
                "Classified property"
            );
            cache.insert(key, result);
            summary.classified += 1;

            if self.settings.checkpoint_every > 0
                && summary.classified % self.settings.checkpoint_every == 0
            {
                debug!(entries = cache.len(), "Checkpointing classification cache");
                if let Err(e) = cache.checkpoint() {
                    warn!(error = %e, "Cache checkpoint failed");
                }
            }

            if self.settings.cooldown_every > 0
                && summary.classified % self.settings.cooldown_every == 0
                && !self.settings.cooldown.is_zero()
            {
                sleep(self.settings.cooldown).await;
            }
        }

        if let Err(e) = cache.checkpoint() {
            warn!(error = %e, "Final cache save failed");
        }

        if summary.cancelled {
            warn!(
                classified = summary.classified,
                skipped = total - summary.classified,
                "Classification stopped early"
            );
        }

        info!(
            classified = summary.classified,
            errors = summary.errors,
            cache_entries = cache.len(),
            "Classification finished"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::label::{ClassificationResult, ErrorKind, SensitivityLabel};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Answers from the description; "fail" yields a timeout error.
    struct StubClassifier {
        calls: AtomicUsize,
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl StubClassifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                stop_after: None,
            }
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, stop)) = &self.stop_after {
                if n >= *limit {
                    stop.store(true, Ordering::SeqCst);
                }
            }
            let result = if request.description == "fail" {
                ClassificationResult::error(ErrorKind::Timeout, "timed out")
            } else {
                ClassificationResult::new(SensitivityLabel::PersonalDataHighSensitivity, "stub")
            };
            result.with_digest(description_digest(&request.description))
        }
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            pacing: Duration::ZERO,
            checkpoint_every: 2,
            cooldown_every: 0,
            cooldown: Duration::ZERO,
            max_concurrent: 1,
        }
    }

    fn descriptors(n: usize) -> BTreeMap<PathKey, String> {
        (0..n)
            .map(|i| {
                (
                    PathKey::new("doc.json", ["properties".to_string(), format!("f{}", i)]),
                    format!("field {}", i),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_classifies_and_checkpoints() {
        let classifier = StubClassifier::new();
        let store = MemoryStore::new();
        let mut cache = ClassificationCache::load(store.clone());

        let summary = ClassificationRunner::new(&classifier, settings())
            .run(&descriptors(5), &mut cache)
            .await;

        assert_eq!(summary.classified, 5);
        assert_eq!(summary.errors, 0);
        assert!(!summary.cancelled);
        assert_eq!(cache.len(), 5);
        // checkpoints after 2 and 4, final save after 5
        assert_eq!(store.save_count(), 3);
        assert_eq!(store.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn test_skips_cached_and_counts_stale() {
        let classifier = StubClassifier::new();
        let descriptors = descriptors(3);

        let mut seeded = BTreeMap::new();
        let mut keys = descriptors.keys();
        let fresh = keys.next().unwrap().clone();
        let changed = keys.next().unwrap().clone();
        seeded.insert(
            fresh.clone(),
            ClassificationResult::new(SensitivityLabel::NotPersonalData, "cached")
                .with_digest(description_digest(&descriptors[&fresh])),
        );
        seeded.insert(
            changed.clone(),
            ClassificationResult::new(SensitivityLabel::NotPersonalData, "cached")
                .with_digest(description_digest("old text")),
        );

        let store = MemoryStore::with_entries(seeded);
        let mut cache = ClassificationCache::load(store);
        let summary = ClassificationRunner::new(&classifier, settings())
            .run(&descriptors, &mut cache)
            .await;

        assert_eq!(summary.cached, 2);
        assert_eq!(summary.stale, 1);
        assert_eq!(summary.classified, 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        // stale entries are kept as they were
        assert_eq!(
            cache.get(&changed).unwrap().label,
            SensitivityLabel::NotPersonalData
        );
    }

    #[tokio::test]
    async fn test_errors_are_cached() {
        let classifier = StubClassifier::new();
        let mut descriptors = descriptors(1);
        let key = PathKey::new("doc.json", ["properties", "broken"]);
        descriptors.insert(key.clone(), "fail".to_string());

        let mut cache = ClassificationCache::load(MemoryStore::new());
        let summary = ClassificationRunner::new(&classifier, settings())
            .run(&descriptors, &mut cache)
            .await;

        assert_eq!(summary.errors, 1);
        assert_eq!(
            cache.get(&key).unwrap().label,
            SensitivityLabel::Error(ErrorKind::Timeout)
        );

        // a second run does not retry the failure
        let again = ClassificationRunner::new(&classifier, settings())
            .run(&descriptors, &mut cache)
            .await;
        assert_eq!(again.classified, 0);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_flag_halts_new_requests() {
        let mut classifier = StubClassifier::new();
        let runner_stop = Arc::new(AtomicBool::new(false));
        classifier.stop_after = Some((2, runner_stop.clone()));

        let runner = ClassificationRunner::new(&classifier, settings()).with_stop_flag(runner_stop);

        let store = MemoryStore::new();
        let mut cache = ClassificationCache::load(store.clone());
        let summary = runner.run(&descriptors(5), &mut cache).await;

        assert!(summary.cancelled);
        assert_eq!(summary.classified, 2);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_during_pacing_sends_nothing() {
        let classifier = StubClassifier::new();
        let runner = ClassificationRunner::new(
            &classifier,
            RunnerSettings {
                pacing: Duration::from_millis(200),
                ..settings()
            },
        );
        let stop = runner.stop_handle();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            stop.store(true, Ordering::SeqCst);
        });

        let mut cache = ClassificationCache::load(MemoryStore::new());
        let summary = runner.run(&descriptors(3), &mut cache).await;

        assert!(summary.cancelled);
        assert_eq!(summary.classified, 0);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_keeps_every_result() {
        let classifier = StubClassifier::new();
        let mut cache = ClassificationCache::load(MemoryStore::new());
        let settings = RunnerSettings {
            max_concurrent: 4,
            ..settings()
        };

        let summary = ClassificationRunner::new(&classifier, settings)
            .run(&descriptors(9), &mut cache)
            .await;

        assert_eq!(summary.classified, 9);
        assert_eq!(cache.len(), 9);
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let classifier = StubClassifier::new();
        let store = MemoryStore::new();
        let mut cache = ClassificationCache::load(store.clone());

        let summary = ClassificationRunner::new(&classifier, settings())
            .run(&BTreeMap::new(), &mut cache)
            .await;

        assert_eq!(summary, RunSummary::default());
        assert_eq!(store.save_count(), 0);
    }
}
