//! Batch orchestrator: runs the item pipeline over a submission with bounded
//! parallelism and assembles the [`BatchReport`].
//!
//! # Scheduling
//!
//! - `max_parallel` workers pull item indices from one shared queue
//! - each item is validated on the blocking pool, under the optional per-item timeout
//! - workers send `(index, ItemResult)` to a single aggregator (the calling task),
//!   which owns every running counter and places results by index

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::aggregator::{Progress, SummaryAccumulator};
use super::analysis::{self, CoverageStats};
use super::cancel::CancellationSignal;
use super::config::BatchConfig;
use super::input::Submission;
use super::report::{BatchReport, PerformanceMetrics};
use crate::validation::{IssueCode, ItemPipeline, ItemResult, ItemValidator};

/// Certifies whole submissions.
pub struct BatchOrchestrator {
    config: BatchConfig,
    validator: Arc<dyn ItemValidator>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator running the standard item pipeline.
    pub fn new(config: BatchConfig) -> Self {
        let validator = Arc::new(ItemPipeline::new(config.curriculum_index.clone()));
        Self { config, validator }
    }

    /// Replaces the per-item validator.
    pub fn with_validator(mut self, validator: Arc<dyn ItemValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Handle for cancelling batches run by this orchestrator.
    pub fn cancellation(&self) -> CancellationSignal {
        self.config.cancellation.clone()
    }

    /// Validates a raw submission: a bare item array or a document with an
    /// `items` array.
    ///
    /// Never fails. Input of any other shape yields an empty report with a
    /// CRITICAL `INVALID_FORMAT` global issue.
    pub async fn validate_submission(&self, input: Value) -> BatchReport {
        match Submission::from_value(input) {
            Ok(submission) => self.validate(submission).await,
            Err(err) => {
                warn!(
                    session_id = %self.config.session_id,
                    error = %err,
                    "Rejected malformed submission"
                );
                BatchReport::empty(
                    self.config.session_id.clone(),
                    vec![analysis::invalid_format(&err)],
                )
            }
        }
    }

    /// Validates a list of items.
    pub async fn validate_items(&self, items: Vec<Value>) -> BatchReport {
        self.validate(Submission::new(items)).await
    }

    /// Validates a normalised submission.
    pub async fn validate(&self, submission: Submission) -> BatchReport {
        let started = Instant::now();
        let Submission { items, manifest } = submission;
        let total = items.len();

        if total == 0 {
            info!(session_id = %self.config.session_id, "Submission has no items");
            let mut global_issues = vec![analysis::no_questions()];
            global_issues.extend(analysis::item_count_mismatch(manifest.as_ref(), 0));
            let mut report = BatchReport::empty(self.config.session_id.clone(), global_issues);
            report.manifest = manifest;
            return report;
        }

        let num_workers = self.config.max_parallel.clamp(1, total);
        info!(
            session_id = %self.config.session_id,
            total_items = total,
            workers = num_workers,
            "Starting batch validation"
        );

        let items = Arc::new(items);
        let (mut slots, mut accumulator) = self.run_workers(&items, num_workers).await;

        // Only reachable if a worker task itself died.
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let result = ItemResult::validation_error(
                    &items[index],
                    index,
                    "Worker stopped before validating this item",
                );
                accumulator.record(index, &result);
                *slot = Some(result);
            }
        }
        let item_results: Vec<ItemResult> = slots.into_iter().flatten().collect();

        let cancelled = item_results
            .iter()
            .filter(|r| r.primary_error_code() == Some(IssueCode::ValidationCancelled))
            .count();
        let coverage = CoverageStats::from_items(&items);
        let (summary, occurrences) = accumulator.finish();

        let mut global_issues = Vec::new();
        if self.config.check_for_duplicates {
            global_issues.extend(analysis::duplicate_ids(&occurrences));
        }
        global_issues.extend(analysis::item_count_mismatch(manifest.as_ref(), total));
        global_issues.extend(analysis::coverage_gaps(
            &coverage,
            self.config.curriculum_index.as_deref(),
        ));
        if cancelled > 0 {
            warn!(
                session_id = %self.config.session_id,
                cancelled,
                "Batch cancelled before all items were validated"
            );
            global_issues.push(analysis::batch_cancelled(cancelled, total));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id = %self.config.session_id,
            total_items = total,
            valid = summary.valid_items,
            invalid = summary.invalid_items,
            global_issues = global_issues.len(),
            elapsed_ms,
            "Batch validation complete"
        );

        BatchReport {
            session_id: self.config.session_id.clone(),
            generated_at: chrono::Utc::now(),
            total_items: total,
            summary,
            item_results,
            global_issues,
            coverage,
            performance_metrics: PerformanceMetrics::new(elapsed_ms, total),
            manifest,
        }
    }

    /// Spawns the workers and aggregates their results until all are done.
    async fn run_workers(
        &self,
        items: &Arc<Vec<Value>>,
        num_workers: usize,
    ) -> (Vec<Option<ItemResult>>, SummaryAccumulator) {
        let total = items.len();

        let (job_tx, job_rx) = mpsc::unbounded_channel::<usize>();
        for index in 0..total {
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);
        let jobs = Arc::new(Mutex::new(job_rx));

        let (result_tx, mut result_rx) = mpsc::channel::<(usize, ItemResult)>(num_workers * 2);
        let mut handles = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let worker = Worker {
                id: format!("worker-{}", i),
                jobs: Arc::clone(&jobs),
                items: Arc::clone(items),
                validator: Arc::clone(&self.validator),
                results: result_tx.clone(),
                item_timeout: self.config.item_timeout,
                cancellation: self.config.cancellation.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(result_tx);

        let mut slots: Vec<Option<ItemResult>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut accumulator = SummaryAccumulator::new();

        while let Some((index, result)) = result_rx.recv().await {
            accumulator.record(index, &result);
            slots[index] = Some(result);

            let progress = Progress::new(accumulator.completed(), total);
            debug!(
                completed = progress.completed,
                total = progress.total,
                "Item completed"
            );
            if let Some(callback) = &self.config.progress_callback {
                callback(progress);
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        (slots, accumulator)
    }
}

/// One pool worker.
struct Worker {
    id: String,
    jobs: Arc<Mutex<mpsc::UnboundedReceiver<usize>>>,
    items: Arc<Vec<Value>>,
    validator: Arc<dyn ItemValidator>,
    results: mpsc::Sender<(usize, ItemResult)>,
    item_timeout: Option<Duration>,
    cancellation: CancellationSignal,
}

impl Worker {
    async fn run(self) {
        let mut processed = 0usize;
        loop {
            let next = self.jobs.lock().await.recv().await;
            let Some(index) = next else {
                break;
            };

            let result = if self.cancellation.is_cancelled() {
                ItemResult::validation_cancelled(&self.items[index], index)
            } else {
                self.validate(index).await
            };
            processed += 1;

            if self.results.send((index, result)).await.is_err() {
                warn!(worker = %self.id, "Aggregator closed; stopping worker");
                break;
            }
        }
        debug!(worker = %self.id, processed, "Worker finished");
    }

    /// Runs one item on the blocking pool. On timeout the blocking task is
    /// detached, not stopped; it keeps its thread until the validator returns.
    async fn validate(&self, index: usize) -> ItemResult {
        let validator = Arc::clone(&self.validator);
        let items = Arc::clone(&self.items);
        let task = tokio::task::spawn_blocking(move || validator.validate(&items[index]));

        let joined = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        worker = %self.id,
                        index,
                        timeout_ms = limit.as_millis() as u64,
                        "Item validation timed out"
                    );
                    return ItemResult::validation_timeout(
                        &self.items[index],
                        index,
                        limit.as_millis(),
                    );
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(mut result)) => {
                result.fill_missing_id(index);
                result
            }
            Ok(Err(e)) => {
                warn!(worker = %self.id, index, error = %e, "Item validation failed");
                ItemResult::validation_error(&self.items[index], index, e.to_string())
            }
            Err(e) => {
                error!(worker = %self.id, index, error = %e, "Item validation panicked");
                ItemResult::validation_error(&self.items[index], index, panic_message(e))
            }
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("Validation task failed: {}", err);
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Validator panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemError;
    use crate::validation::Severity;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn numeric_item(id: &str) -> Value {
        json!({
            "item_id": id,
            "template_id": "numeric_input",
            "prompt": "2 + 2",
            "answer_key": {"value": 4, "tolerance": 0}
        })
    }

    fn orchestrator(config: BatchConfig) -> BatchOrchestrator {
        BatchOrchestrator::new(config)
    }

    /// Delays each item by a per-item amount before delegating to the pipeline.
    struct DelayedValidator {
        inner: ItemPipeline,
    }

    impl ItemValidator for DelayedValidator {
        fn validate(&self, item: &Value) -> Result<ItemResult, ItemError> {
            let delay = item.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
            std::thread::sleep(Duration::from_millis(delay));
            self.inner.validate(item)
        }
    }

    /// Misbehaves on marked items.
    struct FaultyValidator {
        inner: ItemPipeline,
    }

    impl ItemValidator for FaultyValidator {
        fn validate(&self, item: &Value) -> Result<ItemResult, ItemError> {
            match item.get("fault").and_then(Value::as_str) {
                Some("panic") => panic!("rule indexed into a null payload"),
                Some("error") => Err(ItemError::Internal("rule table missing".into())),
                Some("slow") => {
                    std::thread::sleep(Duration::from_millis(300));
                    self.inner.validate(item)
                }
                _ => self.inner.validate(item),
            }
        }
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let items: Vec<Value> = (0..12)
            .map(|i| {
                let mut item = numeric_item(&format!("q-{}", i));
                item["delay_ms"] = json!((12 - i) * 5);
                item
            })
            .collect();

        for max_parallel in [1, 3, 8] {
            let report = orchestrator(BatchConfig::new().with_max_parallel(max_parallel))
                .with_validator(Arc::new(DelayedValidator {
                    inner: ItemPipeline::new(None),
                }))
                .validate_items(items.clone())
                .await;

            assert_eq!(report.total_items, 12);
            for (i, result) in report.item_results.iter().enumerate() {
                assert_eq!(result.item_id, format!("q-{}", i), "parallel {}", max_parallel);
            }
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut items: Vec<Value> = (0..5).map(|i| numeric_item(&format!("q-{}", i))).collect();
        items[1]["fault"] = json!("panic");
        items[3]["fault"] = json!("error");

        let report = orchestrator(BatchConfig::new())
            .with_validator(Arc::new(FaultyValidator {
                inner: ItemPipeline::new(None),
            }))
            .validate_items(items)
            .await;

        assert_eq!(report.total_items, 5);
        assert_eq!(report.summary.valid_items, 3);
        assert_eq!(report.summary.invalid_items, 2);
        for index in [1, 3] {
            let result = &report.item_results[index];
            assert!(!result.is_valid);
            assert_eq!(result.item_id, format!("q-{}", index));
            assert_eq!(result.primary_error_code(), Some(IssueCode::ValidationError));
            assert_eq!(result.quality_score, 0.0);
        }
        assert!(report.item_results[1].errors[0].message.contains("null payload"));
        assert_eq!(report.summary.error_code_frequency["VALIDATION_ERROR"], 2);
    }

    #[tokio::test]
    async fn test_slow_item_times_out() {
        let mut items = vec![numeric_item("fast"), numeric_item("slow")];
        items[1]["fault"] = json!("slow");

        let report = orchestrator(
            BatchConfig::new().with_item_timeout(Some(Duration::from_millis(50))),
        )
        .with_validator(Arc::new(FaultyValidator {
            inner: ItemPipeline::new(None),
        }))
        .validate_items(items)
        .await;

        assert!(report.item_results[0].is_valid);
        let slow = &report.item_results[1];
        assert_eq!(slow.item_id, "slow");
        assert_eq!(slow.primary_error_code(), Some(IssueCode::ValidationTimeout));
    }

    #[test]
    fn test_background_shutdown_skips_stuck_validations() {
        struct Stuck;
        impl ItemValidator for Stuck {
            fn validate(&self, _item: &Value) -> Result<ItemResult, ItemError> {
                std::thread::sleep(Duration::from_secs(3));
                Err(ItemError::Internal("unreachable in time".into()))
            }
        }

        let started = Instant::now();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let report = runtime.block_on(
            orchestrator(BatchConfig::new().with_item_timeout(Some(Duration::from_millis(20))))
                .with_validator(Arc::new(Stuck))
                .validate_items(vec![numeric_item("stuck")]),
        );
        runtime.shutdown_background();

        assert_eq!(
            report.item_results[0].primary_error_code(),
            Some(IssueCode::ValidationTimeout)
        );
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let config = BatchConfig::new();
        config.cancellation.cancel();
        let report = orchestrator(config)
            .validate_items(vec![numeric_item("a"), numeric_item("b")])
            .await;

        assert_eq!(report.total_items, 2);
        assert!(report
            .item_results
            .iter()
            .all(|r| r.primary_error_code() == Some(IssueCode::ValidationCancelled)));
        let cancelled = report
            .global_issues
            .iter()
            .find(|g| g.issue.code == IssueCode::BatchCancelled)
            .unwrap();
        assert_eq!(cancelled.issue.severity, Severity::Warning);
        assert_eq!(cancelled.details["unprocessedItems"], 2);
    }

    #[tokio::test]
    async fn test_cancel_mid_batch() {
        let signal = CancellationSignal::new();
        let trigger = signal.clone();
        let config = BatchConfig::new()
            .with_max_parallel(1)
            .with_cancellation(signal)
            .with_progress_callback(move |_| trigger.cancel());

        let items: Vec<Value> = (0..6).map(|i| numeric_item(&format!("q-{}", i))).collect();
        let report = orchestrator(config).validate_items(items).await;

        assert_eq!(report.item_results.len(), 6);
        assert!(report.item_results[0].is_valid);
        assert!(report.item_results[5].primary_error_code() == Some(IssueCode::ValidationCancelled));
        assert!(report.has_global_issue(IssueCode::BatchCancelled));
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = BatchConfig::new()
            .with_progress_callback(move |p| sink.lock().unwrap().push(p));

        let items: Vec<Value> = (0..4).map(|i| numeric_item(&format!("q-{}", i))).collect();
        orchestrator(config).validate_items(items).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![1, 2, 3, 4]);
        assert_eq!(seen[3].percent_complete, 100.0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = orchestrator(BatchConfig::new())
            .validate_submission(json!([]))
            .await;

        assert_eq!(report.total_items, 0);
        assert!(report.item_results.is_empty());
        assert_eq!(report.global_issues.len(), 1);
        assert_eq!(
            report.global_issues[0].issue.code,
            IssueCode::NoQuestionsToValidate
        );
        assert_eq!(report.global_issues[0].issue.severity, Severity::Info);
        assert_eq!(report.summary.valid_items, 0);
        assert_eq!(report.summary.invalid_items, 0);
        assert_eq!(report.summary.with_warnings, 0);
    }

    #[tokio::test]
    async fn test_invalid_format() {
        let report = orchestrator(BatchConfig::new())
            .validate_submission(json!({"questions": []}))
            .await;

        assert_eq!(report.total_items, 0);
        assert_eq!(report.global_issues.len(), 1);
        assert_eq!(report.global_issues[0].issue.code, IssueCode::InvalidFormat);
        assert!(report.global_issues[0].issue.is_critical());
    }

    #[tokio::test]
    async fn test_duplicate_ids() {
        let items = json!([numeric_item("Q1"), numeric_item("Q2"), numeric_item("Q1")]);

        let report = orchestrator(BatchConfig::new())
            .validate_submission(items.clone())
            .await;
        let duplicates: Vec<_> = report
            .global_issues
            .iter()
            .filter(|g| g.issue.code == IssueCode::DuplicateItemIds)
            .collect();
        assert_eq!(duplicates.len(), 1);
        let listed = duplicates[0].details["duplicateIds"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["itemId"], "Q1");
        assert_eq!(listed[0]["count"], 2);
        assert_eq!(listed[0]["indices"], json!([0, 2]));

        let report = orchestrator(BatchConfig::new().with_duplicate_check(false))
            .validate_submission(items)
            .await;
        assert!(!report.has_global_issue(IssueCode::DuplicateItemIds));
    }

    #[tokio::test]
    async fn test_numeric_ids_are_kept_and_grouped() {
        let items: Vec<Value> = [7, 8, 7]
            .iter()
            .map(|id| {
                let mut item = numeric_item("placeholder");
                item["item_id"] = json!(id);
                item
            })
            .collect();
        let report = orchestrator(BatchConfig::new()).validate_items(items).await;

        let ids: Vec<&str> = report.item_results.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8", "7"]);
        assert!(report
            .item_results
            .iter()
            .all(|r| r.errors.iter().any(|e| e.code == IssueCode::InvalidFieldType)));

        let duplicates = report
            .global_issues
            .iter()
            .find(|g| g.issue.code == IssueCode::DuplicateItemIds)
            .unwrap();
        let listed = duplicates.details["duplicateIds"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["itemId"], "7");
        assert_eq!(listed[0]["indices"], json!([0, 2]));
    }

    #[tokio::test]
    async fn test_manifest_count_mismatch() {
        let report = orchestrator(BatchConfig::new().with_session_id("s-9"))
            .validate_submission(json!({
                "bank_id": "bank-1",
                "item_count": 3,
                "items": [numeric_item("a"), numeric_item("b")]
            }))
            .await;

        assert_eq!(report.session_id, "s-9");
        assert!(report.has_global_issue(IssueCode::ItemCountMismatch));
        assert_eq!(
            report.manifest.as_ref().and_then(|m| m.bank_id.as_deref()),
            Some("bank-1")
        );
    }

    #[tokio::test]
    async fn test_items_without_ids_get_positional_ids() {
        let report = orchestrator(BatchConfig::new())
            .validate_items(vec![json!({"template_id": "mcq"}), json!(null)])
            .await;
        assert_eq!(report.item_results[0].item_id, "item[0]");
        assert_eq!(report.item_results[1].item_id, "item[1]");
        assert_eq!(
            report.item_results[1].primary_error_code(),
            Some(IssueCode::ValidationError)
        );
        assert!(!report.has_global_issue(IssueCode::DuplicateItemIds));
    }
}
