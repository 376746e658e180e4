//! Batch labeling engine.
//!
//! Tasks are split into consecutive chunks of `batch_size`. Each chunk is
//! fanned out concurrently (fetch, then label) and awaited as a whole before
//! the next chunk starts, so at most `batch_size` requests are in flight.
//! Outcomes are written into a slot per input position, which keeps the
//! caller's ordering no matter which item finishes first.
//!
//! A failing item never aborts the batch: it becomes an error result with a
//! generic message while the real cause goes to the tracing log. Invalid
//! input rejects the whole call up front with a structured summary.

use crate::backend::{ApiKeys, BackendFactory, LabelRequest, VisionBackend};
use crate::config::{BatchConfig, Config};
use crate::error::{ConfigError, ItemError, ValidationError};
use crate::fetch::ImageFetcher;
use crate::response_log::ResponseSink;
use crate::types::{
    BackendKind, BatchSummary, ImageTask, Labeling, ProcessingResult, ResultEntry, GENERIC_ERROR,
};
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the batch processor.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Items dispatched concurrently per chunk
    pub batch_size: usize,
    /// Surface the underlying cause in `detailedError` (operator/debug use)
    pub expose_error_details: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            expose_error_details: false,
        }
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            expose_error_details: config.expose_error_details,
        }
    }
}

/// Reported after each chunk completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Zero-based index of the chunk that just finished
    pub chunk_index: usize,
    pub chunk_count: usize,
    /// Items completed so far, successes plus errors
    pub completed: usize,
    pub selected: usize,
    pub processed_count: usize,
    pub error_count: usize,
}

/// Labels lists of images with one backend.
pub struct BatchProcessor {
    backend: Arc<dyn VisionBackend>,
    fetcher: ImageFetcher,
    options: BatchOptions,
}

impl BatchProcessor {
    pub fn new(backend: Arc<dyn VisionBackend>, fetcher: ImageFetcher, options: BatchOptions) -> Self {
        Self {
            backend,
            fetcher,
            options,
        }
    }

    /// Build a processor for `kind` from the loaded configuration.
    pub fn from_config(
        config: &Config,
        keys: &ApiKeys,
        kind: BackendKind,
        model_override: Option<&str>,
        client: reqwest::Client,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self, ConfigError> {
        let backend =
            BackendFactory::create(kind, config, keys, model_override, client.clone(), sink)?;
        let fetcher = ImageFetcher::new(
            client,
            Duration::from_millis(config.limits.fetch_timeout_ms),
        );
        Ok(Self::new(backend, fetcher, BatchOptions::from(&config.batch)))
    }

    pub fn backend(&self) -> &Arc<dyn VisionBackend> {
        &self.backend
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Override the chunk size for one processor.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    /// Label `tasks` (or only the positions in `selection`) with `prompt`.
    ///
    /// Always resolves to a summary; see [`BatchSummary::error`] for calls
    /// rejected before dispatch.
    pub async fn process(
        &self,
        tasks: &[ImageTask],
        prompt: &str,
        selection: Option<&[usize]>,
    ) -> BatchSummary {
        self.process_with_progress(tasks, prompt, selection, |_| {})
            .await
    }

    /// Like [`process`](Self::process), calling `on_chunk` after every chunk.
    pub async fn process_with_progress<F>(
        &self,
        tasks: &[ImageTask],
        prompt: &str,
        selection: Option<&[usize]>,
        mut on_chunk: F,
    ) -> BatchSummary
    where
        F: FnMut(&ChunkProgress),
    {
        let kind = self.backend.kind();
        let selected = match self.select(tasks, prompt, selection) {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!("Rejected labeling request: {e}");
                return BatchSummary::rejected(kind, tasks, e.to_string());
            }
        };

        let batch_size = self.options.batch_size;
        let chunk_count = selected.len().div_ceil(batch_size);
        tracing::info!(
            "Labeling {} of {} images with {} ({}) in {chunk_count} chunk(s) of up to {batch_size}",
            selected.len(),
            tasks.len(),
            kind,
            self.backend.model()
        );

        let mut slots: Vec<Option<ProcessingResult>> = vec![None; tasks.len()];
        let mut summary = BatchSummary::empty(kind);
        let mut completed = 0;

        for (chunk_index, chunk) in selected.chunks(batch_size).enumerate() {
            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|&position| self.process_one(&tasks[position], prompt)),
            )
            .await;

            for (&position, result) in chunk.iter().zip(outcomes) {
                summary.record(&result);
                slots[position] = Some(result);
            }
            completed += chunk.len();

            tracing::debug!(
                "Chunk {}/{chunk_count} done: {} ok, {} failed so far",
                chunk_index + 1,
                summary.processed_count,
                summary.error_count
            );
            on_chunk(&ChunkProgress {
                chunk_index,
                chunk_count,
                completed,
                selected: selected.len(),
                processed_count: summary.processed_count,
                error_count: summary.error_count,
            });
        }

        summary.results = tasks
            .iter()
            .zip(slots)
            .map(|(task, slot)| match slot {
                Some(result) => ResultEntry::Processed(result),
                None => ResultEntry::Skipped(task.clone()),
            })
            .collect();

        tracing::info!(
            "Labeling finished: {} ok, {} failed, {} tokens",
            summary.processed_count,
            summary.error_count,
            summary.total_tokens
        );
        summary
    }

    /// Validate input and return the selected positions in order.
    fn select(
        &self,
        tasks: &[ImageTask],
        prompt: &str,
        selection: Option<&[usize]>,
    ) -> Result<Vec<usize>, ValidationError> {
        if prompt.trim().is_empty() {
            return Err(ValidationError::MissingPrompt);
        }
        if self.options.batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize);
        }
        let selected: Vec<usize> = match selection {
            None => (0..tasks.len()).collect(),
            Some(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= tasks.len()) {
                    return Err(ValidationError::SelectionOutOfRange {
                        index,
                        len: tasks.len(),
                    });
                }
                indices
                    .iter()
                    .copied()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
        };
        if selected.is_empty() {
            return Err(ValidationError::NoImages);
        }
        Ok(selected)
    }

    async fn process_one(&self, task: &ImageTask, prompt: &str) -> ProcessingResult {
        let kind = self.backend.kind();
        match self.label_one(task, prompt).await {
            Ok(labeling) => ProcessingResult::success(task, kind, labeling),
            Err(e) => {
                tracing::error!(
                    image = %task.image_ref.tag(),
                    index = task.original_index,
                    "Labeling failed: {e}"
                );
                let detail = if self.options.expose_error_details {
                    e.to_string()
                } else {
                    GENERIC_ERROR.to_string()
                };
                ProcessingResult::failure(task, kind, detail)
            }
        }
    }

    async fn label_one(&self, task: &ImageTask, prompt: &str) -> Result<Labeling, ItemError> {
        let image = self.fetcher.fetch(&task.image_ref).await?;
        let request = LabelRequest {
            prompt: prompt.to_string(),
            image: image.to_payload(),
            image_source: task.image_ref.tag(),
        };
        Ok(self.backend.label(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelCallError;
    use crate::types::{ImageSource, TokenUsage, FAILED_LABEL};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Labels every image "label:<source>" with fixed usage.
    ///
    /// Sources containing "fail" produce a model error. A source ending in
    /// `#<ms>` sleeps that long first, to shuffle completion order.
    struct MockBackend {
        call_count: Arc<AtomicU32>,
        in_flight: Arc<AtomicU32>,
        max_in_flight: Arc<AtomicU32>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                call_count: Arc::new(AtomicU32::new(0)),
                in_flight: Arc::new(AtomicU32::new(0)),
                max_in_flight: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl VisionBackend for MockBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Gemini
        }

        fn model(&self) -> &str {
            "mock-v1"
        }

        async fn label(&self, request: &LabelRequest) -> Result<Labeling, ModelCallError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            if let Some((_, ms)) = request.image_source.rsplit_once('#') {
                let ms: u64 = ms.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if request.image_source.contains("fail") {
                return Err(ModelCallError::with_status(
                    BackendKind::Gemini,
                    403,
                    "HTTP 403: key AIza-secret-fragment rejected",
                ));
            }
            Ok(Labeling {
                label: format!("label:{}", request.image_source),
                tokens: TokenUsage::estimated(260, 5),
                model: "mock-v1".to_string(),
            })
        }
    }

    fn tasks(names: &[&str]) -> Vec<ImageTask> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ImageTask::new(ImageSource::bytes(*name, vec![1u8, 2, 3]), i))
            .collect()
    }

    fn processor(backend: MockBackend, batch_size: usize) -> BatchProcessor {
        BatchProcessor::new(
            Arc::new(backend),
            ImageFetcher::new(reqwest::Client::new(), Duration::from_secs(5)),
            BatchOptions {
                batch_size,
                expose_error_details: false,
            },
        )
    }

    fn labels(summary: &BatchSummary) -> Vec<String> {
        summary.processed().map(|r| r.label.clone()).collect()
    }

    #[tokio::test]
    async fn test_partial_fetch_failure_is_counted_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = MockBackend::new();
        let calls = backend.call_count.clone();
        let mut input = tasks(&["a.jpg", "b.jpg", "c.jpg"]);
        input[1].image_ref = ImageSource::Url(format!("{}/gone.jpg", server.uri()));

        let summary = processor(backend, 10).process(&input, "What is this?", None).await;

        assert!(summary.error.is_none());
        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let failed = summary.results[1].as_processed().unwrap();
        assert!(failed.error);
        assert!(failed.processed);
        assert_eq!(failed.label, FAILED_LABEL);
        assert_eq!(failed.detailed_error.as_deref(), Some(GENERIC_ERROR));
        assert_eq!(failed.tokens, TokenUsage::zero());
        assert_eq!(summary.total_tokens, 2 * 265);
        assert_eq!(
            summary.total_tokens,
            summary.prompt_tokens + summary.completion_tokens
        );
    }

    #[tokio::test]
    async fn test_model_error_is_sanitized_unless_exposed() {
        let input = tasks(&["ok.jpg", "fail.jpg"]);

        let summary = processor(MockBackend::new(), 10)
            .process(&input, "label", None)
            .await;
        let failed = summary.results[1].as_processed().unwrap();
        assert_eq!(failed.detailed_error.as_deref(), Some(GENERIC_ERROR));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("AIza-secret-fragment"));

        let mut debug = processor(MockBackend::new(), 10);
        debug.options.expose_error_details = true;
        let summary = debug.process(&input, "label", None).await;
        let failed = summary.results[1].as_processed().unwrap();
        assert!(failed.detailed_error.as_deref().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_calls() {
        let backend = MockBackend::new();
        let calls = backend.call_count.clone();
        let summary = processor(backend, 10).process(&[], "label", None).await;

        assert_eq!(summary.error.as_deref(), Some("No images provided"));
        assert_eq!(summary.processed_count, 0);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.total_tokens, 0);
        assert!(summary.results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_prompt_passes_tasks_through() {
        let backend = MockBackend::new();
        let calls = backend.call_count.clone();
        let input = tasks(&["a.jpg", "b.jpg"]);
        let summary = processor(backend, 10).process(&input, "   ", None).await;

        assert_eq!(summary.error.as_deref(), Some("Prompt is required"));
        assert_eq!(
            summary.results,
            input.iter().cloned().map(ResultEntry::Skipped).collect::<Vec<_>>()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_order_preserved_despite_completion_order() {
        // Earlier items sleep longer, so they finish last within the chunk.
        let input = tasks(&["a#80", "b#40", "c#0", "d#60", "e#0"]);
        let summary = processor(MockBackend::new(), 3)
            .process(&input, "label", None)
            .await;

        assert_eq!(
            labels(&summary),
            vec!["label:a#80", "label:b#40", "label:c#0", "label:d#60", "label:e#0"]
        );
        for (i, entry) in summary.results.iter().enumerate() {
            assert_eq!(entry.as_processed().unwrap().original_index, i);
        }
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_aggregates() {
        let input = tasks(&["a.jpg", "fail-1.jpg", "c.jpg", "d.jpg", "fail-2.jpg"]);

        let one = processor(MockBackend::new(), 1)
            .process(&input, "label", None)
            .await;
        let all = processor(MockBackend::new(), 50)
            .process(&input, "label", None)
            .await;

        assert_eq!(one, all);
        assert_eq!(one.processed_count, 3);
        assert_eq!(one.error_count, 2);
        assert_eq!(one.processed_count + one.error_count, input.len());
    }

    #[tokio::test]
    async fn test_chunking_bounds_concurrency() {
        let backend = MockBackend::new();
        let max_in_flight = backend.max_in_flight.clone();
        let input = tasks(&["a#30", "b#30", "c#30", "d#30", "e#30"]);

        let mut progress = Vec::new();
        let summary = processor(backend, 2)
            .process_with_progress(&input, "label", None, |p| progress.push(*p))
            .await;

        assert_eq!(summary.processed_count, 5);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2].chunk_count, 3);
        assert_eq!(progress[2].completed, 5);
        assert_eq!(progress[0].completed, 2);
    }

    #[tokio::test]
    async fn test_selection_passes_unselected_through() {
        let backend = MockBackend::new();
        let calls = backend.call_count.clone();
        let input = tasks(&["a.jpg", "b.jpg", "fail.jpg", "d.jpg"]);

        let summary = processor(backend, 10)
            .process(&input, "label", Some(&[2, 0, 2]))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.results.len(), 4);
        assert_eq!(summary.processed_count + summary.error_count, 2);
        assert!(summary.results[0].as_processed().is_some());
        assert_eq!(summary.results[1], ResultEntry::Skipped(input[1].clone()));
        assert!(summary.results[2].as_processed().unwrap().error);
        assert_eq!(summary.results[3], ResultEntry::Skipped(input[3].clone()));
    }

    #[tokio::test]
    async fn test_selection_out_of_range_is_rejected() {
        let input = tasks(&["a.jpg"]);
        let summary = processor(MockBackend::new(), 10)
            .process(&input, "label", Some(&[0, 3]))
            .await;
        assert!(summary.error.unwrap().contains("out of range"));
        assert_eq!(summary.processed_count, 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let input = tasks(&["a.jpg"]);
        let summary = processor(MockBackend::new(), 0)
            .process(&input, "label", None)
            .await;
        assert!(summary.is_rejected());
        assert_eq!(summary.results.len(), 1);
    }
}
