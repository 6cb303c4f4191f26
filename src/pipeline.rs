use crate::assemble::{assemble, Assembly, SkipReason};
use crate::config::{PipelineConfig, PROGRESS_INTERVAL};
use crate::error::{ParseError, PipelineError};
use crate::models::RawPage;
use crate::stats::{ExtractionStats, StatsSnapshot};
use crate::writer::RecordSink;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// `Idle -> Streaming -> Done | Cancelled | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    Done,
    Cancelled,
    Failed,
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub stats: StatsSnapshot,
}

/// Shared cancellation signal, checked between pages.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader output in, assembled records out to a [`RecordSink`].
///
/// A pipeline is driven once, either by [`Pipeline::run`] on the calling
/// thread or by [`Pipeline::run_pipelined`] with the reader on its own task.
pub struct Pipeline<S> {
    config: PipelineConfig,
    sink: S,
    stats: Arc<ExtractionStats>,
    state: PipelineState,
    progress: ProgressBar,
    written: u64,
}

impl<S: RecordSink> Pipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        let progress = if config.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self {
            config,
            sink,
            stats: Arc::new(ExtractionStats::new()),
            state: PipelineState::Idle,
            progress,
            written: 0,
        }
    }

    /// Handle to the run's counters, for attaching to a reader.
    pub fn stats(&self) -> Arc<ExtractionStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Pulls pages until the input ends, the limit is hit, the token is
    /// cancelled, or an error occurs. Single-threaded.
    pub fn run<I>(&mut self, pages: I, cancel: &CancelToken) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<RawPage, ParseError>>,
    {
        let mut pages = pages.into_iter();
        self.drive(|| pages.next(), cancel)
    }

    fn drive<F>(&mut self, mut next: F, cancel: &CancelToken) -> Result<RunSummary, PipelineError>
    where
        F: FnMut() -> Option<Result<RawPage, ParseError>>,
    {
        self.state = PipelineState::Streaming;
        info!(namespaces = ?self.config.namespaces, "Pipeline streaming");

        loop {
            if cancel.is_cancelled() {
                return self.complete(Outcome::Cancelled);
            }
            if self.config.limit_reached(self.written) {
                info!(limit = self.written, "Record limit reached");
                return self.complete(Outcome::Done);
            }
            let Some(page) = next() else {
                break;
            };
            if let Err(e) = self.step(page) {
                return Err(self.fail(e));
            }
        }

        if cancel.is_cancelled() {
            self.complete(Outcome::Cancelled)
        } else {
            self.complete(Outcome::Done)
        }
    }

    fn step(&mut self, page: Result<RawPage, ParseError>) -> Result<(), PipelineError> {
        let page = page?;
        self.stats.inc_pages();
        let seen = self.stats.pages();
        if seen % PROGRESS_INTERVAL == 0 {
            self.progress
                .set_message(format!("{} pages, {} records", seen, self.written));
            self.progress.tick();
        }

        match assemble(page, &self.config) {
            Assembly::Record(record) => {
                let raw_len = record.raw_content.len();
                let plain_len = record.plain_text_content.len();
                debug!(title = %record.title, plain_len, "Writing record");
                self.sink.write(record)?;
                self.stats.add_record(raw_len, plain_len);
                self.written += 1;
            }
            Assembly::Skip(SkipReason::Namespace(namespace_id)) => {
                debug!(namespace_id, "Skipping page outside accepted namespaces");
                self.stats.inc_namespace_skipped();
            }
            Assembly::Skip(SkipReason::Redirect) => {
                self.stats.inc_redirects();
            }
        }
        Ok(())
    }

    fn complete(&mut self, outcome: Outcome) -> Result<RunSummary, PipelineError> {
        if let Err(e) = self.sink.finish() {
            return Err(self.fail(e.into()));
        }
        self.state = match outcome {
            Outcome::Done => PipelineState::Done,
            Outcome::Cancelled => PipelineState::Cancelled,
        };
        self.progress.finish_and_clear();

        let stats = self.stats.snapshot();
        info!(
            ?outcome,
            pages = stats.pages_read,
            records = stats.records_written,
            "Pipeline finished"
        );
        Ok(RunSummary { outcome, stats })
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        self.state = PipelineState::Failed;
        self.progress.abandon();
        error!(error = %error, records = self.written, "Pipeline failed");
        error
    }
}

impl<S: RecordSink + Send + 'static> Pipeline<S> {
    /// Runs the reader on one blocking task and clean/assemble/write on
    /// another, joined by a bounded FIFO queue of `capacity` pages.
    ///
    /// The reader blocks when the queue is full. Output order matches input order.
    pub async fn run_pipelined<I>(
        mut self,
        pages: I,
        cancel: &CancelToken,
        capacity: usize,
    ) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<RawPage, ParseError>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let reader_cancel = cancel.subscribe();
        let reader = tokio::task::spawn_blocking(move || {
            for page in pages {
                if *reader_cancel.borrow() {
                    debug!("Reader observed cancellation");
                    break;
                }
                let failed = page.is_err();
                // A closed queue means the consumer has stopped.
                if tx.blocking_send(page).is_err() || failed {
                    break;
                }
            }
        });

        let cancel = cancel.clone();
        let consumer =
            tokio::task::spawn_blocking(move || self.drive(|| rx.blocking_recv(), &cancel));

        let summary = consumer.await?;
        reader.await?;
        summary
    }
}
