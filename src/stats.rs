use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the reader and the pipeline stages
#[derive(Default)]
pub struct ExtractionStats {
    /// Pages handed from the reader to the assembler.
    pub pages_read: AtomicU64,
    /// Redirects dropped by either the reader or the assembler.
    pub redirects_skipped: AtomicU64,
    pub namespace_skipped: AtomicU64,
    pub records_written: AtomicU64,
    pub raw_bytes: AtomicU64,
    pub plain_bytes: AtomicU64,
}

/// Plain copy of the counters, taken at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub pages_read: u64,
    pub redirects_skipped: u64,
    pub namespace_skipped: u64,
    pub records_written: u64,
    pub raw_bytes: u64,
    pub plain_bytes: u64,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_namespace_skipped(&self) {
        self.namespace_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one written page and the size of both text renderings.
    pub fn add_record(&self, raw_len: usize, plain_len: usize) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.raw_bytes.fetch_add(raw_len as u64, Ordering::Relaxed);
        self.plain_bytes
            .fetch_add(plain_len as u64, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_read.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirects_skipped.load(Ordering::Relaxed)
    }

    pub fn namespace_skips(&self) -> u64 {
        self.namespace_skipped.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn raw(&self) -> u64 {
        self.raw_bytes.load(Ordering::Relaxed)
    }

    pub fn plain(&self) -> u64 {
        self.plain_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_read: self.pages(),
            redirects_skipped: self.redirects(),
            namespace_skipped: self.namespace_skips(),
            records_written: self.records(),
            raw_bytes: self.raw(),
            plain_bytes: self.plain(),
        }
    }
}
