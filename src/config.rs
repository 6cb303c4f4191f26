/// Namespace id of encyclopedia articles
pub const ARTICLE_NAMESPACE: i32 = 0;

/// URL prefix that page titles are appended to
pub const DEFAULT_LINK_BASE: &str = "https://en.wikipedia.org/wiki/";

/// Link targets with these prefixes are dropped together with their label
pub const DROPPED_LINK_NAMESPACES: &[&str] = &["file", "image", "category"];

/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for the decompressed input stream
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Buffer size for the JSON output stream
pub const WRITE_BUFFER_SIZE: usize = 128 * 1024;

/// Pages in flight between reader and writer in pipelined mode
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Namespace ids that produce records; everything else is skipped.
    pub namespaces: Vec<i32>,
    /// Prefix for the `link` field.
    pub link_base: String,
    /// Stop cleanly after this many records.
    pub limit: Option<u64>,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespaces: vec![ARTICLE_NAMESPACE],
            link_base: DEFAULT_LINK_BASE.to_string(),
            limit: None,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    pub fn accepts_namespace(&self, namespace_id: i32) -> bool {
        self.namespaces.contains(&namespace_id)
    }

    pub fn limit_reached(&self, written: u64) -> bool {
        self.limit.is_some_and(|limit| written >= limit)
    }
}
