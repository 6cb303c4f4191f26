use serde::Serialize;

/// One `<page>` of the dump, reduced to what the pipeline needs.
///
/// Only the last `<revision>` in document order survives; earlier revisions
/// are dropped as soon as a newer one is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub title: String,
    pub namespace_id: i32,
    pub latest_revision_text: String,
}

/// A finished page, serialized as one element of the output array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub title: String,
    pub raw_content: String,
    pub plain_text_content: String,
    pub link: String,
}
