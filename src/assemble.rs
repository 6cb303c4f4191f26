use crate::config::PipelineConfig;
use crate::content::clean;
use crate::models::{OutputRecord, RawPage};
use crate::parser::is_redirect_text;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Namespace(i32),
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    Record(OutputRecord),
    Skip(SkipReason),
}

/// Turns one page into its output record, or says why it has none.
///
/// The reader already drops redirects; the text check here catches pages
/// built by other callers.
pub fn assemble(raw: RawPage, config: &PipelineConfig) -> Assembly {
    if !config.accepts_namespace(raw.namespace_id) {
        return Assembly::Skip(SkipReason::Namespace(raw.namespace_id));
    }
    if is_redirect_text(&raw.latest_revision_text) {
        return Assembly::Skip(SkipReason::Redirect);
    }

    let plain_text_content = clean(&raw.latest_revision_text);
    let link = page_url(&config.link_base, &raw.title);

    Assembly::Record(OutputRecord {
        title: raw.title,
        raw_content: raw.latest_revision_text,
        plain_text_content,
        link,
    })
}

/// `base` followed by the title with spaces as underscores and everything
/// outside the RFC 3986 unreserved set percent-encoded.
pub fn page_url(base: &str, title: &str) -> String {
    let title = title.trim();
    let mut url = String::with_capacity(base.len() + title.len() * 3);
    url.push_str(base);

    for byte in title.bytes() {
        match byte {
            b' ' | b'_' => url.push('_'),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'~' => {
                url.push(byte as char)
            }
            _ => {
                let _ = write!(url, "%{:02X}", byte);
            }
        }
    }

    url
}
