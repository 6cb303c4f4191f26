use crate::config::READ_BUFFER_SIZE;
use crate::error::ParseError;
use crate::models::RawPage;
use crate::stats::ExtractionStats;
use bzip2::read::MultiBzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use tracing::{debug, warn};

/// Elements of the export schema the reader cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Page,
    Title,
    Ns,
    Redirect,
    Revision,
    Text,
    Other,
}

impl Tag {
    /// Matches on the local name so `xmlns`-qualified dumps parse the same way.
    fn from_local_name(name: &[u8]) -> Self {
        match name {
            b"page" => Tag::Page,
            b"title" => Tag::Title,
            b"ns" => Tag::Ns,
            b"redirect" => Tag::Redirect,
            b"revision" => Tag::Revision,
            b"text" => Tag::Text,
            _ => Tag::Other,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Tag::Page => "page",
            Tag::Title => "title",
            Tag::Ns => "ns",
            Tag::Redirect => "redirect",
            Tag::Revision => "revision",
            Tag::Text => "text",
            Tag::Other => "element",
        }
    }
}

enum Token {
    Start(Tag),
    Empty(Tag),
    End(Tag),
    Eof,
    Skip,
}

/// Fields collected while inside one `<page>`.
#[derive(Default)]
struct PageBuilder {
    title: String,
    namespace_id: Option<i32>,
    redirect: bool,
    in_revision: bool,
    revision_text: Option<String>,
    latest_text: String,
}

/// Pull parser over a MediaWiki XML export.
///
/// Yields one [`RawPage`] per non-redirect `<page>`, in document order. Memory
/// stays bounded by the largest single revision text plus the XML event buffer.
/// The first structural error is returned once and the iterator is fused after it.
pub struct WikiReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<Tag>,
    page: Option<PageBuilder>,
    capture: Option<Tag>,
    text_buf: String,
    stats: Option<Arc<ExtractionStats>>,
    finished: bool,
}

/// Reader over a file or stdin, decompressed when the path ends in `.bz2`.
pub type DumpReader = WikiReader<BufReader<Box<dyn Read + Send>>>;

impl DumpReader {
    /// Opens a dump by path; `-` reads from stdin.
    pub fn open(path: &str) -> io::Result<Self> {
        let source: Box<dyn Read + Send> = if path == "-" {
            Box::new(io::stdin())
        } else {
            Box::new(File::open(path)?)
        };

        let source: Box<dyn Read + Send> = if is_bz2(path) {
            Box::new(MultiBzDecoder::new(source))
        } else {
            source
        };

        Ok(WikiReader::from_reader(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            source,
        )))
    }
}

fn is_bz2(path: &str) -> bool {
    path.ends_with(".bz2")
}

impl<R: BufRead> WikiReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(8192),
            open: Vec::new(),
            page: None,
            capture: None,
            text_buf: String::new(),
            stats: None,
            finished: false,
        }
    }

    /// Counts skipped redirects into shared stats.
    pub fn with_stats(mut self, stats: Arc<ExtractionStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Current byte offset into the decoded stream.
    pub fn offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn read_token(&mut self) -> Result<Token, ParseError> {
        self.buf.clear();
        let result = self.reader.read_event_into(&mut self.buf);
        let offset = self.reader.buffer_position() as u64;
        let event = result.map_err(|source| ParseError::Xml { offset, source })?;

        let token = match event {
            Event::Start(e) => Token::Start(Tag::from_local_name(e.local_name().as_ref())),
            Event::Empty(e) => Token::Empty(Tag::from_local_name(e.local_name().as_ref())),
            Event::End(e) => Token::End(Tag::from_local_name(e.local_name().as_ref())),
            Event::Text(e) => {
                if let Some(tag) = self.capture {
                    let text = e.unescape().map_err(|source| match source {
                        quick_xml::Error::NonDecodable(_) => ParseError::Encoding {
                            offset,
                            element: tag.as_str(),
                        },
                        source => ParseError::Xml { offset, source },
                    })?;
                    self.text_buf.push_str(&text);
                }
                Token::Skip
            }
            Event::CData(e) => {
                if let Some(tag) = self.capture {
                    let text = std::str::from_utf8(&e).map_err(|_| ParseError::Encoding {
                        offset,
                        element: tag.as_str(),
                    })?;
                    self.text_buf.push_str(text);
                }
                Token::Skip
            }
            Event::Eof => Token::Eof,
            _ => Token::Skip,
        };

        Ok(token)
    }

    fn next_page(&mut self) -> Result<Option<RawPage>, ParseError> {
        loop {
            match self.read_token()? {
                Token::Start(tag) => {
                    self.open.push(tag);
                    self.on_start(tag)?;
                }
                Token::Empty(tag) => self.on_empty(tag),
                Token::End(tag) => {
                    self.open.pop();
                    if let Some(page) = self.on_end(tag)? {
                        return Ok(Some(page));
                    }
                }
                Token::Eof => {
                    if let Some(&innermost) = self.open.last() {
                        let element = if self.page.is_some() {
                            Tag::Page
                        } else {
                            innermost
                        };
                        return Err(ParseError::Truncated {
                            offset: self.offset(),
                            element: element.as_str(),
                        });
                    }
                    return Ok(None);
                }
                Token::Skip => {}
            }
        }
    }

    /// A `<page>` or `<revision>` opening inside an unclosed one is corruption,
    /// reported here rather than at the next mismatched end tag.
    fn on_start(&mut self, tag: Tag) -> Result<(), ParseError> {
        let offset = self.offset();
        if tag == Tag::Page {
            if self.page.is_some() {
                return Err(ParseError::Unclosed {
                    offset,
                    element: Tag::Page.as_str(),
                });
            }
            self.page = Some(PageBuilder::default());
            return Ok(());
        }
        let Some(page) = self.page.as_mut() else {
            return Ok(());
        };
        match tag {
            Tag::Title | Tag::Ns if !page.in_revision => {
                self.capture = Some(tag);
                self.text_buf.clear();
            }
            Tag::Text if page.in_revision => {
                self.capture = Some(tag);
                self.text_buf.clear();
            }
            Tag::Revision if page.in_revision => {
                return Err(ParseError::Unclosed {
                    offset,
                    element: Tag::Revision.as_str(),
                });
            }
            Tag::Revision => {
                page.in_revision = true;
                page.revision_text = None;
            }
            Tag::Redirect => page.redirect = true,
            _ => {}
        }
        Ok(())
    }

    fn on_empty(&mut self, tag: Tag) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        match tag {
            Tag::Redirect => page.redirect = true,
            Tag::Text if page.in_revision => page.revision_text = Some(String::new()),
            Tag::Revision => page.latest_text.clear(),
            _ => {}
        }
    }

    fn on_end(&mut self, tag: Tag) -> Result<Option<RawPage>, ParseError> {
        if tag == Tag::Page {
            return Ok(self.page.take().and_then(|page| self.finish_page(page)));
        }
        let offset = self.offset();
        let Some(page) = self.page.as_mut() else {
            return Ok(None);
        };
        match tag {
            Tag::Title if self.capture == Some(Tag::Title) => {
                page.title = std::mem::take(&mut self.text_buf);
                self.capture = None;
            }
            Tag::Ns if self.capture == Some(Tag::Ns) => {
                let value = std::mem::take(&mut self.text_buf);
                self.capture = None;
                let namespace_id = value
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::Namespace { offset, value })?;
                page.namespace_id = Some(namespace_id);
            }
            Tag::Text if self.capture == Some(Tag::Text) => {
                page.revision_text = Some(std::mem::take(&mut self.text_buf));
                self.capture = None;
            }
            Tag::Revision => {
                page.in_revision = false;
                page.latest_text = page.revision_text.take().unwrap_or_default();
            }
            _ => {}
        }
        Ok(None)
    }

    fn finish_page(&self, page: PageBuilder) -> Option<RawPage> {
        if page.redirect || is_redirect_text(&page.latest_text) {
            debug!(title = %page.title, "Skipping redirect");
            if let Some(stats) = &self.stats {
                stats.inc_redirects();
            }
            return None;
        }

        if page.title.trim().is_empty() {
            warn!(offset = self.offset(), "Skipping page without a title");
            return None;
        }

        Some(RawPage {
            title: page.title,
            namespace_id: page.namespace_id.unwrap_or(0),
            latest_revision_text: page.latest_text,
        })
    }
}

impl<R: BufRead> Iterator for WikiReader<R> {
    type Item = Result<RawPage, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// True when the text opens with a `#REDIRECT` marker (any case, leading whitespace allowed).
pub fn is_redirect_text(text: &str) -> bool {
    text.trim_start()
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("#redirect"))
}
