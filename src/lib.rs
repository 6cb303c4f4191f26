//! Wikijson: Wikipedia XML dump to JSON array conversion
//!
//! This crate streams a MediaWiki XML export (plain or BZ2-compressed) and writes
//! one JSON object per article page:
//!
//! 1. **Read** -- Pull-parse `<page>` elements, keep only the latest revision text,
//!    and drop redirects before they reach the rest of the pipeline
//! 2. **Clean** -- Strip wikitext markup (templates, refs, links, tables, formatting)
//!    down to readable plain text
//! 3. **Assemble** -- Filter by namespace and build the output record with its
//!    canonical page URL
//! 4. **Write** -- Stream records into a single JSON array without holding the
//!    dump in memory
//!
//! # Architecture
//!
//! - **Streaming XML parsing** -- Event-based; memory is bounded by the largest page
//! - **Ordered output** -- Records leave in the same order pages appear in the dump
//! - **Cooperative cancellation** -- Checked between pages; partial output stays valid JSON
//! - **Optional pipelining** -- Reader and writer on separate tasks over a bounded queue
//! - **Atomic operations** -- Lock-free counters for run statistics
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML reader with BZ2 decompression
//! - [`content`] -- Wikitext to plain text cleaning passes
//! - [`assemble`] -- Namespace filtering, record and URL construction
//! - [`writer`] -- Record sinks, including the JSON array writer
//! - [`pipeline`] -- Run state machine, cancellation, pipelined mode
//! - [`models`] -- Core data types (RawPage, OutputRecord)
//! - [`error`] -- Parse, write, and pipeline error types
//! - [`stats`] -- Thread-safe atomic counters
//! - [`config`] -- Constants and per-run settings
//!
//! # Example Usage
//!
//! ```bash
//! # Convert a compressed dump to a JSON file
//! wikijson extract -i enwiki-latest-pages-articles.xml.bz2 -o articles.json
//!
//! # First 100 articles, pretty-printed to stdout
//! wikijson extract -i dump.xml -o - --limit 100 --pretty
//!
//! # Clean a snippet of wikitext from stdin
//! echo "'''Bold''' [[link|text]]" | wikijson clean
//! ```

pub mod assemble;
pub mod config;
pub mod content;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod writer;
