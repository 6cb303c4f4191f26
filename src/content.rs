//! Wikitext to plain text.
//!
//! Cleaning is a fixed sequence of independent rewrite passes rather than a
//! wikitext grammar. Each pass assumes the ones before it already ran: links
//! are rewritten after templates are gone, markup tokens after links, and
//! whitespace last. Any opening marker without a partner (`{{`, `[[`, `{|`,
//! `<!--`, `<ref>`) swallows the rest of the text; truncated dump entries
//! degrade to their readable prefix instead of failing.

use crate::config::DROPPED_LINK_NAMESPACES;
use memchr::{memchr, memmem};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static EXTERNAL_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:(?:https?|ftp):)?//[^\s\]]*(?:[ \t]+([^\]\n]*))?\]").unwrap()
});

static SECTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*={2,6}[ \t]*(.+?)[ \t]*={2,6}[ \t\r]*$").unwrap());

/// Tag names MediaWiki accepts in article source. Anything else between `<`
/// and `>` is prose, e.g. `n<k and k>0` after entity decoding.
static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(abbr|b|bdi|big|blockquote|br|center|chem|cite|code|dd|del|div|dl|dt|em|font|gallery|h[1-6]|hiero|hr|i|includeonly|indicator|ins|kbd|li|mapframe|mark|math|noinclude|nowiki|ol|onlyinclude|p|poem|pre|q|references|rp|rt|ruby|s|samp|score|section|small|source|span|strike|strong|sub|sup|syntaxhighlight|table|td|templatestyles|th|time|timeline|tr|tt|u|ul|var|wbr)(?:\s[^<>]*)?/?>",
    )
    .unwrap()
});

static LIST_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[*#:;]+[ \t]*").unwrap());

static HORIZONTAL_RULE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*-{4,}[ \t]*$").unwrap());

static BEHAVIOR_SWITCH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"__[A-Z]+__").unwrap());

/// One rewrite step of [`clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// `{{ ... }}`, nested invocations matched to their own closing pair.
    Templates,
    /// `<!-- ... -->`, `<ref>...</ref>` and `<ref ... />`.
    CommentsAndRefs,
    /// `[[target|label]]` to `label`, `[[target]]` to `target`; file, image
    /// and category links vanish with their label.
    InternalLinks,
    /// `[url label]` to `label`, bare `[url]` dropped.
    ExternalLinks,
    /// Tables, HTML tags, headings, bold/italic quotes, list bullets.
    Markup,
    /// Runs of spaces to one space, blank lines removed, ends trimmed.
    Whitespace,
}

/// Passes in the order [`clean`] applies them.
pub const PASSES: [Pass; 6] = [
    Pass::Templates,
    Pass::CommentsAndRefs,
    Pass::InternalLinks,
    Pass::ExternalLinks,
    Pass::Markup,
    Pass::Whitespace,
];

impl Pass {
    pub fn apply(self, text: &str) -> String {
        match self {
            Pass::Templates => strip_spans(text, b"{{", find_template_end),
            Pass::CommentsAndRefs => strip_refs(&strip_comments(text)),
            Pass::InternalLinks => rewrite_internal_links(text),
            Pass::ExternalLinks => rewrite_external_links(text),
            Pass::Markup => strip_markup(text),
            Pass::Whitespace => collapse_whitespace(text),
        }
    }
}

/// Renders wikitext as plain text. Never fails; malformed markup is dropped.
pub fn clean(raw: &str) -> String {
    PASSES
        .iter()
        .fold(raw.to_string(), |text, pass| pass.apply(&text))
}

/// Removes every span starting at `open` and ending where `find_end` says.
fn strip_spans<F>(text: &str, open: &[u8; 2], find_end: F) -> String
where
    F: Fn(&[u8], usize) -> Option<usize>,
{
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut run_start = 0;

    while i + 1 < bytes.len() {
        if bytes[i..i + 2] == open[..] {
            result.push_str(&text[run_start..i]);
            i = find_end(bytes, i).unwrap_or(bytes.len());
            run_start = i;
        } else {
            i += 1;
        }
    }

    if run_start < bytes.len() {
        result.push_str(&text[run_start..]);
    }

    result
}

/// Index just past the `close` that balances the `open` at `start`.
fn find_balanced_end(bytes: &[u8], start: usize, open: &[u8; 2], close: &[u8; 2]) -> Option<usize> {
    let mut depth: usize = 0;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i..i + 2] == open[..] {
            depth += 1;
            i += 2;
        } else if bytes[i..i + 2] == close[..] {
            depth = depth.saturating_sub(1);
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Like [`find_balanced_end`] for braces, with `{{{param}}}` as its own unit.
///
/// Stray `}` directly after the outermost close are template debris and are
/// swallowed with it.
fn find_template_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut widths: Vec<usize> = Vec::new();
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let width = if bytes.get(i + 2) == Some(&b'{') { 3 } else { 2 };
            widths.push(width);
            i += width;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            let width = match widths.pop() {
                Some(3) if bytes.get(i + 2) == Some(&b'}') => 3,
                _ => 2,
            };
            i += width;
            if widths.is_empty() {
                while bytes.get(i) == Some(&b'}') {
                    i += 1;
                }
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = memmem::find(rest.as_bytes(), b"<!--") {
        result.push_str(&rest[..start]);
        let body = start + 4;
        match memmem::find(&rest.as_bytes()[body..], b"-->") {
            Some(end) => rest = &rest[body + end + 3..],
            None => return result,
        }
    }

    result.push_str(rest);
    result
}

fn strip_refs(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut run_start = 0;

    while let Some(open) = find_ref_open(bytes, run_start) {
        result.push_str(&text[run_start..open]);

        let Some(tag_end) = memchr(b'>', &bytes[open..]).map(|p| open + p) else {
            return result;
        };
        if bytes[tag_end - 1] == b'/' {
            run_start = tag_end + 1;
            continue;
        }

        let body = tag_end + 1;
        let Some(close) = find_ascii_ci(&bytes[body..], b"</ref").map(|p| body + p) else {
            return result;
        };
        match memchr(b'>', &bytes[close..]) {
            Some(p) => run_start = close + p + 1,
            None => return result,
        }
    }

    result.push_str(&text[run_start..]);
    result
}

/// Finds `<ref` followed by `>`, `/`, whitespace or end of text, so `<references/>` is left alone.
fn find_ref_open(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while let Some(p) = find_ascii_ci(&bytes[i..], b"<ref") {
        let at = i + p;
        match bytes.get(at + 4) {
            None | Some(b'>') | Some(b'/') => return Some(at),
            Some(c) if c.is_ascii_whitespace() => return Some(at),
            _ => i = at + 4,
        }
    }
    None
}

/// Case-insensitive search on raw bytes to keep offsets valid with non-ASCII text.
fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn rewrite_internal_links(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut run_start = 0;

    while i + 1 < bytes.len() {
        if &bytes[i..i + 2] == b"[[" {
            result.push_str(&text[run_start..i]);
            let Some(end) = find_balanced_end(bytes, i, b"[[", b"]]") else {
                return result;
            };
            result.push_str(&link_label(&text[i + 2..end - 2]));
            i = end;
            run_start = end;
        } else {
            i += 1;
        }
    }

    if run_start < bytes.len() {
        result.push_str(&text[run_start..]);
    }

    result
}

/// Readable text for the inside of one `[[...]]`.
fn link_label(inner: &str) -> String {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target.trim(), Some(label)),
        None => (inner.trim(), None),
    };

    // [[:Category:Foo]] is a plain link to the category page.
    let target = match target.strip_prefix(':') {
        Some(visible) => visible.trim_start(),
        None if has_dropped_prefix(target) => return String::new(),
        None => target,
    };

    match label {
        Some(label) if !label.trim().is_empty() => rewrite_internal_links(label),
        _ => target.to_string(),
    }
}

fn has_dropped_prefix(target: &str) -> bool {
    target.split_once(':').is_some_and(|(prefix, _)| {
        let prefix = prefix.trim();
        DROPPED_LINK_NAMESPACES
            .iter()
            .any(|ns| prefix.eq_ignore_ascii_case(ns))
    })
}

fn rewrite_external_links(text: &str) -> String {
    EXTERNAL_LINK_REGEX
        .replace_all(text, |caps: &Captures| {
            caps.get(1)
                .map(|label| label.as_str().trim().to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

fn strip_markup(text: &str) -> String {
    let text = strip_spans(text, b"{|", |bytes, start| {
        find_balanced_end(bytes, start, b"{|", b"|}")
    });
    let text = HTML_TAG_REGEX.replace_all(&text, |caps: &Captures| {
        if caps[1].eq_ignore_ascii_case("br") {
            "\n"
        } else {
            ""
        }
    });
    let text = SECTION_REGEX.replace_all(&text, "${1}");
    let text = text.replace("'''''", "").replace("'''", "").replace("''", "");
    let text = LIST_MARKER_REGEX.replace_all(&text, "");
    let text = HORIZONTAL_RULE_REGEX.replace_all(&text, "");
    let text = BEHAVIOR_SWITCH_REGEX.replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_templates_match_their_own_close() {
        assert_eq!(clean("A{{x|{{y}}}}B"), "AB");
    }

    #[test]
    fn triple_brace_parameters() {
        assert_eq!(clean("a{{{1}}}b"), "ab");
        assert_eq!(clean("{{a}}}b"), "b");
        assert_eq!(clean("x{{t|{{{name|default}}}}}y"), "xy");
        assert_eq!(clean("{{{{a}}}} after"), "after");
    }

    #[test]
    fn link_rewriting() {
        assert_eq!(clean("[[Foo|bar]] and [[Baz]]"), "bar and Baz");
    }

    #[test]
    fn unterminated_template_runs_to_end() {
        assert_eq!(clean("Hello {{unterminated"), "Hello");
    }

    #[test]
    fn templates_pass_alone() {
        assert_eq!(Pass::Templates.apply("{{a}} middle {{b}} end"), " middle  end");
        assert_eq!(Pass::Templates.apply("{{outer {{inner}} end}} text"), " text");
        assert_eq!(Pass::Templates.apply("plain text"), "plain text");
    }

    #[test]
    fn unclosed_template_does_not_leak_last_char() {
        assert_eq!(Pass::Templates.apply("keep{{unclosed template text after"), "keep");
    }

    #[test]
    fn comments_removed() {
        assert_eq!(clean("a<!-- hidden -->b"), "ab");
        assert_eq!(clean("x <!-- never closed"), "x");
    }

    #[test]
    fn refs_removed() {
        let text = r#"Fact.<ref name="x">{{cite web|url=http://a.b}}</ref> More<ref name="y" />."#;
        assert_eq!(clean(text), "Fact. More.");
    }

    #[test]
    fn refs_case_insensitive_and_references_tag_kept_for_markup_pass() {
        let out = Pass::CommentsAndRefs.apply("A<REF>note</Ref>B<references/>");
        assert_eq!(out, "AB<references/>");
        assert_eq!(clean("A<REF>note</Ref>B<references/>"), "AB");
    }

    #[test]
    fn unclosed_ref_runs_to_end() {
        assert_eq!(clean("Claim<ref>dangling citation"), "Claim");
    }

    #[test]
    fn namespace_links_dropped_with_label() {
        let text = "Intro [[File:A.jpg|thumb|A [[b]] caption]] text\n[[Category:Foo|Sort]]";
        assert_eq!(clean(text), "Intro text");
        assert_eq!(clean("x [[image:Logo.png]] y"), "x y");
    }

    #[test]
    fn leading_colon_keeps_link_visible() {
        assert_eq!(clean("See [[:Category:Rivers]]."), "See Category:Rivers.");
    }

    #[test]
    fn pipe_trick_falls_back_to_target() {
        assert_eq!(clean("[[Foo (bar)|]]"), "Foo (bar)");
    }

    #[test]
    fn nested_link_in_label() {
        assert_eq!(Pass::InternalLinks.apply("[[A|x [[B|y]] z]]"), "x y z");
    }

    #[test]
    fn link_trail_joins() {
        assert_eq!(clean("two [[bus]]es"), "two buses");
    }

    #[test]
    fn unterminated_link_runs_to_end() {
        assert_eq!(clean("x [[broken"), "x");
    }

    #[test]
    fn external_links() {
        let text = "See [https://example.com Example site] and [http://x.org].";
        assert_eq!(clean(text), "See Example site and .");
        assert_eq!(clean("[//example.org/a?b=c relative]"), "relative");
    }

    #[test]
    fn headers_become_lines() {
        assert_eq!(clean("Intro\n== History ==\nText\n=== Early ===\nMore"), "Intro\nHistory\nText\nEarly\nMore");
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(clean("'''Bold''' and ''it'' and '''''both'''''"), "Bold and it and both");
    }

    #[test]
    fn tables_removed_wholesale() {
        let text = "Before\n{| class=\"wikitable\"\n|-\n| cell [[Link]]\n{|\n| nested\n|}\n|}\nAfter";
        assert_eq!(clean(text), "Before\nAfter");
    }

    #[test]
    fn comparisons_are_not_tags() {
        assert_eq!(clean("if n<k and k>0 then"), "if n<k and k>0 then");
        assert_eq!(clean("a <b> bold</b> and x<y>z"), "a bold and x<y>z");
    }

    #[test]
    fn html_tags() {
        assert_eq!(clean("a<br/>b <div class=\"x\">c</div> <small>d</small>"), "a\nb c d");
    }

    #[test]
    fn lists_rules_and_switches() {
        assert_eq!(clean("__NOTOC__\n* one\n# two\n----\n: three"), "one\ntwo\nthree");
    }

    #[test]
    fn entities_in_article_text() {
        assert_eq!(clean("10&nbsp;km, 1990&ndash;1995"), "10 km, 1990\u{2013}1995");
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(clean("  a   b\n\n\n c \t\n"), "a b\nc");
    }

    #[test]
    fn templates_run_before_links() {
        assert_eq!(clean("[[A|{{lang|fr|x}}b]]"), "b");
    }

    #[test]
    fn idempotent_on_plain_text() {
        let samples = [
            "The quick brown fox.\nJumps over the lazy dog.",
            "Prices rose 5% in 2020 (see below); it's fine.",
            "Zürich is a city in Switzerland.",
            "",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn realistic_article() {
        let text = r#"{{Infobox programming language
| name = Rust
| designer = Graydon Hoare
}}
'''Rust''' is a [[systems programming|systems]] language.<ref>{{cite web|title=Rust}}</ref>

[[File:Rust logo.svg|thumb|The Rust logo]]

== History ==
Rust was announced in 2010 by [[Mozilla]].<!-- check date -->

[https://www.rust-lang.org Official website]

[[Category:Programming languages]]"#;
        let plain = clean(text);
        assert_eq!(
            plain,
            "Rust is a systems language.\nHistory\nRust was announced in 2010 by Mozilla.\nOfficial website"
        );
        assert_eq!(clean(&plain), plain);
    }

    #[test]
    fn never_panics_on_stray_markers() {
        for text in ["}}", "]]", "|}", "-->", "</ref>", "{{", "[[", "{|", "<ref", "<!--", "[", "'"] {
            let _ = clean(text);
        }
        assert_eq!(clean("}} stray ]]"), "}} stray ]]");
    }
}
