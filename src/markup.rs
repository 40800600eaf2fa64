//! Markup Rewriter
//!
//! Runs the pattern matcher over every text node of one HTML or XHTML
//! document. Markup is passed through byte for byte; only text nodes that
//! actually contain a match are re-emitted.
//!
//! ## Tokenizers
//!
//! Chapters are first read as XML with `quick_xml`, which treats
//! `<script/>`, `<title/>` and other self-closing elements as empty.
//! Documents that are not well-formed XML are tokenized with `lol_html` in
//! lenient mode instead, which accepts unbalanced tags and stray `<`
//! characters.

use std::ops::Range;

use log::debug;
use lol_html::{
    RewriteStrSettings, doc_text,
    html_content::{ContentType, TextType},
    rewrite_str,
};
use quick_xml::{events::Event, reader::Reader};

use crate::{
    error::ScrubError,
    pattern::PatternSet,
    types::{MatchResult, Pattern},
};

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Byte ranges of an XML document, in document order
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    /// Tags, comments, declarations; copied as is
    Markup(Range<usize>),

    /// Character data, possibly holding entity references
    Text(Range<usize>),

    /// A whole `<![CDATA[...]]>` section
    CData(Range<usize>),
}

/// Removes patterns from all text nodes of a document
///
/// # Parameters
/// - `document`: HTML or XHTML source
/// - `patterns`: Patterns to remove, applied in order to each text node
/// - `case_sensitive`: Whether matching respects letter case
///
/// # Return
/// - `Ok(MatchResult)`: The rewritten document and the number of removed occurrences
/// - `Err(ScrubError)`: A regular expression is invalid or the document cannot be tokenized
pub fn rewrite(
    document: &str,
    patterns: &[Pattern],
    case_sensitive: bool,
) -> Result<MatchResult, ScrubError> {
    let patterns = PatternSet::compile(patterns, case_sensitive)?;
    rewrite_with(document, &patterns)
}

/// Same as [rewrite], with patterns that were compiled beforehand
///
/// Text nodes are visited in document order, including whitespace-only nodes
/// and the contents of `script` and `style`.
pub fn rewrite_with(document: &str, patterns: &PatternSet) -> Result<MatchResult, ScrubError> {
    if patterns.is_empty() {
        return Ok(MatchResult::unchanged(document));
    }

    let (output, changes) = match xml_segments(document) {
        Some(segments) => rewrite_xml(document, &segments, patterns),
        None => rewrite_html(document, patterns)?,
    };

    if changes == 0 {
        return Ok(MatchResult::unchanged(document));
    }

    Ok(MatchResult {
        text: output,
        count: changes,
    })
}

/// Splits a well-formed XML document into markup, text and CDATA ranges
///
/// Consecutive text and entity reference events are merged into one text
/// range, so `Tom &amp; Jerry` is matched as a single node.
///
/// # Return
/// - `Some(segments)`: The ranges cover the whole document without gaps
/// - `None`: The document is not well-formed XML
fn xml_segments(document: &str) -> Option<Vec<Segment>> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(false);

    let mut segments = Vec::new();
    let mut text_start = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                debug!("Not well-formed XML, using the HTML tokenizer: {}", err);
                return None;
            }
        };
        let end = reader.buffer_position() as usize;
        if !document.is_char_boundary(end) {
            return None;
        }

        if matches!(event, Event::Text(_) | Event::GeneralRef(_)) {
            text_start.get_or_insert(start);
            continue;
        }

        if let Some(text_start) = text_start.take() {
            segments.push(Segment::Text(text_start..start));
        }

        match event {
            Event::Eof => break,

            // a bare `<` in HTML script or prose
            Event::Start(tag) | Event::Empty(tag) if tag.name().as_ref().is_empty() => {
                debug!("Empty tag name at byte {}, using the HTML tokenizer", start);
                return None;
            }

            Event::CData(_) => segments.push(Segment::CData(start..end)),
            _ => segments.push(Segment::Markup(start..end)),
        }
    }

    Some(segments)
}

fn rewrite_xml(document: &str, segments: &[Segment], patterns: &PatternSet) -> (String, usize) {
    let mut output = String::with_capacity(document.len());
    let mut changes = 0;

    for segment in segments {
        match segment {
            Segment::Markup(range) => output.push_str(&document[range.clone()]),

            Segment::Text(range) => {
                let (text, count) = rewrite_escaped_text(&document[range.clone()], patterns);
                output.push_str(&text);
                changes += count;
            }

            Segment::CData(range) => {
                let raw = &document[range.clone()];
                let inner = raw
                    .strip_prefix(CDATA_OPEN)
                    .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
                    .unwrap_or(raw);

                let result = patterns.apply(inner);
                if result.count == 0 {
                    output.push_str(raw);
                } else {
                    output.push_str(CDATA_OPEN);
                    output.push_str(&result.text);
                    output.push_str(CDATA_CLOSE);
                    changes += result.count;
                }
            }
        }
    }

    (output, changes)
}

/// Rewrites a document that is not well-formed XML
///
/// The tokenizer may hand over a text node in several chunks; they are
/// buffered so that patterns always see the whole node.
fn rewrite_html(document: &str, patterns: &PatternSet) -> Result<(String, usize), ScrubError> {
    let mut pending = String::new();
    let mut changes = 0;

    let output = rewrite_str(
        document,
        RewriteStrSettings {
            document_content_handlers: vec![doc_text!(|chunk| {
                pending.push_str(chunk.as_str());
                chunk.remove();

                if chunk.last_in_text_node() {
                    let raw = std::mem::take(&mut pending);
                    let (text, count) = match chunk.text_type() {
                        TextType::Data | TextType::RCData => rewrite_escaped_text(&raw, patterns),
                        _ => {
                            let result = patterns.apply(&raw);
                            (result.text, result.count)
                        }
                    };
                    changes += count;
                    chunk.replace(&text, ContentType::Html);
                }

                Ok(())
            })],
            strict: false,
            ..RewriteStrSettings::default()
        },
    )?;

    Ok((output, changes))
}

/// Applies the patterns to the source of a text node with character references
///
/// Returns the markup to emit in place of the node. References are decoded
/// before matching, and the text is escaped again only when it changed, so
/// untouched nodes keep their exact source.
fn rewrite_escaped_text(raw: &str, patterns: &PatternSet) -> (String, usize) {
    let decoded = html_escape::decode_html_entities(raw);
    let result = patterns.apply(&decoded);

    if result.count == 0 {
        (raw.to_string(), 0)
    } else {
        (
            html_escape::encode_text(&result.text).into_owned(),
            result.count,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        markup::{Segment, rewrite, rewrite_with, xml_segments},
        pattern::{PAGE_NUMBER_PATTERNS, PatternSet},
        types::Pattern,
    };

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Page 3</title><link rel="stylesheet" href="../styles/book.css"/></head>
<body>
<p class="Page 3">It was a dark night.<br/>Page 3</p>
<!-- Page 3 -->
<p>The end.</p>
</body>
</html>"#;

    #[test]
    fn test_rewrite_removes_text_only() {
        let result = rewrite(CHAPTER, &[Pattern::regex(r"Page\s+\d+")], true).unwrap();

        assert_eq!(result.count, 2);
        assert!(result.text.contains("<title></title>"));
        assert!(result.text.contains("It was a dark night.<br/></p>"));
        // attributes and comments are not text nodes
        assert!(result.text.contains(r#"<p class="Page 3">"#));
        assert!(result.text.contains("<!-- Page 3 -->"));
        assert!(result.text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(result.text.contains(r#"href="../styles/book.css"/>"#));
    }

    #[test]
    fn test_rewrite_without_matches_is_identity() {
        let result = rewrite(CHAPTER, &[Pattern::literal("dragon")], true).unwrap();
        assert_eq!(result.count, 0);
        assert_eq!(result.text, CHAPTER);
    }

    #[test]
    fn test_rewrite_counts_all_nodes() {
        let html = "<div><p>ad</p><p>ad ad</p><span>AD</span></div>";

        let result = rewrite(html, &[Pattern::literal("ad")], true).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.text, "<div><p></p><p> </p><span>AD</span></div>");

        let result = rewrite(html, &[Pattern::literal("ad")], false).unwrap();
        assert_eq!(result.count, 4);
        assert_eq!(result.text, "<div><p></p><p> </p><span></span></div>");
    }

    /// A match never spans two text nodes
    #[test]
    fn test_rewrite_matches_are_node_local() {
        let html = "<p>Pa<b>ge 1</b></p>";
        let result = rewrite(html, &[Pattern::literal("Page 1")], true).unwrap();
        assert_eq!(result.count, 0);
        assert_eq!(result.text, html);
    }

    #[test]
    fn test_rewrite_decodes_character_references() {
        let html = "<p>Tom &amp; Jerry</p><p>a &lt; b, Page 1</p>";
        let patterns = [Pattern::literal("Tom & Jerry"), Pattern::literal("Page 1")];

        let result = rewrite(html, &patterns, true).unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.text, "<p></p><p>a &lt; b, </p>");
    }

    #[test]
    fn test_rewrite_script_and_style() {
        let html = "<style>p::after { content: \"AD\"; }</style><script>var a = \"AD\" < 1;</script>";
        let result = rewrite(html, &[Pattern::literal("AD")], true).unwrap();

        assert_eq!(result.count, 2);
        assert_eq!(
            result.text,
            "<style>p::after { content: \"\"; }</style><script>var a = \"\" < 1;</script>"
        );
    }

    #[test]
    fn test_rewrite_whitespace_only_nodes() {
        let html = "<p>one</p>\n  \n<p>two</p>";
        let result = rewrite(html, &[Pattern::regex(r"\n\s*\n")], true).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.text, "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_rewrite_malformed_html() {
        let html = "<body><p>unclosed <div>Page 2</p></span><li>item</body>";
        let result = rewrite(html, &[Pattern::literal("Page 2")], true).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(
            result.text,
            "<body><p>unclosed <div></p></span><li>item</body>"
        );
    }

    #[test]
    fn test_rewrite_page_number_shorthand() {
        let patterns = PAGE_NUMBER_PATTERNS
            .iter()
            .map(|pattern| Pattern::regex(pattern))
            .collect::<Vec<_>>();
        let set = PatternSet::compile(&patterns, true).unwrap();

        let html = "<p>Story [12] goes on.</p><div class=\"pagenum\"> 12 </div><p>Page 13</p>";
        let result = rewrite_with(html, &set).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(
            result.text,
            "<p>Story  goes on.</p><div class=\"pagenum\"></div><p></p>"
        );
    }

    /// Self-closing raw text elements do not swallow the rest of the document
    #[test]
    fn test_rewrite_self_closing_script() {
        let html = r#"<html><head><script src="a.js"/></head><body><p class="Page 1">Page 1</p></body></html>"#;
        let result = rewrite(html, &[Pattern::literal("Page 1")], true).unwrap();

        assert_eq!(result.count, 1);
        assert_eq!(
            result.text,
            r#"<html><head><script src="a.js"/></head><body><p class="Page 1"></p></body></html>"#
        );
    }

    #[test]
    fn test_rewrite_self_closing_title() {
        let html = r#"<html><head><title/></head><body><p class="x">Tom &amp; Page 1</p><style/><p>Page 1 &amp; more</p><textarea/></body></html>"#;
        let result = rewrite(html, &[Pattern::literal("Page 1")], true).unwrap();

        assert_eq!(result.count, 2);
        assert_eq!(
            result.text,
            r#"<html><head><title/></head><body><p class="x">Tom &amp; </p><style/><p> &amp; more</p><textarea/></body></html>"#
        );
    }

    #[test]
    fn test_rewrite_cdata() {
        let xhtml = "<html><body><script><![CDATA[if (a < b) { show(\"AD\"); }]]></script></body></html>";
        let result = rewrite(xhtml, &[Pattern::literal("AD")], true).unwrap();

        assert_eq!(result.count, 1);
        assert_eq!(
            result.text,
            "<html><body><script><![CDATA[if (a < b) { show(\"\"); }]]></script></body></html>"
        );
    }

    #[test]
    fn test_xml_segments() {
        let xhtml = "<p>Tom &amp; Jerry</p><!-- c -->";
        assert_eq!(
            xml_segments(xhtml).unwrap(),
            vec![
                Segment::Markup(0..3),
                Segment::Text(3..18),
                Segment::Markup(18..22),
                Segment::Markup(22..32),
            ]
        );

        // mismatched end tags and a bare `<` are left to the HTML tokenizer
        assert_eq!(xml_segments("<p><div>x</p>"), None);
        assert_eq!(xml_segments("<script>a < 1;</script>"), None);
    }

    #[test]
    fn test_rewrite_invalid_pattern() {
        let result = rewrite("<p>x</p>", &[Pattern::regex("[")], true);
        assert!(result.is_err());
    }
}
