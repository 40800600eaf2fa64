//! Pattern Matcher
//!
//! Removes literal strings or regular expression matches from a single piece
//! of text and counts how many occurrences were removed. The markup rewriter
//! runs this once per text node, so a match never spans two nodes.
//!
//! Patterns are compiled once into a [PatternSet] and then applied to every
//! text node of every chapter in a job.
//!
//! ```rust
//! # fn main() -> Result<(), epub_scrub::error::ScrubError> {
//! use epub_scrub::{pattern::remove_patterns, types::Pattern};
//!
//! let result = remove_patterns("FOO bar foo BAR", &[Pattern::literal("foo")], false)?;
//! assert_eq!(result.text, " bar  BAR");
//! assert_eq!(result.count, 2);
//! # Ok(())
//! # }
//! ```

use log::debug;
use regex::{NoExpand, Regex, RegexBuilder};

use crate::{
    error::ScrubError,
    types::{MatchResult, Pattern},
    utils::preview,
};

/// Built-in expressions used by `--remove-page-numbers`
///
/// - `Page 12` style running headers
/// - a text node holding nothing but a number
/// - bracketed numbers such as `[12]`
pub const PAGE_NUMBER_PATTERNS: [&str; 3] = [r"Page\s+\d+", r"^\s*\d+\s*$", r"\[\s*\d+\s*\]"];

enum Matcher {
    Literal(String),

    /// Needle already lower-cased with [fold_char_wise]
    FoldedLiteral(String),

    Regex(Regex),
}

struct CompiledPattern {
    source: String,
    matcher: Matcher,
}

impl CompiledPattern {
    fn apply(&self, text: &str) -> MatchResult {
        match &self.matcher {
            Matcher::Literal(needle) => remove_literal(text, needle),
            Matcher::FoldedLiteral(needle) => remove_literal_case_insensitive(text, needle),
            Matcher::Regex(regex) => remove_regex(text, regex),
        }
    }
}

/// An ordered list of compiled patterns
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compiles patterns for repeated use
    ///
    /// # Return
    /// - `Ok(PatternSet)`: every pattern compiled
    /// - `Err(ScrubError::PatternError)`: a regular expression is invalid
    pub fn compile(patterns: &[Pattern], case_sensitive: bool) -> Result<Self, ScrubError> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let matcher = if pattern.is_regex {
                let regex = RegexBuilder::new(&pattern.text)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|source| ScrubError::PatternError {
                        pattern: pattern.text.clone(),
                        source,
                    })?;
                Matcher::Regex(regex)
            } else if case_sensitive {
                Matcher::Literal(pattern.text.clone())
            } else {
                Matcher::FoldedLiteral(fold_char_wise(&pattern.text))
            };

            compiled.push(CompiledPattern {
                source: pattern.text.clone(),
                matcher,
            });
        }

        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Removes every pattern from `text`, one pattern after another
    ///
    /// Each pattern sees the text as left by the previous ones, so the
    /// order of the patterns matters.
    pub fn apply(&self, text: &str) -> MatchResult {
        let mut current = MatchResult::unchanged(text);

        for pattern in &self.patterns {
            let result = pattern.apply(&current.text);
            if result.count > 0 {
                debug!(
                    "  Removed {} occurrences of: {}",
                    result.count,
                    preview(&pattern.source, 30)
                );
                current.text = result.text;
                current.count += result.count;
            }
        }

        current
    }
}

/// Removes all patterns from a text and counts the removed occurrences
///
/// Convenience form of [PatternSet::compile] followed by [PatternSet::apply].
pub fn remove_patterns(
    text: &str,
    patterns: &[Pattern],
    case_sensitive: bool,
) -> Result<MatchResult, ScrubError> {
    Ok(PatternSet::compile(patterns, case_sensitive)?.apply(text))
}

fn remove_literal(text: &str, needle: &str) -> MatchResult {
    if needle.is_empty() {
        return MatchResult::unchanged(text);
    }

    let count = text.matches(needle).count();
    if count == 0 {
        return MatchResult::unchanged(text);
    }

    MatchResult {
        text: text.replace(needle, ""),
        count,
    }
}

fn remove_regex(text: &str, regex: &Regex) -> MatchResult {
    // zero-width matches remove nothing, so they are not counted
    let count = regex.find_iter(text).filter(|m| !m.is_empty()).count();
    if count == 0 {
        return MatchResult::unchanged(text);
    }

    MatchResult {
        text: regex.replace_all(text, NoExpand("")).into_owned(),
        count,
    }
}

/// Lower-cases a string one char at a time
///
/// `str::to_lowercase` treats a final sigma specially, which would make the
/// folded needle disagree with the folded text it is searched in.
fn fold_char_wise(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// A lower-cased view of a text that remembers where every byte came from
struct FoldedView {
    folded: String,

    /// For each byte of `folded`, the byte range of the source char
    origins: Vec<(usize, usize)>,
}

impl FoldedView {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut origins = Vec::with_capacity(text.len());

        for (start, ch) in text.char_indices() {
            let end = start + ch.len_utf8();
            for lower in ch.to_lowercase() {
                folded.push(lower);
                origins.resize(folded.len(), (start, end));
            }
        }

        Self { folded, origins }
    }
}

/// Case-insensitive literal removal with an explicit scan
///
/// Occurrences are located in a lower-cased view and cut from the original
/// text at the matching byte ranges, so the casing of everything that is
/// kept survives. Lower-casing may change byte lengths (`İ` becomes two
/// chars), which is why every folded byte maps back to its source char.
///
/// The scan is left to right and non-overlapping: after a cut the search
/// resumes at the cut point, which in the unspliced view is the byte right
/// after the removed occurrence.
fn remove_literal_case_insensitive(text: &str, folded_needle: &str) -> MatchResult {
    if folded_needle.is_empty() {
        return MatchResult::unchanged(text);
    }

    let view = FoldedView::new(text);
    let mut output = String::with_capacity(text.len());
    let mut count = 0;
    // byte offset in `text` up to which the text has been copied or cut
    let mut cursor = 0;
    // byte offset in the folded view where the next search starts
    let mut search_from = 0;

    while let Some(found) = view.folded[search_from..].find(folded_needle) {
        let folded_start = search_from + found;
        let folded_end = folded_start + folded_needle.len();
        search_from = folded_end;

        let start = view.origins[folded_start].0;
        let end = view.origins[folded_end - 1].1;
        if start < cursor {
            // began inside a char that an earlier cut already consumed
            continue;
        }

        output.push_str(&text[cursor..start]);
        cursor = end;
        count += 1;
    }

    if count == 0 {
        return MatchResult::unchanged(text);
    }

    output.push_str(&text[cursor..]);
    MatchResult {
        text: output,
        count,
    }
}
