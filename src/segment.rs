//! Content segmentation for read-aloud playback.
//!
//! Parses a rich-text (HTML-ish) document into an ordered sequence of
//! addressable word tokens while preserving all markup and whitespace
//! verbatim. The token sequence is what the speech engine voices; the
//! display markup is what the host renders, with each word wrapped in a
//! highlightable span when highlighting is enabled.

use crate::error::ReadAloudError;

/// Default ceiling on extractable text length, in characters.
///
/// Most host speech engines refuse (or silently truncate) utterances above
/// roughly 32 K characters. Content beyond this must be rejected before any
/// synthesis is attempted.
pub const DEFAULT_MAX_TEXT_LEN: usize = 32_767;

/// CSS class applied to highlightable word spans.
pub const WORD_SPAN_CLASS: &str = "ra-word";

/// An atomic unit of text that is both spoken and independently
/// highlightable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    /// Dense 0-based position in the document's word sequence.
    pub index: usize,

    /// The word text exactly as it appears in the content.
    pub text: String,
}

/// The result of segmenting one content document.
///
/// Immutable once produced — a content change discards the whole value and
/// re-segments from scratch.
#[derive(Debug, Clone)]
pub struct SegmentedContent {
    /// Ordered word tokens extracted from text nodes.
    pub tokens: Vec<WordToken>,

    /// Markup for display. Byte-identical to the input when highlighting is
    /// disabled; otherwise each word is wrapped in a span carrying a
    /// `data-word-index` attribute that the highlight surface addresses.
    pub display_markup: String,

    /// Length of the speakable text (tokens joined by single spaces).
    pub text_len: usize,
}

impl SegmentedContent {
    /// Verify that this content can be voiced.
    ///
    /// Signals [`ReadAloudError::NoContent`] for an empty token sequence and
    /// [`ReadAloudError::ContentTooLarge`] when the speakable text exceeds
    /// `max_text_len`. Called by the controller before any synthesis is
    /// attempted.
    pub fn check(&self, max_text_len: usize) -> Result<(), ReadAloudError> {
        if self.tokens.is_empty() {
            return Err(ReadAloudError::NoContent);
        }
        if self.text_len > max_text_len {
            return Err(ReadAloudError::ContentTooLarge {
                len: self.text_len,
                max: max_text_len,
            });
        }
        Ok(())
    }

    /// Number of word tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no speakable text was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Build the utterance text for the token slice starting at `start`.
    ///
    /// Tokens are joined with single spaces — intra-word markup and original
    /// whitespace runs are display concerns, not speech concerns.
    #[must_use]
    pub fn utterance_from(&self, start: usize) -> String {
        let mut out = String::new();
        for token in self.tokens.iter().skip(start) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token.text);
        }
        out
    }
}

/// Segment `content` into word tokens and display markup.
///
/// Only text nodes are segmented; anything between `<` and `>` is treated
/// as markup and passed through unmodified. Whitespace runs between words
/// are preserved verbatim so visual spacing and line breaks are unaffected.
///
/// When `highlight_enabled` is `false` the returned display markup is
/// byte-identical to the input (no wrapping at all), guaranteeing zero
/// formatting regression while highlighting is off.
///
/// Segmentation is deterministic: identical input always yields identical
/// tokens and markup.
#[must_use]
pub fn segment(content: &str, highlight_enabled: bool) -> SegmentedContent {
    let mut tokens: Vec<WordToken> = Vec::new();
    let mut display = String::with_capacity(content.len() + content.len() / 2);

    let mut chars = content.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c == '<' {
            // Markup — copy verbatim through the closing '>'. If the tag
            // never closes, the remainder of the document is markup.
            let rest = &content[start..];
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            display.push_str(&rest[..end]);
            advance_bytes(&mut chars, end);
        } else if c.is_whitespace() {
            // Whitespace run — preserved verbatim, never tokenized.
            let rest = &content[start..];
            let end = rest
                .find(|ch: char| !ch.is_whitespace())
                .unwrap_or(rest.len());
            display.push_str(&rest[..end]);
            advance_bytes(&mut chars, end);
        } else {
            // Word run — everything up to the next whitespace or tag.
            let rest = &content[start..];
            let end = rest
                .find(|ch: char| ch.is_whitespace() || ch == '<')
                .unwrap_or(rest.len());
            let word = &rest[..end];

            let index = tokens.len();
            if highlight_enabled {
                display.push_str("<span class=\"");
                display.push_str(WORD_SPAN_CLASS);
                display.push_str("\" data-word-index=\"");
                display.push_str(&index.to_string());
                display.push_str("\">");
                display.push_str(word);
                display.push_str("</span>");
            } else {
                display.push_str(word);
            }

            tokens.push(WordToken {
                index,
                text: word.to_string(),
            });
            advance_bytes(&mut chars, end);
        }
    }

    // Speakable length: token texts joined by single spaces.
    let text_len = if tokens.is_empty() {
        0
    } else {
        tokens.iter().map(|t| t.text.chars().count()).sum::<usize>() + tokens.len() - 1
    };

    // With highlighting off the display must be the input, byte for byte.
    let display_markup = if highlight_enabled {
        display
    } else {
        content.to_string()
    };

    SegmentedContent {
        tokens,
        display_markup,
        text_len,
    }
}

// ── Internal helpers ───────────────────────────────────────────────

/// Advance a `char_indices` iterator by `n` bytes.
fn advance_bytes(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, n: usize) {
    let mut consumed = 0;
    while consumed < n {
        match chars.next() {
            Some((_, c)) => consumed += c.len_utf8(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_simple_paragraph() {
        let result = segment("<p>Hello world</p>", true);
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(result.tokens[0].text, "Hello");
        assert_eq!(result.tokens[0].index, 0);
        assert_eq!(result.tokens[1].text, "world");
        assert_eq!(result.tokens[1].index, 1);
    }

    #[test]
    fn wraps_words_in_indexed_spans() {
        let result = segment("<p>Hello world</p>", true);
        assert_eq!(
            result.display_markup,
            "<p><span class=\"ra-word\" data-word-index=\"0\">Hello</span> \
             <span class=\"ra-word\" data-word-index=\"1\">world</span></p>"
        );
    }

    #[test]
    fn disabled_highlighting_is_byte_identical() {
        let input = "<p>Hello   world</p>\n<img src=\"a.png\">";
        let result = segment(input, false);
        assert_eq!(result.display_markup, input);
        // Tokens are still extracted for speech.
        assert_eq!(result.tokens.len(), 2);
    }

    #[test]
    fn markup_passes_through_unmodified() {
        let input = "<h2 class=\"title\">Hi</h2><img src=\"x.png\"/>";
        let result = segment(input, true);
        assert!(result.display_markup.starts_with("<h2 class=\"title\">"));
        assert!(result.display_markup.contains("<img src=\"x.png\"/>"));
        assert_eq!(result.tokens.len(), 1);
    }

    #[test]
    fn whitespace_runs_preserved_verbatim() {
        let input = "a  b\n\tc";
        let result = segment(input, true);
        assert_eq!(result.tokens.len(), 3);
        // The exact whitespace must survive between the spans.
        assert!(result.display_markup.contains("</span>  <span"));
        assert!(result.display_markup.contains("</span>\n\t<span"));
    }

    #[test]
    fn text_conservation() {
        // Stripping the injected spans from the display markup must
        // reconstruct the original visible text exactly.
        let input = "<p>One two</p>  three\nfour";
        let with = segment(input, true);
        let without = segment(input, false);

        let stripped = with.display_markup.replace("</span>", "");
        let mut rebuilt = String::new();
        let mut rest = stripped.as_str();
        while let Some(open) = rest.find("<span class=\"ra-word\"") {
            rebuilt.push_str(&rest[..open]);
            let close = rest[open..].find('>').expect("span opens") + open + 1;
            rest = &rest[close..];
        }
        rebuilt.push_str(rest);
        assert_eq!(rebuilt, without.display_markup);
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let input = "<p>Same <b>input</b> twice</p>";
        let a = segment(input, true);
        let b = segment(input, true);
        assert_eq!(a.tokens, b.tokens);
        assert_eq!(a.display_markup, b.display_markup);
    }

    #[test]
    fn empty_and_whitespace_only_content() {
        assert!(segment("", true).is_empty());
        assert!(segment("   \n\t ", true).is_empty());
        assert!(segment("<p></p><br/>", true).is_empty());

        let err = segment("", true).check(DEFAULT_MAX_TEXT_LEN).unwrap_err();
        assert!(matches!(err, ReadAloudError::NoContent));
    }

    #[test]
    fn oversized_content_fails_check() {
        let body = "word ".repeat(10_000); // ~50 000 speakable chars
        let result = segment(&body, false);
        assert!(result.text_len > DEFAULT_MAX_TEXT_LEN);

        let err = result.check(DEFAULT_MAX_TEXT_LEN).unwrap_err();
        assert!(matches!(err, ReadAloudError::ContentTooLarge { .. }));
        // A generous ceiling accepts the same content.
        assert!(result.check(usize::MAX).is_ok());
    }

    #[test]
    fn utterance_from_offsets() {
        let result = segment("one two three four", false);
        assert_eq!(result.utterance_from(0), "one two three four");
        assert_eq!(result.utterance_from(2), "three four");
        assert_eq!(result.utterance_from(4), "");
    }

    #[test]
    fn unclosed_tag_is_treated_as_markup() {
        let result = segment("text <unclosed", true);
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].text, "text");
        assert!(result.display_markup.ends_with("<unclosed"));
    }

    #[test]
    fn multibyte_text_segments_cleanly() {
        let result = segment("<p>héllo wörld — 日本語</p>", true);
        let texts: Vec<&str> = result.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["héllo", "wörld", "—", "日本語"]);
    }
}
