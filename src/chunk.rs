//! Overlapping, boundary-aware text chunker.
//!
//! Splits normalized document text into windows of at most `chunk_size`
//! characters that overlap by `overlap` characters, preferring to cut at the
//! last newline or space inside the window.
//!
//! # Algorithm
//!
//! 1. Clean the text: unify line endings to `\n`, drop NULs, trim every line,
//!    trim the whole string.
//! 2. From `start = 0`, take the window `[start, min(len, start + chunk_size))`.
//! 3. If the window stops short of the end of the text, move its end back to
//!    the last `\n` or space in the window, but only when that keeps more than
//!    100 characters in the chunk.
//! 4. Emit the trimmed window if it has at least `min_chunk_chars` characters.
//!    Shorter windows are dropped but their span is still consumed.
//! 5. Continue at `end - overlap`; if that would not move forward, continue at
//!    `end` instead.
//! 6. Stop at the end of the text or after [`MAX_CHUNKS`] emitted chunks.
//!
//! All lengths and offsets are in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use ragbox::chunk::chunk_text;
//! use ragbox::config::ChunkingConfig;
//!
//! let text = "word ".repeat(1000);
//! let chunks = chunk_text(&text, &ChunkingConfig::default());
//! assert_eq!(chunks.len(), 5);
//! ```

use crate::config::ChunkingConfig;

/// Upper bound on emitted chunks per document.
pub const MAX_CHUNKS: usize = 50_000;

/// A boundary cut must leave more than this many characters in the chunk.
const MIN_CUT_CHARS: usize = 100;

/// An emitted chunk and the window of the cleaned text it came from.
///
/// `start` and `end` are character offsets into [`clean_text`]'s output;
/// `text` is the trimmed window content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Normalize line endings, drop NULs and trim every line.
pub fn clean_text(text: &str) -> String {
    let normalized = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "");
    normalized
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split `text` into ordered chunk strings.
pub fn chunk_text(text: &str, params: &ChunkingConfig) -> Vec<String> {
    chunk_spans(text, params)
        .into_iter()
        .map(|span| span.text)
        .collect()
}

/// Split `text` into ordered chunks, keeping their window offsets.
pub fn chunk_spans(text: &str, params: &ChunkingConfig) -> Vec<ChunkSpan> {
    chunk_spans_capped(text, params, MAX_CHUNKS)
}

fn chunk_spans_capped(text: &str, params: &ChunkingConfig, max_chunks: usize) -> Vec<ChunkSpan> {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = cleaned.chars().collect();
    let n = chars.len();
    let size = params.chunk_size.max(1);
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < n {
        let mut end = n.min(start + size);
        if end < n {
            if let Some(cut) = last_break(&chars, start, end) {
                if cut > start + MIN_CUT_CHARS {
                    end = cut;
                }
            }
        }

        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if trimmed.chars().count() >= params.min_chunk_chars {
            spans.push(ChunkSpan {
                start,
                end,
                text: trimmed.to_string(),
            });
            if spans.len() >= max_chunks {
                tracing::warn!(
                    chunks = spans.len(),
                    remaining_chars = n - end,
                    "chunk limit reached, dropping the rest of the document"
                );
                break;
            }
        }

        if end >= n {
            break;
        }
        let next = end.saturating_sub(params.overlap);
        start = if next > start { next } else { end };
    }

    spans
}

/// Position of the last newline or space in `chars[start..end]`.
fn last_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    chars[start..end]
        .iter()
        .rposition(|&c| c == '\n' || c == ' ')
        .map(|pos| start + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize, min_chunk_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            min_chunk_chars,
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
        assert!(chunk_text(" \r\n\t \n ", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_text_below_minimum_is_dropped() {
        let text = "a".repeat(39);
        assert!(chunk_text(&text, &ChunkingConfig::default()).is_empty());
        let text = "a".repeat(40);
        assert_eq!(chunk_text(&text, &ChunkingConfig::default()).len(), 1);
    }

    #[test]
    fn test_small_text_single_chunk() {
        let text = "Hello, world! This sentence is long enough to keep.";
        let chunks = chunk_text(text, &ChunkingConfig::default());
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_clean_text_normalizes_lines() {
        let cleaned = clean_text("  first line  \r\nsecond\rthird\0 \n\n   ");
        assert_eq!(cleaned, "first line\nsecond\nthird");
    }

    #[test]
    fn test_five_thousand_chars_yield_five_chunks() {
        let text = "abcd ".repeat(1000);
        let spans = chunk_spans(&text, &ChunkingConfig::default());
        assert_eq!(spans.len(), 5);
        assert_eq!(spans[0].start, 0);
        for pair in spans.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            assert!(cur.start < prev.end, "chunks must overlap");
            assert!(prev.end - cur.start <= 200, "overlap exceeds 200 chars");
        }
    }

    #[test]
    fn test_hard_boundary_without_spaces() {
        let text = "x".repeat(5000);
        let spans = chunk_spans(&text, &ChunkingConfig::default());
        let bounds: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(
            bounds,
            vec![(0, 1200), (1000, 2200), (2000, 3200), (3000, 4200), (4000, 5000)]
        );
    }

    #[test]
    fn test_cut_prefers_last_break() {
        let text = format!("{} {}", "a".repeat(150), "b".repeat(200));
        let spans = chunk_spans(&text, &params(200, 20, 10));
        assert_eq!(spans[0].end, 150);
        assert_eq!(spans[0].text, "a".repeat(150));
    }

    #[test]
    fn test_cut_too_close_to_start_is_ignored() {
        let text = format!("{} {}", "a".repeat(50), "b".repeat(300));
        let spans = chunk_spans(&text, &params(200, 20, 10));
        assert_eq!(spans[0].end, 200);
    }

    #[test]
    fn test_spans_cover_whole_text() {
        let text = (0..400)
            .map(|i| format!("Sentence number {} about retrieval.", i))
            .collect::<Vec<_>>()
            .join("\n");
        let cleaned = clean_text(&text);
        let n = cleaned.chars().count();
        let spans = chunk_spans(&text, &params(500, 80, 10));
        assert_eq!(spans.first().unwrap().start, 0);
        assert_eq!(spans.last().unwrap().end, n);
        for pair in spans.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between chunks");
            assert!(pair[1].start > pair[0].start, "no forward progress");
        }
    }

    #[test]
    fn test_forward_progress_when_cut_is_within_overlap() {
        // A break at 150 with overlap 200 would move start backwards.
        let text = format!("{} {}", "a".repeat(150), "b".repeat(3000));
        let spans = chunk_spans(&text, &params(1200, 200, 40));
        for pair in spans.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
        assert_eq!(spans.last().unwrap().end, 3151);
    }

    #[test]
    fn test_chunk_cap() {
        let text = "y".repeat(1000);
        let spans = chunk_spans_capped(&text, &params(50, 0, 10), 3);
        assert_eq!(spans.len(), 3);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "héllo wörld ┌──┐ ".repeat(300);
        let chunks = chunk_text(&text, &params(120, 20, 10));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 120);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(500);
        let c1 = chunk_spans(&text, &ChunkingConfig::default());
        let c2 = chunk_spans(&text, &ChunkingConfig::default());
        assert_eq!(c1, c2);
    }
}
