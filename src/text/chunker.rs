//! Boundary-aware text chunking with fixed overlap.
//!
//! Offsets are character positions, so multi-byte text never splits inside a
//! code point. Each span's `content` is the exact source slice, which keeps
//! the overlap between neighbours byte-identical.

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// A contiguous slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub content: String,
    /// Inclusive start, in characters.
    pub start_pos: usize,
    /// Exclusive end, in characters.
    pub end_pos: usize,
    /// Ordinal among the emitted spans.
    pub index: usize,
}

impl TextSpan {
    pub fn len(&self) -> usize {
        self.end_pos - self.start_pos
    }

    pub fn is_empty(&self) -> bool {
        self.end_pos == self.start_pos
    }
}

pub fn validate_chunk_params(chunk_size: usize, overlap: usize) -> Result<(), ApiError> {
    if chunk_size == 0 {
        return Err(ApiError::bad_request("chunk_size must be greater than zero"));
    }
    if overlap >= chunk_size {
        return Err(ApiError::BadRequest(format!(
            "chunk overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Splits `text` into overlapping spans of at most `chunk_size` characters.
///
/// Breaks prefer the last sentence terminator, then the last paragraph break,
/// found before `chunk_size - overlap` and past the window midpoint; otherwise
/// the window is cut at `chunk_size`. Whitespace-only spans are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextSpan>, ApiError> {
    validate_chunk_params(chunk_size, overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < total {
        let end = if total - start <= chunk_size {
            total
        } else {
            find_break(&chars, start, chunk_size, overlap)
        };

        let content: String = chars[start..end].iter().collect();
        if !content.trim().is_empty() {
            spans.push(TextSpan {
                content,
                start_pos: start,
                end_pos: end,
                index: spans.len(),
            });
        }

        if end >= total {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    Ok(spans)
}

fn find_break(chars: &[char], start: usize, chunk_size: usize, overlap: usize) -> usize {
    let search_end = start + chunk_size - overlap;
    let midpoint = start + chunk_size / 2;

    let sentence = (start..search_end)
        .rev()
        .find(|&i| SENTENCE_TERMINATORS.contains(&chars[i]));
    if let Some(pos) = sentence.filter(|&pos| pos > midpoint) {
        return pos + 1;
    }

    let paragraph = (start..search_end.saturating_sub(1))
        .rev()
        .find(|&i| chars[i] == '\n' && chars[i + 1] == '\n');
    if let Some(pos) = paragraph.filter(|&pos| pos > midpoint) {
        return pos + 2;
    }

    start + chunk_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(total_chars: usize) -> String {
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < total_chars {
            text.push_str(&format!("Sentence {:03} explains the humanoid arm setup. ", i));
            i += 1;
        }
        text.chars().take(total_chars).collect()
    }

    fn assert_overlap(spans: &[TextSpan], overlap: usize) {
        for pair in spans.windows(2) {
            let left: Vec<char> = pair[0].content.chars().collect();
            let right: Vec<char> = pair[1].content.chars().collect();
            assert_eq!(pair[1].start_pos, pair[0].end_pos - overlap);
            assert_eq!(left[left.len() - overlap..], right[..overlap]);
        }
    }

    #[test]
    fn book_page_splits_at_sentence_boundary() {
        let text = sentences(1500);

        let spans = chunk_text(&text, 1000, 200).unwrap();

        assert_eq!(spans.len(), 2);
        let first = &spans[0];
        assert_eq!(first.start_pos, 0);
        assert!((650..=1000).contains(&first.end_pos), "end_pos = {}", first.end_pos);
        assert!(first.content.ends_with('.'));
        assert_eq!(spans[1].start_pos, first.end_pos - 200);
        assert_eq!(spans[1].end_pos, 1500);
    }

    #[test]
    fn adjacent_spans_share_exact_overlap_and_cover_input() {
        let text = sentences(5000);
        let spans = chunk_text(&text, 400, 80).unwrap();

        assert!(spans.len() > 5);
        assert_overlap(&spans, 80);
        assert_eq!(spans.first().map(|s| s.start_pos), Some(0));
        assert_eq!(spans.last().map(|s| s.end_pos), Some(5000));
        for span in &spans {
            assert!(span.end_pos > span.start_pos);
            assert!(span.len() <= 400);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = sentences(3000);
        assert_eq!(
            chunk_text(&text, 500, 100).unwrap(),
            chunk_text(&text, 500, 100).unwrap()
        );
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let spans = chunk_text("The motor draws 2A at stall.", 1000, 200).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_pos, 0);
        assert_eq!(spans[0].end_pos, 28);
        assert_eq!(spans[0].index, 0);
    }

    #[test]
    fn input_of_exactly_chunk_size_is_one_chunk() {
        let text = "a".repeat(100);
        assert_eq!(chunk_text(&text, 100, 10).unwrap().len(), 1);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
        assert!(chunk_text("   \n  ", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn falls_back_to_paragraph_break() {
        let first = "word ".repeat(14);
        let text = format!("{}\n\n{}", first.trim_end(), "x".repeat(200));

        let spans = chunk_text(&text, 100, 10).unwrap();

        assert_eq!(spans[0].end_pos, first.trim_end().chars().count() + 2);
        assert_overlap(&spans, 10);
    }

    #[test]
    fn falls_back_to_hard_cut_without_boundaries() {
        let text = "x".repeat(250);
        let spans = chunk_text(&text, 100, 20).unwrap();

        let bounds: Vec<(usize, usize)> = spans.iter().map(|s| (s.start_pos, s.end_pos)).collect();
        assert_eq!(bounds, vec![(0, 100), (80, 180), (160, 250)]);
    }

    #[test]
    fn early_terminator_before_midpoint_is_ignored() {
        let text = format!("Short. {}", "y".repeat(300));
        let spans = chunk_text(&text, 100, 20).unwrap();
        assert_eq!(spans[0].end_pos, 100);
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let text = "ロボットの関節は動く。".repeat(40);
        let spans = chunk_text(&text, 50, 10).unwrap();

        assert!(spans.len() > 1);
        assert_overlap(&spans, 10);
        assert_eq!(spans.last().map(|s| s.end_pos), Some(text.chars().count()));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(matches!(chunk_text("abc", 10, 10), Err(ApiError::BadRequest(_))));
        assert!(matches!(chunk_text("abc", 0, 0), Err(ApiError::BadRequest(_))));
    }
}
