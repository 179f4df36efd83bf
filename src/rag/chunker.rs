//! Text splitting.
//!
//! Two splitters feed the pipeline:
//! - [`split_text`]: overlapping windows with boundary backoff, used when a
//!   document went through text extraction.
//! - [`split_plain`]: fixed windows that avoid breaking mid-word, used for
//!   manual uploads of inline text.

/// Fraction of a window that must be kept before a boundary cut is accepted.
/// Prevents boundary backoff from producing tiny chunks.
const MIN_CUT_RATIO: f32 = 0.8;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Prefers cutting at a paragraph break, then a sentence ending, then a word
/// boundary, before falling back to a hard character cut. Each chunk after
/// the first overlaps the previous window by roughly `chunk_overlap`
/// characters. Empty or whitespace-only input yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end < total {
            find_break(&chars, start, hard_end)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if hard_end >= total {
            break;
        }
        // Advance from the actual cut, not the hard window end, so text
        // between a boundary cut and the next stride is never skipped.
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }

    chunks
}

/// Find the best cut position in `chars[start..hard_end]`, searching
/// backwards but never before `MIN_CUT_RATIO` of the window.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = hard_end - start;
    let min_cut = start + ((window as f32) * MIN_CUT_RATIO) as usize;

    // Paragraph break.
    for i in (min_cut..hard_end.saturating_sub(1)).rev() {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            return i;
        }
    }

    // Sentence ending followed by whitespace.
    for i in (min_cut..hard_end).rev() {
        if matches!(chars[i], '.' | '!' | '?')
            && chars.get(i + 1).is_none_or(|c| c.is_whitespace())
        {
            return i + 1;
        }
    }

    // Word boundary.
    for i in (min_cut..hard_end).rev() {
        if chars[i].is_whitespace() {
            return i;
        }
    }

    hard_end
}

/// A chunk produced by the plain window splitter, with its window ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainChunk {
    pub content: String,
    pub index: usize,
}

/// Split inline content into fixed-size windows without overlap.
///
/// When a window boundary falls strictly inside a word, the cut backtracks to
/// the nearest preceding space, as long as that space is not before 80% of
/// the window. Chunk index counts emitted windows from 0.
pub fn split_plain(text: &str, chunk_size: usize) -> Vec<PlainChunk> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = (start + chunk_size).min(total);

        // Mid-word boundary: backtrack to the last space inside the window.
        if end < total && !chars[end].is_whitespace() && !chars[end - 1].is_whitespace() {
            let min_cut = start + ((chunk_size as f32) * MIN_CUT_RATIO) as usize;
            if let Some(space) = (min_cut..end).rev().find(|&i| chars[i] == ' ') {
                end = space;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            let index = chunks.len();
            chunks.push(PlainChunk {
                content: trimmed.to_string(),
                index,
            });
        }

        // Skip the space we cut at, otherwise resume at the window end.
        start = if end < total && chars[end] == ' ' { end + 1 } else { end };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text("", 100, 20).is_empty());
        assert!(split_text("   \n\n  ", 100, 20).is_empty());
        assert!(split_plain("", 100).is_empty());
    }

    #[test]
    fn short_input_is_a_single_trimmed_chunk() {
        let chunks = split_text("  hello world  ", 100, 20);
        assert_eq!(chunks, vec!["hello world"]);

        let plain = split_plain("  hello world  ", 100);
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].content, "hello world");
        assert_eq!(plain[0].index, 0);
    }

    #[test]
    fn chunks_respect_size_limit() {
        let text = "word ".repeat(200);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta ".repeat(40);
        let chunks = split_text(&text, 120, 40);
        assert!(chunks.len() >= 2);

        // The tail of one window reappears at the head of the next.
        let first_tail: String = chunks[0].chars().rev().take(20).collect();
        let tail: String = first_tail.chars().rev().collect();
        assert!(chunks[1].contains(tail.trim()) || chunks[1].starts_with(tail.trim()));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = format!("{}. {}", "a".repeat(95), "b".repeat(95));
        let chunks = split_text(&text, 100, 0);
        assert!(chunks[0].ends_with('.'), "got: {:?}", chunks[0]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(90), "b".repeat(90));
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks[0], "a".repeat(90));
        assert_eq!(chunks[1], "b".repeat(90));
    }

    #[test]
    fn boundary_cut_loses_no_text() {
        // The sentence cut lands before the hard window end; the next
        // window must pick up right at the cut, not a stride later.
        let text = format!("{}. {}", "a".repeat(95), "b".repeat(95));
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks[1], "b".repeat(95));
    }

    #[test]
    fn zero_overlap_split_preserves_every_character() {
        let text = "alpha beta gamma delta epsilon zeta. ".repeat(30);
        let chunks = split_text(&text, 100, 0);
        let kept: usize = chunks
            .iter()
            .map(|c| c.chars().filter(|ch| !ch.is_whitespace()).count())
            .sum();
        let expected = text.chars().filter(|ch| !ch.is_whitespace()).count();
        assert_eq!(kept, expected);
    }

    #[test]
    fn plain_split_backtracks_to_space() {
        // The window boundary at 20 falls inside "eeeee"; the space at 18
        // sits past 80% of the window, so the cut moves there.
        let text = "aaaa bbbb cccc ddd eeeee";
        let chunks = split_plain(text, 20);
        assert_eq!(chunks[0].content, "aaaa bbbb cccc ddd");
        assert_eq!(chunks[1].content, "eeeee");
    }

    #[test]
    fn plain_split_hard_cuts_long_words() {
        // No space past 80% of the window: the cut stays at the boundary.
        let text = "ab supercalifragilistic";
        let chunks = split_plain(text, 10);
        assert_eq!(chunks[0].content, "ab superca");
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn plain_split_indexes_are_sequential() {
        let text = "x".repeat(250);
        let chunks = split_plain(&text, 100);
        let indexes: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn plain_split_indexes_do_not_repeat_after_backtrack() {
        // A backtracked cut shortens the first window; the second window
        // still gets the next ordinal.
        let chunks = split_plain("aaaa bbbb cccc ddd eeeee", 20);
        let indexes: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn plain_split_round_trips_content() {
        // Lossless reconstruction modulo the whitespace cut points.
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_plain(text, 16);
        let rejoined = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, text);
    }
}
