//! Text normalization and recursive character chunking.
//!
//! [`preprocess`] is applied to every chunk before it is indexed and to
//! every query before it is searched, so both sides of the similarity
//! search see the same whitespace.
//!
//! [`chunk_text`] splits a document on the coarsest separator that keeps
//! pieces under `chunk_size` characters (paragraphs, then lines, then
//! words, then characters) and merges neighbouring pieces back together
//! with roughly `chunk_overlap` characters shared between chunks.

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Collapse every whitespace run into a single space and trim both ends.
///
/// ```rust
/// use ragchat::chunk::preprocess;
///
/// assert_eq!(preprocess("a\n\n  b"), "a b");
/// assert_eq!(preprocess(&preprocess("  x \t y ")), "x y");
/// ```
pub fn preprocess(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into preprocessed chunks of at most `chunk_size` characters.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let splitter = Splitter {
        chunk_size: chunk_size.max(1),
        chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
    };

    splitter
        .split(text, &SEPARATORS)
        .iter()
        .map(|c| preprocess(c))
        .filter(|c| !c.is_empty())
        .collect()
}

struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = &separators[(idx + 1).min(separators.len())..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Greedily join small pieces into chunks, carrying a tail of up to
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                let doc = window.join(separator);
                let doc = doc.trim();
                if !doc.is_empty() {
                    docs.push(doc.to_string());
                }

                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let first = window.remove(0);
                    let dropped = char_len(first) + if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped);
                    if window.is_empty() {
                        total = 0;
                        break;
                    }
                }
            }

            window.push(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }

        let doc = window.join(separator);
        let doc = doc.trim();
        if !doc.is_empty() {
            docs.push(doc.to_string());
        }

        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_collapses_runs() {
        assert_eq!(preprocess("a\n\n  b"), "a b");
        assert_eq!(preprocess("\t lead and trail \n"), "lead and trail");
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess(" \n\t "), "");
    }

    #[test]
    fn test_preprocess_idempotent() {
        let samples = [
            "plain",
            "  spaced   out  ",
            "line one\nline two\r\n\r\nline three",
            "tabs\tand\u{00a0}nbsp",
        ];
        for s in samples {
            let once = preprocess(s);
            assert_eq!(preprocess(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 200, 50);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", 200, 50).is_empty());
        assert!(chunk_text("   \n\n  ", 200, 50).is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..60)
            .map(|i| format!("Sentence number {} talks about opening hours.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 200, 50);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 200, "chunk too long: {}", c.len());
        }
    }

    #[test]
    fn test_chunks_overlap() {
        let text = (0..40)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 40, 15);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected '{}' to carry into '{}'",
                last_word,
                pair[1]
            );
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let chunks = chunk_text(text, 30, 0);
        assert_eq!(
            chunks,
            vec![
                "First paragraph is here.".to_string(),
                "Second paragraph is here.".to_string()
            ]
        );
    }

    #[test]
    fn test_chunks_are_preprocessed() {
        let text = "line one\nline   two\n\n\tline three";
        for c in chunk_text(text, 200, 50) {
            assert_eq!(c, preprocess(&c));
        }
    }

    #[test]
    fn test_long_word_split_by_characters() {
        let text = "x".repeat(450);
        let chunks = chunk_text(&text, 200, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 200));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma.\n\nDelta epsilon.\nZeta eta theta iota kappa.";
        assert_eq!(chunk_text(text, 20, 5), chunk_text(text, 20, 5));
    }
}
