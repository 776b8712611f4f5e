use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Boundaries, coarsest first, tried by the recursive splitter.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "، ", " "];

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '؟'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Recursive,
    Sentence,
    Paragraph,
}

/// How raw text is cut into chunks. Sizes are measured in characters.
///
/// `overlap_chars` only applies to [`Granularity::Recursive`]: each chunk after
/// the first is prefixed with the tail of its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingPolicy {
    pub granularity: Granularity,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            granularity: Granularity::Recursive,
            max_chars: 512,
            overlap_chars: 60,
        }
    }
}

impl ChunkingPolicy {
    pub fn sentences(max_chars: usize) -> Self {
        Self {
            granularity: Granularity::Sentence,
            max_chars,
            overlap_chars: 0,
        }
    }

    pub fn paragraphs(max_chars: usize) -> Self {
        Self {
            granularity: Granularity::Paragraph,
            max_chars,
            overlap_chars: 0,
        }
    }

    pub fn recursive(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            granularity: Granularity::Recursive,
            max_chars,
            overlap_chars,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_chars == 0 {
            return Err(DomainError::validation("chunk max_chars must be positive"));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(DomainError::validation(format!(
                "chunk overlap ({}) must be less than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }

    /// Splits `text` into trimmed pieces in document order. Pieces without a
    /// single letter or digit (a lone ellipsis, a dash line) are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = match self.granularity {
            Granularity::Sentence => split_sentences(text)
                .into_iter()
                .flat_map(|s| recursive_split(&s, SEPARATORS, self.max_chars))
                .collect(),
            Granularity::Paragraph => pack_paragraphs(text, self.max_chars),
            Granularity::Recursive if self.overlap_chars == 0 => {
                recursive_split(text, SEPARATORS, self.max_chars)
            }
            Granularity::Recursive => {
                let base_max = self
                    .max_chars
                    .saturating_sub(self.overlap_chars + 1)
                    .max(1);
                let pieces = recursive_split(text, SEPARATORS, base_max);
                add_overlap(&pieces, self.overlap_chars, self.max_chars)
            }
        };
        pieces.retain(|piece| has_words(piece));
        pieces
    }
}

fn has_words(piece: &str) -> bool {
    piece.chars().any(char::is_alphanumeric)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        chunks.push(piece.to_string());
    }
}

/// Sentences end at a terminator followed by whitespace or end of text.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = SENTENCE_TERMINATORS.contains(&c)
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences
}

/// Paragraphs are joined until they would exceed `max_chars`, then a new chunk
/// starts. Oversized paragraphs fall back to recursive splitting.
fn pack_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if char_len(paragraph) > max_chars {
            push_trimmed(&mut chunks, &current);
            current.clear();
            chunks.extend(recursive_split(paragraph, &SEPARATORS[1..], max_chars));
            continue;
        }

        let would_exceed =
            !current.is_empty() && char_len(&current) + char_len(paragraph) + 2 > max_chars;
        if would_exceed {
            push_trimmed(&mut chunks, &current);
            current.clear();
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    push_trimmed(&mut chunks, &current);

    chunks
}

fn recursive_split(text: &str, separators: &[&str], max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        let mut out = Vec::new();
        push_trimmed(&mut out, text);
        return out;
    }

    match separators.iter().position(|sep| text.contains(sep)) {
        Some(i) => split_with(text, separators[i], &separators[i + 1..], max_chars),
        None => force_split(text, max_chars),
    }
}

fn split_with(text: &str, separator: &str, rest: &[&str], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for part in text.split(separator) {
        let candidate = if current.is_empty() {
            char_len(part)
        } else {
            char_len(&current) + char_len(separator) + char_len(part)
        };

        if candidate <= max_chars {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(part);
            continue;
        }

        push_trimmed(&mut chunks, &current);
        current.clear();

        if char_len(part) > max_chars {
            chunks.extend(recursive_split(part, rest, max_chars));
        } else {
            current.push_str(part);
        }
    }
    push_trimmed(&mut chunks, &current);

    chunks
}

fn force_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    for window in chars.chunks(max_chars) {
        let piece: String = window.iter().collect();
        push_trimmed(&mut chunks, &piece);
    }
    chunks
}

fn add_overlap(pieces: &[String], overlap_chars: usize, max_chars: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.iter().enumerate() {
        if i == 0 {
            out.push(piece.clone());
            continue;
        }
        let prev = &pieces[i - 1];
        let skip = char_len(prev).saturating_sub(overlap_chars);
        let prefix: String = prev.chars().skip(skip).collect();
        let joined = format!("{prefix} {piece}");
        out.push(joined.chars().take(max_chars).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_granularity() {
        let policy = ChunkingPolicy::sentences(200);
        let chunks = policy.split("The sky is blue. Grass is green.");

        assert_eq!(chunks, vec!["The sky is blue.", "Grass is green."]);
    }

    #[test]
    fn test_sentence_keeps_abbreviation_like_dots_inside() {
        let policy = ChunkingPolicy::sentences(200);
        let chunks = policy.split("Version 1.5 shipped! Did it work? Yes.");

        assert_eq!(chunks, vec!["Version 1.5 shipped!", "Did it work?", "Yes."]);
    }

    #[test]
    fn test_pieces_without_words_are_dropped() {
        let policy = ChunkingPolicy::sentences(200);
        let chunks = policy.split("Chapter one ends here. ... Chapter two begins.\n\n---\n\n🙂");

        assert_eq!(chunks, vec!["Chapter one ends here.", "Chapter two begins."]);
        assert!(ChunkingPolicy::default().split("... --- !!!").is_empty());
    }

    #[test]
    fn test_paragraph_single_chunk() {
        let policy = ChunkingPolicy::paragraphs(100);
        let chunks = policy.split("Hello world.\n\nThis is a test.");

        assert_eq!(chunks, vec!["Hello world.\n\nThis is a test."]);
    }

    #[test]
    fn test_paragraph_multiple_chunks() {
        let policy = ChunkingPolicy::paragraphs(30);
        let chunks = policy.split("First paragraph.\n\nSecond paragraph.\n\nThird paragraph.");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], "Second paragraph.");
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        for policy in [
            ChunkingPolicy::sentences(10),
            ChunkingPolicy::paragraphs(10),
            ChunkingPolicy::recursive(10, 2),
        ] {
            assert!(policy.split("   \n\n ").is_empty());
        }
    }

    #[test]
    fn test_recursive_respects_max_chars_with_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho sigma tau";
        let policy = ChunkingPolicy::recursive(24, 6);
        let chunks = policy.split(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 24, "{chunk:?} too long");
        }
        let tail: String = {
            let first = &chunks[0];
            let skip = first.chars().count().saturating_sub(6);
            first.chars().skip(skip).collect()
        };
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn test_recursive_force_splits_unbroken_text() {
        let text = "x".repeat(25);
        let chunks = ChunkingPolicy::recursive(10, 0).split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "مرحبا بالعالم، هذا نص تجريبي طويل بما يكفي للتقسيم";
        let chunks = ChunkingPolicy::recursive(12, 0).split(text);

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        assert!(ChunkingPolicy::recursive(10, 10).validate().is_err());
        assert!(ChunkingPolicy::recursive(0, 0).validate().is_err());
        assert!(ChunkingPolicy::default().validate().is_ok());
    }
}
