//! Text chunking for oversized memory content.
//!
//! Long content is split on sentence boundaries and greedily packed into
//! chunks of at most `chunk_size` characters. A sentence that alone exceeds
//! the bound is split on clause punctuation followed by whitespace, and a
//! clause that still exceeds it is packed word by word. A single word
//! longer than `chunk_size` is kept whole in its own chunk.
//!
//! All lengths are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use mnemo::services::chunking::chunk;
//!
//! assert_eq!(chunk("A. B. C.", 100, 0, 1), vec!["A. B. C."]);
//!
//! let chunks = chunk("One two. Three four. Five six.", 10, 0, 1);
//! assert_eq!(chunks, vec!["One two.", "Three", "four.", "Five six."]);
//! ```

use crate::models::MemoryContent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap carried from the previous chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default minimum chunk length; shorter chunks are dropped.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Copy)]
enum Granularity {
    Sentence,
    Clause,
    Word,
}

impl Granularity {
    const fn finer(self) -> Option<Self> {
        match self {
            Self::Sentence => Some(Self::Clause),
            Self::Clause => Some(Self::Word),
            Self::Word => None,
        }
    }

    fn split(self, text: &str) -> Vec<String> {
        match self {
            Self::Sentence => split_after(text, &['.', '!', '?'], true),
            Self::Clause => split_after(text, &[',', ';', ':'], true),
            Self::Word => text.split_whitespace().map(str::to_string).collect(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits after any of `marks`. When `needs_space` is set, a mark only ends a
/// piece if whitespace follows it.
fn split_after(text: &str, marks: &[char], needs_space: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !marks.contains(&c) {
            continue;
        }
        let followed_by_space = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if needs_space && !followed_by_space {
            continue;
        }
        let end = idx + c.len_utf8();
        push_trimmed(&mut pieces, &text[start..end]);
        start = end;
    }
    push_trimmed(&mut pieces, &text[start..]);
    pieces
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
}

/// Greedy packer over one granularity level.
fn pack(pieces: Vec<String>, chunk_size: usize, level: Granularity) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces {
        let len = char_len(&piece);

        if len > chunk_size {
            if let Some(finer) = level.finer() {
                if current_len > 0 {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                chunks.extend(pack(finer.split(&piece), chunk_size, finer));
                continue;
            }
        }

        if current_len == 0 {
            current = piece;
            current_len = len;
        } else if current_len + len + 1 <= chunk_size {
            current.push(' ');
            current.push_str(&piece);
            current_len += len + 1;
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
            current_len = len;
        }
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if n >= len {
        return s;
    }
    let skip = len - n;
    s.char_indices().nth(skip).map_or(s, |(idx, _)| &s[idx..])
}

/// Splits `text` into bounded, optionally overlapping chunks.
///
/// Empty or whitespace-only text yields no chunks. Text of at most
/// `chunk_size` characters is returned as a single chunk, unchanged.
/// Otherwise chunks are packed as described in the module docs, the last
/// `overlap` characters of each chunk are prepended (with a space) to the
/// next one, and chunks shorter than `min_chunk_size` are dropped.
#[must_use]
pub fn chunk(text: &str, chunk_size: usize, overlap: usize, min_chunk_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let packed = pack(
        Granularity::Sentence.split(text),
        chunk_size,
        Granularity::Sentence,
    );

    let overlapped: Vec<String> = if overlap > 0 && packed.len() > 1 {
        packed
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                if i == 0 {
                    chunk.clone()
                } else {
                    format!("{} {chunk}", tail_chars(&packed[i - 1], overlap))
                }
            })
            .collect()
    } else {
        packed
    };

    overlapped
        .into_iter()
        .filter(|c| char_len(c) >= min_chunk_size)
        .collect()
}

/// A chunk of memory content with its position and the non-text fields of
/// the original structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Chunk text.
    pub text: String,
    /// Zero-based position.
    pub chunk_index: usize,
    /// Number of chunks produced.
    pub total_chunks: usize,
    /// Non-text fields copied from structured content.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Chunks memory content, keeping structured fields alongside each chunk.
#[must_use]
pub fn chunk_with_metadata(
    content: &MemoryContent,
    chunk_size: usize,
    overlap: usize,
    min_chunk_size: usize,
) -> Vec<ContentChunk> {
    let chunks = chunk(&content.text(), chunk_size, overlap, min_chunk_size);
    let fields = content.extra_fields();
    let total_chunks = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| ContentChunk {
            text,
            chunk_index,
            total_chunks,
            fields: fields.clone(),
        })
        .collect()
}

/// Chunker carrying its size parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextChunker {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk.
    pub overlap: usize,
    /// Chunks shorter than this are dropped.
    pub min_chunk_size: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
        }
    }
}

impl TextChunker {
    /// Creates a chunker.
    #[must_use]
    pub const fn new(chunk_size: usize, overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_chunk_size,
        }
    }

    /// Returns `true` if `text` is longer than one chunk.
    #[must_use]
    pub fn needs_chunking(&self, text: &str) -> bool {
        char_len(text) > self.chunk_size
    }

    /// Splits text using this chunker's parameters.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk(text, self.chunk_size, self.overlap, self.min_chunk_size)
    }

    /// Splits memory content using this chunker's parameters.
    #[must_use]
    pub fn chunk_with_metadata(&self, content: &MemoryContent) -> Vec<ContentChunk> {
        chunk_with_metadata(content, self.chunk_size, self.overlap, self.min_chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk("A. B. C.", 100, 0, 1), vec!["A. B. C."]);
        assert!(chunk("", 100, 0, 1).is_empty());
        assert!(chunk("   ", 100, 0, 1).is_empty());
    }

    #[test]
    fn test_packs_sentences_greedily() {
        let chunks = chunk("Aaaa. Bbbb. Cccc. Dddd.", 11, 0, 1);
        assert_eq!(chunks, vec!["Aaaa. Bbbb.", "Cccc. Dddd."]);
    }

    #[test]
    fn test_sentence_needs_trailing_whitespace() {
        let chunks = chunk("Version 1.2 is out. It works.", 20, 0, 1);
        assert_eq!(chunks, vec!["Version 1.2 is out.", "It works."]);
    }

    #[test]
    fn test_long_sentence_falls_back_to_clauses() {
        let text = "first clause here, second clause here; third one. Short.";
        let chunks = chunk(text, 20, 0, 1);
        assert_eq!(
            chunks,
            vec!["first clause here,", "second clause here;", "third one.", "Short."]
        );
    }

    #[test]
    fn test_clause_needs_trailing_whitespace() {
        let text = "meeting at 12:30 with the whole infrastructure group today";
        let chunks = chunk(text, 20, 0, 1);
        assert_eq!(
            chunks,
            vec!["meeting at 12:30", "with the whole", "infrastructure group", "today"]
        );
        assert_eq!(chunk("budget of 1,000,000 approved", 12, 0, 1)[1], "1,000,000");
    }

    #[test]
    fn test_long_clause_falls_back_to_words() {
        let chunks = chunk("alpha beta gamma delta epsilon zeta", 12, 0, 1);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon zeta"]);
    }

    #[test]
    fn test_oversized_word_kept_whole() {
        let chunks = chunk("tiny supercalifragilistic word", 8, 0, 1);
        assert_eq!(chunks, vec!["tiny", "supercalifragilistic", "word"]);
    }

    #[test]
    fn test_overlap_prepends_previous_tail() {
        let chunks = chunk("Aaaa. Bbbb. Cccc.", 6, 3, 1);
        assert_eq!(chunks, vec!["Aaaa.", "aa. Bbbb.", "bb. Cccc."]);
    }

    #[test]
    fn test_min_chunk_size_drops_short_chunks() {
        let chunks = chunk("A long first sentence. Hi.", 22, 0, 5);
        assert_eq!(chunks, vec!["A long first sentence."]);
    }

    #[test]
    fn test_long_whitespace_yields_nothing() {
        assert!(chunk("          ", 3, 0, 1).is_empty());
    }

    #[test_case("héllo wörld ünïcode", 11 ; "multibyte")]
    #[test_case("日本語 テキスト です", 7 ; "cjk")]
    fn test_lengths_in_chars(text: &str, chunk_size: usize) {
        let chunks = chunk(text, chunk_size, 2, 1);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= chunk_size + 3);
        }
    }

    #[test]
    fn test_chunk_with_metadata_carries_fields() {
        let content: MemoryContent = serde_json::from_value(json!({
            "text": "One two. Three four. Five six.",
            "speaker": "alice"
        }))
        .unwrap();

        let chunks = chunk_with_metadata(&content, 10, 0, 1);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.total_chunks == 4));
        assert_eq!(chunks[2].chunk_index, 2);
        assert_eq!(chunks[0].fields.get("speaker"), Some(&json!("alice")));

        let json = serde_json::to_value(&chunks[0]).unwrap();
        assert_eq!(json["speaker"], json!("alice"));
        assert_eq!(json["chunk_index"], json!(0));
    }

    #[test]
    fn test_text_chunker_defaults() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.chunk_size, 2000);
        assert_eq!(chunker.overlap, 200);
        assert_eq!(chunker.min_chunk_size, 50);
        assert!(!chunker.needs_chunking("short"));
    }
}
