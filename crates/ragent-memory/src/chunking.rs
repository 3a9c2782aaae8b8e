use ragent_core::{RagentError, RagentResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A bounded slice of a source document, annotated with its origin.
///
/// Produced only by [`TextChunker::chunk_document`]; every chunk of one
/// document carries the same `total_chunks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The trimmed chunk text.
    pub content: String,
    /// Identifier of the source document (its file name on ingestion).
    pub source_id: String,
    /// Zero-based position of this chunk within its document.
    pub chunk_index: usize,
    /// Number of chunks the document produced.
    pub total_chunks: usize,
}

/// Splits text into overlapping segments, preferring natural boundaries.
///
/// Sizes are measured in Unicode scalar values, not bytes, so a cut never
/// lands inside a multi-byte character.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. `overlap` must be strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> RagentResult<Self> {
        if chunk_size == 0 {
            return Err(RagentError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagentError::Config(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, non-empty, whitespace-trimmed chunks.
    ///
    /// Each window of `chunk_size` characters is cut at the last paragraph
    /// break, else the last sentence end (`". "`), else the last space inside
    /// the window; with none of those the raw cut is kept. The next window
    /// starts `overlap` characters before the cut, and always strictly after
    /// the previous start.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.windows(&chars)
            .into_iter()
            .filter_map(|window| {
                let piece: String = chars[window].iter().collect();
                let trimmed = piece.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect()
    }

    /// Character ranges of the windows [`TextChunker::split`] cuts, before
    /// trimming. Whitespace-only windows are included.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let chars: Vec<char> = text.chars().collect();
        self.windows(&chars)
    }

    fn windows(&self, chars: &[char]) -> Vec<Range<usize>> {
        let len = chars.len();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < len {
            let proposed_end = start + self.chunk_size;
            let end = if proposed_end < len {
                snap_boundary(chars, start, proposed_end)
            } else {
                len
            };
            windows.push(start..end);

            if end >= len {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        windows
    }

    /// Split a whole document and annotate every piece with its position.
    pub fn chunk_document(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let pieces = self.split(text);
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Chunk {
                content,
                source_id: source_id.to_string(),
                chunk_index,
                total_chunks,
            })
            .collect()
    }
}

/// Pick the cut position for the window `[start, proposed_end)`.
fn snap_boundary(chars: &[char], start: usize, proposed_end: usize) -> usize {
    const BOUNDARIES: [&[char]; 3] = [&['\n', '\n'], &['.', ' '], &[' ']];

    for pattern in BOUNDARIES {
        if let Some(pos) = rfind(chars, start, proposed_end, pattern) {
            return pos + pattern.len();
        }
    }
    proposed_end
}

/// Last occurrence of `pattern` lying entirely inside `[start, end)` and
/// beginning strictly after `start`.
fn rfind(chars: &[char], start: usize, end: usize, pattern: &[char]) -> Option<usize> {
    if end < start + pattern.len() {
        return None;
    }
    (start + 1..=end - pattern.len())
        .rev()
        .find(|&i| chars[i..i + pattern.len()] == *pattern)
}
