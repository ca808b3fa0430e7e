//! Splits extracted page text into fixed-size, overlapping character windows
//! for embedding and retrieval.

use serde::{Deserialize, Serialize};

use crate::pdf::PageText;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A chunk of text from a PDF, with source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<source>___<chunk_index>`; unique within a collection.
    pub id: String,
    pub text: String,
    /// File name of the PDF the chunk came from.
    pub source: String,
    /// Index of this chunk within the file (0, 1, 2, …), across all pages.
    pub chunk_index: usize,
    /// 1-based page the chunk was cut from.
    pub page: u32,
}

/// Builds the deterministic chunk id for a file and position.
pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    format!("{source}___{chunk_index}")
}

/// Window size and overlap, validated so that every window advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    size: usize,
    overlap: usize,
}

impl ChunkingOptions {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if size == 0 {
            return Err(ChunkingError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkingError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Collapses every whitespace run (spaces, newlines, tabs) to a single space and trims.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Iterator over the overlapping windows of a normalized text.
///
/// Lengths are counted in `char`s. Window `i` starts at `i * (size - overlap)`;
/// the iterator stops after the first window that reaches the end of the text.
#[derive(Debug)]
pub struct ChunkWindows {
    chars: Vec<char>,
    start: usize,
    opts: ChunkingOptions,
    done: bool,
}

impl Iterator for ChunkWindows {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done || self.start >= self.chars.len() {
            return None;
        }
        let end = (self.start + self.opts.size).min(self.chars.len());
        let window: String = self.chars[self.start..end].iter().collect();
        if end == self.chars.len() {
            self.done = true;
        } else {
            self.start += self.opts.step();
        }
        Some(window)
    }
}

/// Normalizes `text` and splits it into overlapping windows.
pub fn split_into_chunks(text: &str, opts: &ChunkingOptions) -> ChunkWindows {
    ChunkWindows {
        chars: normalize_whitespace(text).chars().collect(),
        start: 0,
        opts: *opts,
        done: false,
    }
}

/// Chunks every page of one file independently. Chunk indices run across the whole file,
/// so ids stay unique even though windows never span a page break.
pub fn chunk_pages(source: &str, pages: &[PageText], opts: &ChunkingOptions) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in split_into_chunks(&page.text, opts) {
            let chunk_index = chunks.len();
            chunks.push(Chunk {
                id: chunk_id(source, chunk_index),
                text,
                source: source.to_string(),
                chunk_index,
                page: page.number,
            });
        }
    }
    chunks
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(size: usize, overlap: usize) -> ChunkingOptions {
        ChunkingOptions::new(size, overlap).unwrap()
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len == 0 {
            0
        } else if len <= size {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\n b\t c  "), "a b c");
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(split_into_chunks("", &opts(10, 2)).count(), 0);
        assert_eq!(split_into_chunks("  \n ", &opts(10, 2)).count(), 0);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let c: Vec<_> = split_into_chunks("The derivative of x^2 is 2x.", &opts(1000, 200)).collect();
        assert_eq!(c, vec!["The derivative of x^2 is 2x.".to_string()]);

        let exact = "a".repeat(10);
        let c: Vec<_> = split_into_chunks(&exact, &opts(10, 3)).collect();
        assert_eq!(c, vec![exact]);
    }

    #[test]
    fn windows_overlap_exactly_and_cover_text() {
        let text: String = (0..237).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for (size, overlap) in [(10, 0), (10, 3), (50, 49), (100, 20), (236, 1)] {
            let o = opts(size, overlap);
            let chunks: Vec<String> = split_into_chunks(&text, &o).collect();
            assert_eq!(chunks.len(), expected_count(text.len(), size, overlap), "size={size} overlap={overlap}");
            assert!(chunks.iter().all(|c| c.chars().count() <= size));

            let mut rebuilt = chunks[0].clone();
            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].chars().collect();
                let next: Vec<char> = pair[1].chars().collect();
                let suffix: String = prev[prev.len() - overlap..].iter().collect();
                let prefix: String = next[..overlap].iter().collect();
                assert_eq!(suffix, prefix);
                rebuilt.extend(next[overlap..].iter());
            }
            assert_eq!(rebuilt, text);
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "∫".repeat(25);
        let chunks: Vec<String> = split_into_chunks(&text, &opts(10, 5)).collect();
        assert_eq!(chunks.len(), expected_count(25, 10, 5));
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn rerun_is_identical() {
        let text = "Limits, continuity and derivatives. ".repeat(40);
        let o = opts(120, 30);
        let a: Vec<_> = split_into_chunks(&text, &o).collect();
        let b: Vec<_> = split_into_chunks(&normalize_whitespace(&text), &o).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_options() {
        assert_eq!(ChunkingOptions::new(0, 0), Err(ChunkingError::ZeroSize));
        assert_eq!(
            ChunkingOptions::new(10, 10),
            Err(ChunkingError::OverlapTooLarge { size: 10, overlap: 10 })
        );
    }

    #[test]
    fn page_chunks_get_file_wide_ids() {
        let pages = vec![
            PageText { number: 1, text: "x".repeat(15) },
            PageText { number: 2, text: "short".into() },
        ];
        let chunks = chunk_pages("calc.pdf", &pages, &opts(10, 2));
        let ids: Vec<_> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["calc.pdf___0", "calc.pdf___1", "calc.pdf___2"]);
        assert_eq!(chunks[2].page, 2);
        assert_eq!(chunks[2].text, "short");
        assert!(chunks.iter().all(|c| c.source == "calc.pdf"));
    }
}
