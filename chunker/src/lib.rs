//! Fixed-width overlapping text segmentation.
//!
//! One function, one contract: given identical input text and identical
//! parameters, the emitted sequence of segments is identical (determinism
//! is the whole point of keeping this as its own crate — it has no
//! dependency on anything that could make it nondeterministic).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_overlap ({overlap}) must be less than chunk_size ({size})")]
    Config { size: usize, overlap: usize },
}

/// One emitted segment: `chunk_num` is dense and 0-based, `char_start`/
/// `char_end` are half-open code-point offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub chunk_num: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Slice `text` into segments `text[p : min(p + chunk_size, len(text))]`,
/// advancing `p` by `chunk_size - chunk_overlap` until `p >= len(text)`.
/// Offsets are counted in code points, not bytes. Empty/whitespace-only
/// input yields zero segments.
pub fn chunk(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Segment>, ChunkError> {
    if chunk_overlap >= chunk_size {
        return Err(ChunkError::Config { size: chunk_size, overlap: chunk_overlap });
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let step = chunk_size - chunk_overlap;

    let mut segments = Vec::new();
    let mut p = 0usize;
    let mut chunk_num = 0u32;

    while p < len {
        let end = (p + chunk_size).min(len);
        let text: String = chars[p..end].iter().collect();
        segments.push(Segment { chunk_num, char_start: p, char_end: end, text });
        chunk_num += 1;
        p += step;
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_gte_size() {
        assert_eq!(chunk("abc", 4, 4), Err(ChunkError::Config { size: 4, overlap: 4 }));
        assert_eq!(chunk("abc", 4, 5), Err(ChunkError::Config { size: 4, overlap: 5 }));
    }

    #[test]
    fn empty_and_whitespace_input_yields_nothing() {
        assert_eq!(chunk("", 10, 2).unwrap(), Vec::new());
        assert_eq!(chunk("   \n\t", 10, 2).unwrap(), Vec::new());
    }

    #[test]
    fn s1_fresh_index_a_txt() {
        let segments = chunk("hello world", 6, 2).unwrap();
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["hello ", "o worl", "rld"]);
        assert_eq!(segments[0].char_start, 0);
        assert_eq!(segments[0].char_end, 6);
        assert_eq!(segments[1].char_start, 4);
        assert_eq!(segments[1].char_end, 10);
        assert_eq!(segments[2].char_start, 8);
        assert_eq!(segments[2].char_end, 11);
    }

    #[test]
    fn s1_fresh_index_b_txt() {
        let segments = chunk("foo bar", 6, 2).unwrap();
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["foo ba", "bar"]);
    }

    #[test]
    fn s2_update_shrinks_to_single_chunk() {
        let segments = chunk("hi", 6, 2).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].chunk_num, 0);
        assert_eq!(segments[0].text, "hi");
    }

    #[test]
    fn determinism_i6() {
        let a = chunk("the quick brown fox jumps over the lazy dog", 10, 3).unwrap();
        let b = chunk("the quick brown fox jumps over the lazy dog", 10, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn offsets_match_source_slice_p6() {
        let text = "the quick brown fox jumps over the lazy dog";
        let segments = chunk(text, 10, 3).unwrap();
        let chars: Vec<char> = text.chars().collect();
        for s in &segments {
            let expected: String = chars[s.char_start..s.char_end].iter().collect();
            assert_eq!(expected, s.text);
            assert!(s.char_start < s.char_end);
            assert!(s.char_end - s.char_start <= 10);
        }
    }

    #[test]
    fn chunk_num_is_dense() {
        let segments = chunk("the quick brown fox jumps over the lazy dog", 10, 3).unwrap();
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.chunk_num, i as u32);
        }
    }

    #[test]
    fn unicode_code_points_not_bytes() {
        let text = "héllo wörld café";
        let segments = chunk(text, 5, 1).unwrap();
        for s in &segments {
            assert!(s.text.chars().count() <= 5);
        }
        let rejoined_len: usize = segments.first().map(|s| s.char_end).unwrap_or(0);
        assert!(rejoined_len <= text.chars().count());
    }
}
