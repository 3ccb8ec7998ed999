//! Deterministic stand-ins for the embedding and completion model calls,
//! used by the end-to-end pipeline tests where a real model would make
//! the test nondeterministic and network-dependent.

use std::sync::atomic::{AtomicU32, Ordering};

use sha2::{Digest, Sha256};

/// Hashes `text` into a deterministic vector of `dimension` floats in
/// `[-1.0, 1.0]`. Identical input always produces an identical vector,
/// which is all the chunker/embedder contract (I6) requires of a stand-in.
pub fn fake_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(dimension);
    let mut counter: u64 = 0;
    while out.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for byte in digest {
            if out.len() == dimension {
                break;
            }
            out.push((byte as f32 / 255.0) * 2.0 - 1.0);
        }
        counter += 1;
    }
    out
}

/// A scripted sequence of `(answer, tokens_used)` pairs, returned in order
/// on successive `complete_*` calls, for driving scenarios like S5 where
/// each step of a chat turn must return a specific canned response.
pub struct ScriptedCompletion {
    responses: Vec<(String, u32)>,
    cursor: AtomicU32,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<(String, u32)>) -> Self {
        Self { responses, cursor: AtomicU32::new(0) }
    }

    pub fn next(&self) -> (String, u32) {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
        self.responses
            .get(i)
            .cloned()
            .unwrap_or_else(|| ("".to_string(), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_embedding_is_deterministic() {
        let a = fake_embedding("hello world", 8);
        let b = fake_embedding("hello world", 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn fake_embedding_differs_by_input() {
        assert_ne!(fake_embedding("a", 8), fake_embedding("b", 8));
    }
}
