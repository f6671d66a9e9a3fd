//! Embedding input construction and vector utilities.
//!
//! Concrete embedding providers (OpenAI, Ollama, fastembed, the local
//! hash embedder) live in the `repo-intake` app crate. This module holds
//! the pure pieces they share: the text fed to a provider for each chunk,
//! vector serialization, similarity, and the feature-hashing function
//! behind the offline provider.

use sha2::{Digest, Sha256};

use crate::models::CodeChunk;

/// Text embedded for a chunk: type, optional name, path, then content.
///
/// ```rust
/// use repo_intake_core::chunk::ChunkExtractor;
/// use repo_intake_core::embedding::embedding_input;
///
/// let chunks = ChunkExtractor::default().extract(
///     "src/math.ts",
///     Some("typescript"),
///     "export function add(a, b) {\n  return a + b;\n}\n",
/// );
/// let input = embedding_input(&chunks[0]);
/// assert!(input.starts_with("function add src/math.ts\n"));
/// ```
pub fn embedding_input(chunk: &CodeChunk) -> String {
    match &chunk.metadata.name {
        Some(name) => format!(
            "{} {} {}\n{}",
            chunk.chunk_type, name, chunk.metadata.path, chunk.content
        ),
        None => format!("{} {}\n{}", chunk.chunk_type, chunk.metadata.path, chunk.content),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Scale a vector to unit length in place. Zero vectors are left as is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Split text into lowercase word features, including camelCase parts.
fn features(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.is_empty() {
            continue;
        }
        out.push(word.to_lowercase());

        let mut part = String::new();
        let mut parts = Vec::new();
        for c in word.chars() {
            if (c.is_uppercase() || c == '_') && !part.is_empty() {
                parts.push(std::mem::take(&mut part));
            }
            if c != '_' {
                part.extend(c.to_lowercase());
            }
        }
        if !part.is_empty() {
            parts.push(part);
        }
        if parts.len() > 1 {
            out.extend(parts);
        }
    }
    out
}

/// Deterministic feature-hashing embedding.
///
/// Each word feature is hashed with SHA-256 into one of `dims` buckets with
/// a hash-derived sign; the result is L2-normalized. Texts sharing
/// vocabulary have positive cosine similarity.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    if dims == 0 {
        return v;
    }
    for feature in features(text) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[index] += sign;
    }
    l2_normalize(&mut v);
    v
}
