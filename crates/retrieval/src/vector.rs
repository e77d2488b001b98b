//! Vector math and pgvector text encoding.

/// Cosine distance as pgvector's `<=>` defines it: `1 - cosine_similarity`.
///
/// Mismatched or zero-length vectors are treated as orthogonal (distance 1).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 1.0;
    }

    1.0 - dot / denom
}

/// Render an embedding as a pgvector literal (`[0.1,0.2,...]`), bound as
/// text and cast with `::vector`.
pub fn to_vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}
