//! Brute-force cosine ranking over the knowledge base.

use crate::domain::ScoredChunk;
use crate::services::knowledge::KnowledgeBase;

/// `dot(a, b) / (|a| * |b|)`. Zero vectors and mismatched lengths score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl KnowledgeBase {
    /// Scores every cached chunk, best first. Ties go to the chunk that
    /// appears earlier in the source document.
    pub fn rank(&self, query: &[f32]) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks()
            .iter()
            .zip(self.embeddings())
            .filter(|(_, embedding)| !embedding.is_empty())
            .map(|(chunk, embedding)| {
                ScoredChunk::new(cosine_similarity(query, embedding), chunk.index)
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        scored
    }

    /// Texts of the `k` most similar chunks, most relevant first.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Vec<String> {
        let ranked = self.rank(query);
        ranked
            .into_iter()
            .take(k)
            .filter_map(|hit| {
                self.chunks()
                    .iter()
                    .find(|c| c.index == hit.index)
                    .map(|c| c.text.clone())
            })
            .collect()
    }
}
