use serde::Serialize;

/// Similarity of one cached chunk to a query, computed per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub index: usize,
}

impl ScoredChunk {
    pub const fn new(score: f32, index: usize) -> Self {
        Self { score, index }
    }
}
