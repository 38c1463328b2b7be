use serde::{Deserialize, Serialize};

/// A contiguous span of the knowledge document. `index` is its position in
/// the chunker output and survives embedding-failure filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}
