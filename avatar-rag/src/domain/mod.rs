pub mod answer;
pub mod chunk;
pub mod profile;
pub mod search;

pub use answer::{AnswerEvent, GenerationRequest};
pub use chunk::Chunk;
pub use profile::{AgentManifest, AgentProfile};
pub use search::ScoredChunk;
