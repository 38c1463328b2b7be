pub mod answer;
pub mod avatar;
pub mod chunker;
pub mod knowledge;
pub mod retriever;

pub use answer::AnswerGenerator;
pub use avatar::AvatarService;
pub use knowledge::{KnowledgeBase, KnowledgeStats};
