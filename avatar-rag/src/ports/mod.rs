pub mod embed;
pub mod generate;

pub use embed::EmbeddingGenerator;
pub use generate::TextGenerator;
