//! Grounding prompt construction and answer post-processing.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::GenerationRequest;
use crate::error::{AvatarError, Result};
use crate::ports::TextGenerator;

/// Sentence the model must return verbatim when the context is insufficient.
pub const INSUFFICIENT_CONTEXT: &str = "정보가 부족하여 답변하기 어렵습니다.";

/// Shown in place of an answer when generation fails.
pub const APOLOGY: &str = "죄송합니다. 질문에 답변하는 데 문제가 발생했습니다.";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:python|json|text)?").expect("valid fence regex"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"));

/// Builds prompts for one persona and cleans up what the model returns.
#[derive(Debug, Clone)]
pub struct AnswerGenerator {
    persona: String,
}

impl AnswerGenerator {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    pub fn build_context(chunks: &[String]) -> String {
        chunks.join("\n")
    }

    pub fn system_instruction(&self) -> String {
        format!(
            "당신은 AI Stone의 {persona} 아바타입니다.\n\
             제공된 [정보]를 바탕으로 사용자의 질문에 답변하세요.\n\
             만약 제공된 정보만으로는 답변할 수 없다면, '{INSUFFICIENT_CONTEXT}'라고 말하세요.\n\
             답변은 친절하고 간결하게 해주세요.",
            persona = self.persona,
        )
    }

    pub fn build_prompt(context: &str, question: &str) -> String {
        format!("[제공된 정보]:\n{context}\n\n[사용자 질문]:\n{question}")
    }

    pub fn request(&self, question: &str, chunks: &[String]) -> GenerationRequest {
        let context = Self::build_context(chunks);
        GenerationRequest::new(
            Self::build_prompt(&context, question),
            self.system_instruction(),
        )
    }

    /// Full, cleaned answer for `question`. A generation failure is logged
    /// here and returned as [`AvatarError::Generation`]; callers show
    /// [`APOLOGY`] in its place.
    pub async fn answer(
        &self,
        generator: &dyn TextGenerator,
        question: &str,
        chunks: &[String],
    ) -> Result<String> {
        let request = self.request(question, chunks);
        match generator.generate(&request).await {
            Ok(raw) => Ok(clean_answer(&raw)),
            Err(e) => {
                tracing::error!(error = %e, model = generator.model_name(), "generation failed");
                Err(AvatarError::Generation(e.to_string()))
            }
        }
    }
}

/// Removes code-fence markers and bold markup, leaving whitespace alone so
/// streamed fragments still concatenate.
pub fn clean_fragment(text: &str) -> String {
    let without_fences = CODE_FENCE.replace_all(text, "");
    BOLD.replace_all(&without_fences, "$1").into_owned()
}

/// Post-processing for a complete answer.
pub fn clean_answer(text: &str) -> String {
    clean_fragment(text.trim()).trim().to_string()
}
