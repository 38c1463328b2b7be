//! Per-request orchestration: embed the question, retrieve context, answer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::domain::AnswerEvent;
use crate::error::{AvatarError, Result};
use crate::ports::{EmbeddingGenerator, TextGenerator};
use crate::services::answer::{AnswerGenerator, clean_fragment};
use crate::services::knowledge::KnowledgeBase;

/// Fixed user-facing strings. Error details only ever go to the log.
pub mod messages {
    pub const EMPTY_QUESTION: &str = "질문을 입력해주세요.";
    pub const NOT_READY: &str = "지식 베이스가 초기화되지 않았습니다. 잠시 후 다시 시도해주세요.";
    pub const APOLOGY: &str = crate::services::answer::APOLOGY;
    pub const QUESTION_EMBEDDING_FAILED: &str = "질문 임베딩 생성 실패";
    pub const STREAM_FAILED: &str = "답변 생성 중 오류가 발생했습니다.";
}

const STREAM_BUFFER: usize = 32;

pub struct AvatarService {
    knowledge: Arc<KnowledgeBase>,
    embedder: Arc<dyn EmbeddingGenerator>,
    generator: Arc<dyn TextGenerator>,
    answerer: AnswerGenerator,
    top_k: usize,
}

impl AvatarService {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        embedder: Arc<dyn EmbeddingGenerator>,
        generator: Arc<dyn TextGenerator>,
        top_k: usize,
    ) -> Self {
        let persona = knowledge.profile().map_or(
            crate::domain::profile::DEFAULT_PERSONALITY,
            crate::domain::AgentProfile::personality,
        );
        let answerer = AnswerGenerator::new(persona);

        Self {
            knowledge,
            embedder,
            generator,
            answerer,
            top_k,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// The active profile as JSON, or `{}` when no manifest was loaded.
    pub fn agent_info(&self) -> serde_json::Value {
        self.knowledge
            .profile()
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or_else(|| serde_json::json!({}))
    }

    /// Trims the question and checks the service can answer it. Runs before
    /// any capability call.
    pub fn validate(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AvatarError::EmptyQuestion);
        }
        if !self.knowledge.is_ready() {
            return Err(AvatarError::NotReady);
        }
        Ok(question.to_string())
    }

    async fn retrieve_context(&self, question: &str) -> Result<Vec<String>> {
        let embedding = self.embedder.embed(question).await?;
        if embedding.is_empty() {
            return Err(AvatarError::Embedding(
                "empty embedding for question".to_string(),
            ));
        }

        let chunks = self.knowledge.retrieve(&embedding, self.top_k);
        tracing::debug!(retrieved = chunks.len(), top_k = self.top_k, "retrieved context");
        Ok(chunks)
    }

    /// Full answer. Validation, question-embedding and generation failures
    /// are all returned as errors for the caller to render.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let question = self.validate(question)?;
        let chunks = self.retrieve_context(&question).await?;
        self.answerer
            .answer(self.generator.as_ref(), &question, &chunks)
            .await
    }

    /// Starts a streamed answer. Validation errors are returned before the
    /// stream exists; everything after that is reported as stream events.
    ///
    /// Dropping the returned stream stops the producer at its next send.
    pub fn ask_stream(self: &Arc<Self>, question: &str) -> Result<ReceiverStream<AnswerEvent>> {
        let question = self.validate(question)?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let service = Arc::clone(self);

        tokio::spawn(
            async move { service.drive_stream(question, tx).await }
                .instrument(tracing::Span::current()),
        );

        Ok(ReceiverStream::new(rx))
    }

    async fn drive_stream(&self, question: String, tx: mpsc::Sender<AnswerEvent>) {
        let chunks = match self.retrieve_context(&question).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!(error = %e, "question embedding failed");
                let _ = tx
                    .send(AnswerEvent::error(messages::QUESTION_EMBEDDING_FAILED))
                    .await;
                return;
            }
        };

        let request = self.answerer.request(&question, &chunks);
        let (fragment_tx, mut fragment_rx) = mpsc::channel::<String>(STREAM_BUFFER);
        let generator = Arc::clone(&self.generator);
        let upstream =
            tokio::spawn(async move { generator.generate_stream(&request, fragment_tx).await });

        let mut full = String::new();
        while let Some(fragment) = fragment_rx.recv().await {
            if fragment.is_empty() {
                continue;
            }
            let cleaned = clean_fragment(&fragment);
            full.push_str(&cleaned);

            if tx.send(AnswerEvent::delta(cleaned, full.clone())).await.is_err() {
                tracing::info!("client went away, abandoning stream");
                upstream.abort();
                return;
            }
        }

        let outcome = match upstream.await {
            Ok(result) => result,
            Err(e) => Err(AvatarError::Generation(format!("stream task failed: {e}"))),
        };

        let last = match outcome {
            Ok(()) => AnswerEvent::complete(full),
            Err(e) => {
                tracing::error!(error = %e, model = self.generator.model_name(), "streaming generation failed");
                AnswerEvent::error(messages::STREAM_FAILED)
            }
        };
        let _ = tx.send(last).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentProfile, Chunk, GenerationRequest};
    use async_trait::async_trait;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AxisEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingGenerator for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Ok(Vec::new());
            }
            Ok(if text.contains("founded") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    struct FragmentGenerator {
        fragments: Vec<&'static str>,
        fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl FragmentGenerator {
        fn new(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FragmentGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some() {
                return Err(AvatarError::Generation("quota exceeded".to_string()));
            }
            Ok(self.fragments.concat())
        }

        async fn generate_stream(
            &self,
            _request: &GenerationRequest,
            tx: mpsc::Sender<String>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (i, fragment) in self.fragments.iter().enumerate() {
                if self.fail_after == Some(i) {
                    return Err(AvatarError::Generation("stream reset".to_string()));
                }
                if tx.send((*fragment).to_string()).await.is_err() {
                    return Ok(());
                }
            }
            Ok(())
        }

        fn model_name(&self) -> &str {
            "fragments"
        }
    }

    fn ready_kb() -> Arc<KnowledgeBase> {
        let profile = AgentProfile::new("stone").with_personality("차분한");
        Arc::new(
            KnowledgeBase::from_parts(
                Some(profile),
                vec![
                    Chunk::new(0, "Stone was founded in 2021."),
                    Chunk::new(1, "Stone builds avatars."),
                ],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap(),
        )
    }

    fn service(
        kb: Arc<KnowledgeBase>,
        embed_fails: bool,
        generator: FragmentGenerator,
    ) -> (Arc<AvatarService>, Arc<AxisEmbedder>, Arc<FragmentGenerator>) {
        let embedder = Arc::new(AxisEmbedder {
            calls: AtomicUsize::new(0),
            fail: embed_fails,
        });
        let generator = Arc::new(generator);
        let service = Arc::new(AvatarService::new(
            kb,
            embedder.clone(),
            generator.clone(),
            1,
        ));
        (service, embedder, generator)
    }

    #[tokio::test]
    async fn test_empty_question_rejected_without_calls() {
        let (svc, embedder, generator) =
            service(ready_kb(), false, FragmentGenerator::new(vec!["x"]));

        assert!(matches!(svc.ask("   ").await, Err(AvatarError::EmptyQuestion)));
        assert!(matches!(svc.ask_stream(""), Err(AvatarError::EmptyQuestion)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_ready_rejected_without_calls() {
        let (svc, embedder, generator) = service(
            Arc::new(KnowledgeBase::empty()),
            false,
            FragmentGenerator::new(vec!["x"]),
        );

        assert!(matches!(svc.ask("hello").await, Err(AvatarError::NotReady)));
        assert!(matches!(svc.ask_stream("hello"), Err(AvatarError::NotReady)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_returns_cleaned_answer() {
        let (svc, _, _) = service(
            ready_kb(),
            false,
            FragmentGenerator::new(vec!["```text\n", "**2021**", "\n```"]),
        );
        assert_eq!(svc.ask("When was Stone founded?").await.unwrap(), "2021");
    }

    #[tokio::test]
    async fn test_ask_surfaces_question_embedding_failure() {
        let (svc, _, generator) = service(ready_kb(), true, FragmentGenerator::new(vec!["x"]));
        assert!(matches!(
            svc.ask("When was Stone founded?").await,
            Err(AvatarError::Embedding(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_surfaces_generation_failure() {
        let mut generator = FragmentGenerator::new(vec!["x"]);
        generator.fail_after = Some(0);
        let (svc, _, generator) = service(ready_kb(), false, generator);

        assert!(matches!(
            svc.ask("When was Stone founded?").await,
            Err(AvatarError::Generation(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_emits_cumulative_events_then_terminator() {
        let (svc, _, _) = service(
            ready_kb(),
            false,
            FragmentGenerator::new(vec!["Hi", " there", "!"]),
        );

        let events: Vec<AnswerEvent> = svc.ask_stream("hello").unwrap().collect().await;

        assert_eq!(
            events,
            vec![
                AnswerEvent::delta("Hi", "Hi"),
                AnswerEvent::delta(" there", "Hi there"),
                AnswerEvent::delta("!", "Hi there!"),
                AnswerEvent::complete("Hi there!"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_with_no_fragments_still_terminates() {
        let (svc, _, _) = service(ready_kb(), false, FragmentGenerator::new(vec![]));
        let events: Vec<AnswerEvent> = svc.ask_stream("hello").unwrap().collect().await;
        assert_eq!(events, vec![AnswerEvent::complete("")]);
    }

    #[tokio::test]
    async fn test_stream_cleans_each_fragment() {
        let (svc, _, _) = service(
            ready_kb(),
            false,
            FragmentGenerator::new(vec!["**Hi**", "", " ```json"]),
        );
        let events: Vec<AnswerEvent> = svc.ask_stream("hello").unwrap().collect().await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::delta("Hi", "Hi"),
                AnswerEvent::delta(" ", "Hi "),
                AnswerEvent::complete("Hi "),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_embedding_failure_is_error_event() {
        let (svc, _, _) = service(ready_kb(), true, FragmentGenerator::new(vec!["x"]));
        let events: Vec<AnswerEvent> = svc.ask_stream("hello").unwrap().collect().await;
        assert_eq!(
            events,
            vec![AnswerEvent::error(messages::QUESTION_EMBEDDING_FAILED)]
        );
    }

    #[tokio::test]
    async fn test_stream_generation_failure_after_partial_output() {
        let mut generator = FragmentGenerator::new(vec!["Hi", " there"]);
        generator.fail_after = Some(1);
        let (svc, _, _) = service(ready_kb(), false, generator);

        let events: Vec<AnswerEvent> = svc.ask_stream("hello").unwrap().collect().await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::delta("Hi", "Hi"),
                AnswerEvent::error(messages::STREAM_FAILED),
            ]
        );
    }

    #[tokio::test]
    async fn test_dropping_stream_does_not_panic() {
        let (svc, _, _) = service(
            ready_kb(),
            false,
            FragmentGenerator::new(vec!["a"; 500]),
        );
        let mut stream = svc.ask_stream("hello").unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first, AnswerEvent::delta("a", "a"));
        drop(stream);

        // The service stays usable for other requests.
        let answer = svc.ask("hello").await.unwrap();
        assert_eq!(answer.len(), 500);
    }

    #[test]
    fn test_agent_info_falls_back_to_empty_object() {
        let (svc, _, _) = service(
            Arc::new(KnowledgeBase::empty()),
            false,
            FragmentGenerator::new(vec![]),
        );
        assert_eq!(svc.agent_info(), serde_json::json!({}));

        let (svc, _, _) = service(ready_kb(), false, FragmentGenerator::new(vec![]));
        assert_eq!(svc.agent_info()["id"], "stone");
        assert_eq!(svc.agent_info()["personality"], "차분한");
    }
}
