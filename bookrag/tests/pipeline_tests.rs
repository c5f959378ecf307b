//! End-to-end pipeline behavior with mock collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bookrag::{
    AnswerGenerator, AnswerOrigin, EmbeddingProvider, GenerationRequest, LanguageModel,
    QueryRequest, RagConfig, RagError, RagPipeline, Result, RetrievedItem, VectorIndex,
};
use serde_json::{Value, json};

const FALLBACK: &str =
    "AI response unavailable. Showing best matched content from the knowledge base:";
const NO_INFO: &str =
    "The knowledge base does not contain enough information to answer this question.";
const DEGRADED: &str = "I apologize, but I'm having trouble processing your request right now. \
                        Please try again in a moment.";

// ── Mocks ──────────────────────────────────────────────────────────

struct MockEmbedder {
    fail: bool,
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "mock".into(),
                message: "max retries exceeded".into(),
            });
        }
        Ok(vec![text.len() as f32, 1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model(&self) -> &str {
        "mock-embed"
    }
}

enum IndexBehavior {
    Return(Vec<RetrievedItem>),
    Fail,
    Panic,
}

struct MockIndex {
    behavior: IndexBehavior,
    last_query: std::sync::Mutex<Option<(usize, f32)>>,
}

impl MockIndex {
    fn new(behavior: IndexBehavior) -> Self {
        Self { behavior, last_query: std::sync::Mutex::new(None) }
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievedItem>> {
        *self.last_query.lock().unwrap() = Some((top_k, score_threshold));
        match &self.behavior {
            IndexBehavior::Return(items) => Ok(items.clone()),
            IndexBehavior::Fail => Err(RagError::VectorIndexError {
                backend: "mock".into(),
                message: "connection refused".into(),
            }),
            IndexBehavior::Panic => panic!("index exploded"),
        }
    }
}

struct MockModel {
    reply: Option<String>,
    calls: AtomicUsize,
    last_user: std::sync::Mutex<String>,
}

impl MockModel {
    fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            last_user: Default::default(),
        }
    }

    fn failing() -> Self {
        Self { reply: None, calls: AtomicUsize::new(0), last_user: Default::default() }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock().unwrap() = request.user.clone();
        self.reply.clone().ok_or_else(|| RagError::GenerationError {
            provider: "mock".into(),
            message: "429 Quota exceeded".into(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn item(score: f32, payload: Value) -> RetrievedItem {
    RetrievedItem::new(score, payload.as_object().cloned().unwrap_or_default())
}

fn pipeline(embed_fails: bool, index: Arc<MockIndex>, model: Arc<MockModel>) -> RagPipeline {
    RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(MockEmbedder { fail: embed_fails }))
        .vector_index(index)
        .generator(AnswerGenerator::new(model))
        .build()
        .unwrap()
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_results_give_no_information_without_calling_model() {
    let model = Arc::new(MockModel::replying("should not be used"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![])));
    let answer = pipeline(false, index, model.clone()).answer("What is ROS?").await.unwrap();

    assert_eq!(answer.answer.text, NO_INFO);
    assert_eq!(answer.answer.origin, AnswerOrigin::NoInformation);
    assert!(answer.sources.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_payload_text_gives_no_information() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![
        item(0.9, json!({"text": "  ", "source": "ch1.md"})),
        item(0.8, json!({"content": "\n"})),
    ])));
    let answer = pipeline(false, index, model.clone()).answer("q").await.unwrap();

    assert_eq!(answer.answer.text, NO_INFO);
    assert!(answer.sources.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_failure_falls_back_to_numbered_context() {
    let model = Arc::new(MockModel::failing());
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![item(
        0.82,
        json!({"content": "Robots are machines.", "source": "ch1.md"}),
    )])));
    let answer = pipeline(false, index, model).answer("What is a robot?").await.unwrap();

    assert_eq!(answer.answer.origin, AnswerOrigin::Fallback);
    assert_eq!(answer.answer.text, format!("{FALLBACK}\n1. Robots are machines."));
    assert_eq!(answer.sources, ["ch1.md"]);
}

#[tokio::test]
async fn generated_answer_lists_sources_in_result_order() {
    let model = Arc::new(MockModel::replying("  Robots sense and act.  "));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![
        item(0.9, json!({"text": "Robots sense.", "source": "ch1.md"})),
        item(0.7, json!({"text": "Robots act.", "file": "ch2.md"})),
        item(0.5, json!({"text": "Robots learn."})),
    ])));
    let answer = pipeline(false, index, model.clone()).answer("What do robots do?").await.unwrap();

    assert_eq!(answer.answer.origin, AnswerOrigin::Generated);
    assert_eq!(answer.answer.text, "Robots sense and act.");
    assert_eq!(answer.sources, ["ch1.md", "ch2.md", "Unknown"]);

    let user = model.last_user.lock().unwrap().clone();
    assert_eq!(
        user,
        "CONTEXT:\n1. Robots sense.\n\n2. Robots act.\n\n3. Robots learn.\n\n\
         QUESTION:\nWhat do robots do?\n\nFINAL ANSWER:\n"
    );
}

#[tokio::test]
async fn search_uses_configured_top_k_and_threshold() {
    let model = Arc::new(MockModel::replying("ok"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![])));
    let config = RagConfig { top_k: 3, score_threshold: 0.4, ..RagConfig::default() };
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(MockEmbedder { fail: false }))
        .vector_index(index.clone())
        .generator(AnswerGenerator::new(model))
        .build()
        .unwrap();

    pipeline.answer("q").await.unwrap();
    assert_eq!(*index.last_query.lock().unwrap(), Some((3, 0.4)));
}

#[tokio::test]
async fn embedding_failure_fails_the_request() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![])));
    let err = pipeline(true, index.clone(), model).answer("q").await.unwrap_err();

    assert!(matches!(
        err,
        RagError::EmbeddingError { ref message, .. } if message == "max retries exceeded"
    ));
    assert!(index.last_query.lock().unwrap().is_none());
}

/// Fails every call with an error from outside the embedding family.
struct MisconfiguredEmbedder;

#[async_trait]
impl EmbeddingProvider for MisconfiguredEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::PipelineError("embedding backend misconfigured".into()))
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model(&self) -> &str {
        "misconfigured-embed"
    }
}

#[tokio::test]
async fn any_embedding_stage_error_fails_the_request() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![])));
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(MisconfiguredEmbedder))
        .vector_index(index.clone())
        .generator(AnswerGenerator::new(model.clone()))
        .build()
        .unwrap();

    let err = pipeline.answer("What is a robot?").await.unwrap_err();

    let RagError::EmbeddingError { provider, message } = err else {
        panic!("expected an embedding error, got {err:?}");
    };
    assert_eq!(provider, "misconfigured-embed");
    assert!(message.contains("embedding backend misconfigured"));
    assert!(index.last_query.lock().unwrap().is_none());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn index_failure_fails_the_request() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Fail));
    let err = pipeline(false, index, model.clone()).answer("q").await.unwrap_err();

    assert!(matches!(err, RagError::VectorIndexError { .. }));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panic_in_collaborator_gives_degraded_answer() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Panic));
    let answer = pipeline(false, index, model).answer("q").await.unwrap();

    assert_eq!(answer.answer.origin, AnswerOrigin::Degraded);
    assert_eq!(answer.answer.text, DEGRADED);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected_before_embedding() {
    let model = Arc::new(MockModel::replying("unused"));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![])));
    let err = pipeline(false, index.clone(), model).answer("   ").await.unwrap_err();

    assert!(matches!(err, RagError::InvalidQuery(_)));
    assert!(index.last_query.lock().unwrap().is_none());
}

#[tokio::test]
async fn submit_echoes_session_id() {
    let model = Arc::new(MockModel::replying("Robots are machines."));
    let index = Arc::new(MockIndex::new(IndexBehavior::Return(vec![item(
        0.9,
        json!({"content": "Robots are machines.", "source": "ch1.md"}),
    )])));
    let response = pipeline(false, index, model)
        .submit(QueryRequest::new("What is a robot?").with_session_id("abc-123"))
        .await
        .unwrap();

    assert_eq!(response.response, "Robots are machines.");
    assert_eq!(response.sources, ["ch1.md"]);
    assert_eq!(response.session_id.as_deref(), Some("abc-123"));
}

#[test]
fn query_request_deserializes_without_session() {
    let request: QueryRequest = serde_json::from_str(r#"{"query": "What is a robot?"}"#).unwrap();
    assert_eq!(request, QueryRequest::new("What is a robot?"));
}

#[test]
fn builder_requires_every_collaborator() {
    let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(ref m) if m.contains("embedding_provider")));
}
