//! Retrieval-augmented answer chain

use crate::{
    embed::Embedder,
    index::VectorStore,
    llm::{GenerationRequest, Generator},
    retrieve::{DenseRetriever, RetrievalResult, DEFAULT_TOP_K},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Korean prompt asking for two filming locations, answered only from context
pub const DEFAULT_TEMPLATE: &str = "주어진 맥락을 사용하여 질문에 답변하세요.
사용자가 입력한 드라마 제목에서 촬영장소 2개를 출력해주세요.
맥락에 없는 내용은 답변하지 마세요.

{format_instructions}

맥락:
{context}

질문: {input}";

/// Answer returned when [`EmptyContextPolicy::ReturnEmpty`] skips the model
pub const EMPTY_ANSWER: &str = "[]";

const PLACEHOLDERS: [&str; 3] = ["{format_instructions}", "{context}", "{input}"];

/// What to do when retrieval finds nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Call the model anyway with an empty context section
    #[default]
    Invoke,
    /// Skip the model and answer with an empty list
    ReturnEmpty,
}

/// Prompt template with `{format_instructions}`, `{context}` and `{input}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Create a template; it must reference `{context}` and `{input}`
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for required in ["{context}", "{input}"] {
            if !template.contains(required) {
                return Err(Error::InvalidConfig(format!(
                    "prompt template is missing {required}"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Raw template text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill the slots in one pass, so slot-like text inside values is kept as is
    #[must_use]
    pub fn render(&self, format_instructions: &str, context: &str, input: &str) -> String {
        let values = [format_instructions, context, input];
        let mut out = String::with_capacity(
            self.template.len() + values.iter().map(|v| v.len()).sum::<usize>(),
        );

        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match PLACEHOLDERS.iter().position(|p| tail.starts_with(p)) {
                Some(i) => {
                    out.push_str(values[i]);
                    rest = &tail[PLACEHOLDERS[i].len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Instructions describing the expected JSON answer
#[must_use]
pub fn format_instructions() -> String {
    let fields = [
        ("장소", "string", "영화/드라마 촬영 장소의 이름"),
        ("주소", "string", "영화/드라마 촬영 장소의 주소"),
        ("장면_설명", "string", "해당 장소에서 촬영된 영화/드라마 장면의 상세 설명"),
        ("장소_설명", "string", "촬영 장소 상세 설명"),
        ("위도", "number", "위도"),
        ("경도", "number", "경도"),
    ];

    let mut out = String::from(
        "답변은 아래 키를 가진 JSON 객체들의 리스트로만 출력하세요. 다른 설명은 붙이지 마세요.\n",
    );
    for (key, kind, description) in fields {
        out.push_str(&format!("- \"{key}\" ({kind}): {description}\n"));
    }
    out.push_str("예시: [{\"장소\": \"...\", \"주소\": \"...\", \"장면_설명\": \"...\", \"장소_설명\": \"...\", \"위도\": 37.5, \"경도\": 127.0}]");
    out
}

/// Join retrieved chunk texts into the context section
#[must_use]
pub fn assemble_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Model answer together with the chunks it was grounded on
#[derive(Debug, Clone)]
pub struct ChainResponse {
    /// Raw model output
    pub answer: String,
    /// Retrieved chunks, best first
    pub context: Vec<RetrievalResult>,
}

/// Retrieve-then-generate chain: one model call per query, output returned verbatim
pub struct RetrievalChain<E: Embedder, G: Generator> {
    retriever: DenseRetriever<E>,
    generator: G,
    template: PromptTemplate,
    instructions: String,
    policy: EmptyContextPolicy,
    temperature: f32,
    max_tokens: usize,
}

impl<E: Embedder, G: Generator> RetrievalChain<E, G> {
    /// Retrieve the context chunks for a query
    pub fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query)
    }

    /// Render the prompt sent to the model
    #[must_use]
    pub fn build_prompt(&self, query: &str, context: &[RetrievalResult]) -> String {
        self.template
            .render(&self.instructions, &assemble_context(context), query)
    }

    /// Answer a query, keeping the retrieved context
    pub fn answer_with_context(&self, query: &str) -> Result<ChainResponse> {
        let context = self.retrieve(query)?;
        for hit in &context {
            tracing::debug!(
                source = hit.chunk.metadata.source.as_deref().unwrap_or("-"),
                score = hit.score,
                "retrieved chunk"
            );
        }

        if context.is_empty() && self.policy == EmptyContextPolicy::ReturnEmpty {
            tracing::info!(query, "no context retrieved; skipping model call");
            return Ok(ChainResponse {
                answer: EMPTY_ANSWER.to_string(),
                context,
            });
        }

        let request = GenerationRequest::new(self.build_prompt(query, &context))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let answer = self.generator.generate(&request)?;

        tracing::info!(
            query,
            chunks = context.len(),
            model = self.generator.model_id(),
            "generated answer"
        );
        Ok(ChainResponse { answer, context })
    }

    /// Answer a query with the model's raw text
    pub fn answer(&self, query: &str) -> Result<String> {
        self.answer_with_context(query).map(|r| r.answer)
    }

    /// Get the retriever
    #[must_use]
    pub fn retriever(&self) -> &DenseRetriever<E> {
        &self.retriever
    }

    /// Get the generator
    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Empty-context policy in effect
    #[must_use]
    pub fn empty_context_policy(&self) -> EmptyContextPolicy {
        self.policy
    }
}

/// Builder for [`RetrievalChain`]
pub struct RetrievalChainBuilder<E: Embedder, G: Generator> {
    embedder: Option<E>,
    generator: Option<G>,
    store: Option<VectorStore>,
    top_k: usize,
    policy: EmptyContextPolicy,
    template: PromptTemplate,
    temperature: f32,
    max_tokens: usize,
}

impl<E: Embedder, G: Generator> RetrievalChainBuilder<E, G> {
    /// Create a new chain builder
    #[must_use]
    pub fn new() -> Self {
        let defaults = GenerationRequest::new("");
        Self {
            embedder: None,
            generator: None,
            store: None,
            top_k: DEFAULT_TOP_K,
            policy: EmptyContextPolicy::default(),
            template: PromptTemplate::default(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Set the embedder
    #[must_use]
    pub fn embedder(mut self, embedder: E) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the generator
    #[must_use]
    pub fn generator(mut self, generator: G) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the vector store
    #[must_use]
    pub fn vector_store(mut self, store: VectorStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the number of chunks retrieved per query
    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the empty-context policy
    #[must_use]
    pub fn empty_context_policy(mut self, policy: EmptyContextPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the prompt template
    #[must_use]
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the output token limit
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the chain
    pub fn build(self) -> Result<RetrievalChain<E, G>> {
        let embedder = self
            .embedder
            .ok_or_else(|| Error::InvalidConfig("embedder required".to_string()))?;

        let generator = self
            .generator
            .ok_or_else(|| Error::InvalidConfig("generator required".to_string()))?;

        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be at least 1".to_string()));
        }

        let store = self
            .store
            .unwrap_or_else(|| VectorStore::for_model(embedder.dimension(), embedder.model_id()));

        if store.config().dimension != embedder.dimension() {
            return Err(Error::DimensionMismatch {
                expected: store.config().dimension,
                actual: embedder.dimension(),
            });
        }

        Ok(RetrievalChain {
            retriever: DenseRetriever::new(store, embedder).with_top_k(self.top_k),
            generator,
            template: self.template,
            instructions: format_instructions(),
            policy: self.policy,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

impl<E: Embedder, G: Generator> Default for RetrievalChainBuilder<E, G> {
    fn default() -> Self {
        Self::new()
    }
}
