//! Integration tests for feelko

use feelko::{
    chunk::{chunk_records, Chunker, RecursiveChunker},
    embed::{Embedder, HashingEmbedder},
    format::{format_answer, parse_answer, ParsedAnswer},
    index::VectorStore,
    ingest::{CsvLoader, SourceKind, WebLoader},
    llm::{GenerationRequest, Generator},
    pipeline::{EmptyContextPolicy, RetrievalChainBuilder},
    session::{ChatSession, SessionState},
    Error, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const LOCATIONS: &str = "\
일련번호,미디어유형,제목명,장소명,장소유형,관련장소설명,주소,위치위도,위치경도
1,drama,슬기로운 의사생활,율제병원,병원,주인공들이 근무하는 병원,서울 송파구 올림픽로,37.52,127.11
2,drama,슬기로운 의사생활,가평 캠핑장,야외,밴드 합주 장면,경기 가평군,37.83,127.51
3,drama,도깨비,주문진 방파제,해변,도깨비와 은탁이 처음 만나는 곳,강원 강릉시 주문진읍,37.89,128.83
4,movie,기생충,돼지쌀슈퍼,상점,기택 가족이 자주 가는 슈퍼,서울 마포구,37.55,126.95
";

/// Generator double that answers with the place names found in the prompt
struct ContextEcho {
    calls: AtomicUsize,
}

impl ContextEcho {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Generator for ContextEcho {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let places: Vec<String> = request
            .prompt
            .lines()
            .filter_map(|line| line.strip_prefix("장소명: "))
            .take(2)
            .map(|place| format!(r#"{{"장소":"{place}","주소":"맥락 참조","장면_설명":"-","장소_설명":"-"}}"#))
            .collect();
        Ok(format!("```json\n[{}]\n```", places.join(",")))
    }

    fn model_id(&self) -> &str {
        "context-echo"
    }
}

struct Unavailable;

impl Generator for Unavailable {
    fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(Error::Generation("503 Service Unavailable".to_string()))
    }

    fn model_id(&self) -> &str {
        "unavailable"
    }
}

fn build_store(embedder: &HashingEmbedder) -> VectorStore {
    let (size, overlap) = SourceKind::Csv.default_chunking();
    let chunker = RecursiveChunker::new(size, overlap).unwrap();
    let records = CsvLoader::new()
        .records(LOCATIONS.as_bytes(), "locations.csv")
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let chunks = chunk_records(&chunker, records)
        .collect::<Result<Vec<_>>>()
        .unwrap();
    let mut store = VectorStore::for_model(embedder.dimension(), embedder.model_id());
    store.insert_batch(embedder.embed_chunks(chunks).unwrap()).unwrap();
    store
}

#[test]
fn test_end_to_end_csv_to_formatted_answer() {
    let embedder = HashingEmbedder::new(256);
    let store = build_store(&embedder);
    assert_eq!(store.len(), 4);

    let chain = RetrievalChainBuilder::new()
        .embedder(embedder)
        .generator(ContextEcho::new())
        .vector_store(store)
        .top_k(2)
        .build()
        .expect("Failed to build chain");

    let response = chain.answer_with_context("슬기로운 의사생활").unwrap();
    assert_eq!(response.context.len(), 2);
    for hit in &response.context {
        assert_eq!(hit.chunk.metadata.title.as_deref(), Some("슬기로운 의사생활"));
    }

    let rendered = format_answer(&response.answer);
    assert!(rendered.contains("=== 결과 1 ==="));
    assert!(rendered.contains("=== 결과 2 ==="));
    assert!(rendered.contains("장소: 율제병원") || rendered.contains("장소: 가평 캠핑장"));
    assert!(!rendered.contains("주문진"));
}

#[test]
fn test_persisted_collection_answers_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = HashingEmbedder::new(256);
    build_store(&embedder)
        .persist(dir.path(), "documents")
        .unwrap();

    let store = VectorStore::load(dir.path(), "documents", 256, embedder.model_id()).unwrap();
    let chain = RetrievalChainBuilder::new()
        .embedder(embedder)
        .generator(ContextEcho::new())
        .vector_store(store)
        .build()
        .unwrap();

    let ParsedAnswer::Locations(locations) = parse_answer(&chain.answer("도깨비").unwrap()) else {
        panic!("expected structured answer");
    };
    assert_eq!(locations[0].place.as_deref(), Some("주문진 방파제"));
}

#[test]
fn test_reload_with_other_embedder_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = HashingEmbedder::new(256);
    build_store(&embedder)
        .persist(dir.path(), "documents")
        .unwrap();

    let other = HashingEmbedder::new(128);
    let result = VectorStore::load(dir.path(), "documents", other.dimension(), other.model_id());
    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));

    let result = VectorStore::load(dir.path(), "documents", 256, "text-embedding-004");
    assert!(matches!(result, Err(Error::ModelMismatch { .. })));
}

#[test]
fn test_chat_session_over_chain() {
    let embedder = HashingEmbedder::new(256);
    let store = build_store(&embedder);
    let chain = RetrievalChainBuilder::new()
        .embedder(embedder)
        .generator(ContextEcho::new())
        .vector_store(store)
        .build()
        .unwrap();

    let mut session = ChatSession::new();
    assert_eq!(session.state(), SessionState::Empty);
    assert_eq!(session.example_prompts().len(), 3);

    let answer = |query: &str| chain.answer(query).map(|raw| format_answer(&raw));

    session.submit("", answer).unwrap();
    assert_eq!(session.state(), SessionState::Empty);
    assert_eq!(chain.generator().calls.load(Ordering::SeqCst), 0);

    session.submit("슬기로운 의사생활", answer).unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.len(), 1);

    session.submit("기생충", answer).unwrap();
    let latest = session.history().next().unwrap();
    assert_eq!(latest.query, "기생충");
    assert!(latest.answer.starts_with("=== 결과 1 ==="));
    assert_eq!(chain.generator().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_generation_failure_keeps_session() {
    let embedder = HashingEmbedder::new(64);
    let store = build_store(&embedder);
    let chain = RetrievalChainBuilder::new()
        .embedder(embedder)
        .generator(Unavailable)
        .vector_store(store)
        .build()
        .unwrap();

    let mut session = ChatSession::new();
    assert!(matches!(
        session.submit("도깨비", |q| chain.answer(q).map(|raw| format_answer(&raw))),
        Err(Error::Generation(_))
    ));
    assert_eq!(session.state(), SessionState::Empty);
}

#[test]
fn test_empty_collection_policies() {
    let invoke = RetrievalChainBuilder::new()
        .embedder(HashingEmbedder::new(64))
        .generator(ContextEcho::new())
        .build()
        .unwrap();
    assert_eq!(format_answer(&invoke.answer("도깨비").unwrap()), "");
    assert_eq!(invoke.generator().calls.load(Ordering::SeqCst), 1);

    let skip = RetrievalChainBuilder::new()
        .embedder(HashingEmbedder::new(64))
        .generator(ContextEcho::new())
        .empty_context_policy(EmptyContextPolicy::ReturnEmpty)
        .build()
        .unwrap();
    assert_eq!(skip.answer("도깨비").unwrap(), "[]");
    assert_eq!(skip.generator().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_web_page_ingestion_and_chunking() {
    let paragraph = "슬기로운 의사생활 촬영지는 서울과 경기 곳곳에 있습니다. ".repeat(60);
    let html = format!(
        "<html><head><title>슬기로운 의사생활 촬영지</title></head>\
         <body><nav>메뉴</nav><main><p>{paragraph}</p></main></body></html>"
    );

    let loader = WebLoader::new(Duration::from_secs(5)).unwrap();
    let record = loader.parse("https://example.com/hospital", &html).unwrap();
    assert_eq!(record.title.as_deref(), Some("슬기로운 의사생활 촬영지"));
    assert!(!record.content.contains("메뉴"));

    let (size, overlap) = SourceKind::Web.default_chunking();
    let chunker = RecursiveChunker::new(size, overlap).unwrap();
    let chunks = chunker.chunk(&record).unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.len() >= chunker.estimate_chunks(&record));
    for pair in chunks.windows(2) {
        let tail: String = {
            let chars: Vec<char> = pair[0].content.chars().collect();
            chars[chars.len() - overlap..].iter().collect()
        };
        let head: String = pair[1].content.chars().take(overlap).collect();
        assert_eq!(tail, head);
    }
    for chunk in &chunks {
        assert!(chunk.len() <= size);
        assert_eq!(chunk.metadata.source.as_deref(), Some("https://example.com/hospital"));
    }
}
