use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use incidentdb_core::error::{Result, RetrievalError};
use incidentdb_core::traits::{Embedder, IncidentStore, VectorIndex};
use incidentdb_core::types::{
    Incident, IncidentFilter, IndexedVector, ScoredIncident, TechStack, VectorHit,
};
use incidentdb_retrieval::{RetrievalEngine, OVERSAMPLE_FACTOR};

// ---------------------------------------------------------------------------
// Fake adapters with call counters
// ---------------------------------------------------------------------------

struct StubEmbedder {
    calls: Arc<AtomicUsize>,
}

impl Embedder for StubEmbedder {
    fn dim(&self) -> usize {
        4
    }
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Deterministic and content-dependent; the fakes below ignore it.
        let seed = text.len() as f32;
        Ok(vec![seed, 1.0, 0.0, 0.0])
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

#[derive(Default)]
struct FakeIndex {
    hits: Vec<VectorHit>,
    calls: Arc<AtomicUsize>,
    last_limit: Arc<AtomicUsize>,
    upserted: Arc<Mutex<Vec<IndexedVector>>>,
}

#[async_trait::async_trait]
impl VectorIndex for FakeIndex {
    async fn upsert(&self, vectors: &[IndexedVector]) -> Result<()> {
        self.upserted
            .lock()
            .expect("lock")
            .extend(vectors.iter().cloned());
        Ok(())
    }
    async fn query(&self, _vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
struct FakeStore {
    rows: HashMap<String, Incident>,
    calls: Arc<AtomicUsize>,
    inserted: Arc<Mutex<Vec<Incident>>>,
}

#[async_trait::async_trait]
impl IncidentStore for FakeStore {
    async fn insert_batch(&self, incidents: &[Incident]) -> Result<()> {
        self.inserted
            .lock()
            .expect("lock")
            .extend(incidents.iter().cloned());
        Ok(())
    }
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Incident>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids.iter().filter_map(|id| self.rows.get(id).cloned()).collect())
    }
    async fn fetch_all(&self, _filter: &IncidentFilter) -> Result<Vec<Incident>> {
        Ok(self.rows.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn incident(id: &str, stack: TechStack, title: &str) -> Incident {
    Incident {
        id: id.to_string(),
        title: title.to_string(),
        description: "description".to_string(),
        tech_stack: stack,
        error_type: "timeout".to_string(),
        root_cause: "root cause".to_string(),
        solution: vec!["step 1".to_string()],
        service: "payments".to_string(),
    }
}

fn hit(id: &str, stack: &str, score: f32) -> VectorHit {
    VectorHit {
        incident_id: id.to_string(),
        tech_stack: stack.to_string(),
        score,
    }
}

struct Fixture {
    engine: RetrievalEngine<FakeIndex, FakeStore>,
    embed_calls: Arc<AtomicUsize>,
    index_calls: Arc<AtomicUsize>,
    index_limit: Arc<AtomicUsize>,
    store_calls: Arc<AtomicUsize>,
    upserted: Arc<Mutex<Vec<IndexedVector>>>,
    inserted: Arc<Mutex<Vec<Incident>>>,
}

fn fixture(hits: Vec<VectorHit>, rows: Vec<Incident>) -> Fixture {
    let embed_calls = Arc::new(AtomicUsize::new(0));
    let index_calls = Arc::new(AtomicUsize::new(0));
    let index_limit = Arc::new(AtomicUsize::new(0));
    let store_calls = Arc::new(AtomicUsize::new(0));
    let upserted: Arc<Mutex<Vec<IndexedVector>>> = Arc::default();
    let inserted: Arc<Mutex<Vec<Incident>>> = Arc::default();

    let index = FakeIndex {
        hits,
        calls: Arc::clone(&index_calls),
        last_limit: Arc::clone(&index_limit),
        upserted: Arc::clone(&upserted),
    };
    let store = FakeStore {
        rows: rows.into_iter().map(|i| (i.id.clone(), i)).collect(),
        calls: Arc::clone(&store_calls),
        inserted: Arc::clone(&inserted),
    };
    let engine = RetrievalEngine::new(
        index,
        store,
        Box::new(StubEmbedder {
            calls: Arc::clone(&embed_calls),
        }),
    );
    Fixture {
        engine,
        embed_calls,
        index_calls,
        index_limit,
        store_calls,
        upserted,
        inserted,
    }
}

fn corpus() -> (Vec<VectorHit>, Vec<Incident>) {
    let hits = vec![
        hit("INC-J1", "java", 0.95),
        hit("INC-P1", "python", 0.90),
        hit("INC-J2", "java", 0.85),
        hit("INC-N1", "nodejs", 0.80),
        hit("INC-J3", "java", 0.75),
        hit("INC-P2", "python", 0.70),
    ];
    let rows = vec![
        incident("INC-J1", TechStack::Java, "DB timeout on checkout"),
        incident("INC-P1", TechStack::Python, "psycopg2 pool exhausted"),
        incident("INC-J2", TechStack::Java, "JDBC socket timeout"),
        incident("INC-N1", TechStack::NodeJs, "pg pool starvation"),
        incident("INC-J3", TechStack::Java, "Hibernate lock wait"),
        incident("INC-P2", TechStack::Python, "gunicorn worker stall"),
    ];
    (hits, rows)
}

fn ids(list: &[ScoredIncident]) -> Vec<&str> {
    list.iter().map(|s| s.incident.id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Search properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partitions_are_pure_and_disjoint() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let result = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");

    assert!(result
        .same_stack
        .iter()
        .all(|s| s.incident.tech_stack == TechStack::Java));
    assert!(result
        .cross_stack
        .iter()
        .all(|s| s.incident.tech_stack != TechStack::Java));

    let same_ids = ids(&result.same_stack);
    for cross in &result.cross_stack {
        assert!(!same_ids.contains(&cross.incident.id.as_str()));
    }
}

#[tokio::test]
async fn partitions_sorted_descending_and_truncated_to_half_limit() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let limit = 4;
    let result = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), limit)
        .await
        .expect("search");

    assert!(result.same_stack.len() <= limit / 2);
    assert!(result.cross_stack.len() <= limit / 2);
    for part in [&result.same_stack, &result.cross_stack] {
        for pair in part.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }
    // Best candidates of each stack survive the truncation.
    assert_eq!(ids(&result.same_stack), vec!["INC-J1", "INC-J2"]);
    assert_eq!(ids(&result.cross_stack), vec!["INC-P1", "INC-N1"]);
}

#[tokio::test]
async fn all_results_is_ranked_and_capped_at_limit() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let result = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 4)
        .await
        .expect("search");

    assert!(result.all_results.len() <= 4);
    for pair in result.all_results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    assert_eq!(
        ids(&result.all_results),
        vec!["INC-J1", "INC-P1", "INC-J2", "INC-N1"]
    );
}

#[tokio::test]
async fn overfetches_by_the_oversampling_factor() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    f.engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");
    assert_eq!(f.index_limit.load(Ordering::SeqCst), 8 * OVERSAMPLE_FACTOR);
}

#[tokio::test]
async fn no_current_stack_means_everything_is_cross_stack() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let result = f
        .engine
        .search("payment timeouts", None, 8)
        .await
        .expect("search");
    assert!(result.same_stack.is_empty());
    assert_eq!(result.cross_stack.len(), 4); // limit / 2
}

#[tokio::test]
async fn zero_candidates_is_a_valid_empty_result() {
    let f = fixture(Vec::new(), Vec::new());
    let result = f
        .engine
        .search("never seen before", Some(TechStack::Java), 8)
        .await
        .expect("search");
    assert!(result.is_empty());
    assert_eq!(
        f.store_calls.load(Ordering::SeqCst),
        0,
        "no store fetch for zero candidates"
    );
}

#[tokio::test]
async fn index_store_drift_drops_candidates_silently() {
    let (hits, mut rows) = corpus();
    rows.retain(|r| r.id != "INC-P1"); // indexed but missing from the store
    let f = fixture(hits, rows);
    let result = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");

    assert!(!ids(&result.cross_stack).contains(&"INC-P1"));
    assert!(!ids(&result.all_results).contains(&"INC-P1"));
    assert!(
        !result.cross_stack.is_empty(),
        "remaining candidates still returned"
    );
}

#[tokio::test]
async fn duplicate_candidate_ids_keep_first_seen_score() {
    let hits = vec![
        hit("INC-J1", "java", 0.95),
        hit("INC-J1", "java", 0.10), // malformed index echo; must not win
    ];
    let rows = vec![incident("INC-J1", TechStack::Java, "DB timeout")];
    let f = fixture(hits, rows);
    let result = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");

    assert_eq!(result.same_stack.len(), 1);
    assert!((result.same_stack[0].similarity_score - 0.95).abs() < f32::EPSILON);
    assert_eq!(result.all_results.len(), 1, "exact-id dedup");
}

/// A store that ignores the id list and returns extra rows; the engine
/// must defend with a 0.0 score instead of failing.
struct OverEagerStore {
    rows: Vec<Incident>,
}

#[async_trait::async_trait]
impl IncidentStore for OverEagerStore {
    async fn insert_batch(&self, _incidents: &[Incident]) -> Result<()> {
        Ok(())
    }
    async fn fetch_by_ids(&self, _ids: &[String]) -> Result<Vec<Incident>> {
        Ok(self.rows.clone())
    }
    async fn fetch_all(&self, _filter: &IncidentFilter) -> Result<Vec<Incident>> {
        Ok(self.rows.clone())
    }
}

#[tokio::test]
async fn unscored_store_rows_default_to_zero() {
    let index = FakeIndex {
        hits: vec![hit("INC-J1", "java", 0.95)],
        ..FakeIndex::default()
    };
    let store = OverEagerStore {
        rows: vec![
            incident("INC-J1", TechStack::Java, "DB timeout"),
            incident("INC-X9", TechStack::Java, "stray row"),
        ],
    };
    let engine = RetrievalEngine::new(
        index,
        store,
        Box::new(StubEmbedder {
            calls: Arc::default(),
        }),
    );

    let result = engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");
    let stray = result
        .same_stack
        .iter()
        .find(|s| s.incident.id == "INC-X9")
        .expect("stray row present");
    assert_eq!(stray.similarity_score, 0.0);
    // And it ranks below the genuinely scored candidate.
    assert_eq!(result.same_stack[0].incident.id, "INC-J1");
}

#[tokio::test]
async fn empty_query_rejected_before_any_backend_call() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let err = f
        .engine
        .search("   ", Some(TechStack::Java), 8)
        .await
        .expect_err("must reject");
    assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    assert_eq!(f.embed_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.index_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.store_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_limit_is_an_invalid_query() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let err = f
        .engine
        .search("payment timeouts", None, 0)
        .await
        .expect_err("must reject");
    assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    assert_eq!(f.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identical_searches_return_identical_results() {
    let (hits, rows) = corpus();
    let f = fixture(hits, rows);
    let a = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");
    let b = f
        .engine
        .search("payment timeouts", Some(TechStack::Java), 8)
        .await
        .expect("search");
    assert_eq!(ids(&a.same_stack), ids(&b.same_stack));
    assert_eq!(ids(&a.cross_stack), ids(&b.cross_stack));
    assert_eq!(ids(&a.all_results), ids(&b.all_results));
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_writes_paired_records_with_matching_ids() {
    let f = fixture(Vec::new(), Vec::new());
    let batch = vec![
        incident("INC-001", TechStack::Java, "DB timeout"),
        incident("INC-002", TechStack::Python, "pool exhausted"),
    ];
    let count = f.engine.ingest(&batch).await.expect("ingest");
    assert_eq!(count, 2);

    let rows = f.inserted.lock().expect("lock");
    let points = f.upserted.lock().expect("lock");
    assert_eq!(rows.len(), 2);
    assert_eq!(points.len(), 2);
    for (row, point) in rows.iter().zip(points.iter()) {
        assert_eq!(row.id, point.incident_id);
        assert_eq!(row.tech_stack, point.tech_stack);
        assert_eq!(point.vector.len(), 4);
    }
}

#[tokio::test]
async fn ingest_of_empty_batch_is_a_no_op() {
    let f = fixture(Vec::new(), Vec::new());
    let count = f.engine.ingest(&[]).await.expect("ingest");
    assert_eq!(count, 0);
    assert!(f.inserted.lock().expect("lock").is_empty());
    assert!(f.upserted.lock().expect("lock").is_empty());
}
