use crate::error::Result;
use crate::types::{Incident, IncidentFilter, IndexedVector, VectorHit};

/// Deterministic text-to-vector mapping. Same input text, same vector.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbor index over incident embeddings.
///
/// `query` returns the `limit` most similar vectors, best first. An
/// unreachable index must surface `Unavailable`, never an empty result
/// mislabeled as "no matches".
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, vectors: &[IndexedVector]) -> Result<()>;
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;
}

/// Relational store of full incident records.
///
/// `fetch_by_ids` returns rows in unspecified order and tolerates
/// partial misses: an id with no row is silently absent (the index and
/// the store are updated independently, so drift between them is a
/// designed degradation).
#[async_trait::async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_batch(&self, incidents: &[Incident]) -> Result<()>;
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Incident>>;
    async fn fetch_all(&self, filter: &IncidentFilter) -> Result<Vec<Incident>>;
}
