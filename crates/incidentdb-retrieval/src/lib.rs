//! Hybrid retrieval engine: vector-similarity candidates enriched from
//! the relational incident store, partitioned into same-stack and
//! cross-stack matches.

use std::collections::HashMap;

use incidentdb_core::error::{Result, RetrievalError};
use incidentdb_core::traits::{Embedder, IncidentStore, VectorIndex};
use incidentdb_core::types::{
    Incident, IndexedVector, ScoredIncident, SearchResult, TechStack,
};

/// Candidate over-fetch multiplier. Partitioning and index/store drift
/// both discard candidates after the vector query, so the engine asks
/// for `limit * OVERSAMPLE_FACTOR` neighbors to keep both partitions
/// populated even when one stack dominates the corpus.
pub const OVERSAMPLE_FACTOR: usize = 3;

/// Retrieval engine over injected adapters. Generic so tests can swap in
/// fake backends; the embedder stays a trait object because candle and
/// fake embedders share no useful static type.
pub struct RetrievalEngine<VI, IS>
where
    VI: VectorIndex,
    IS: IncidentStore,
{
    index: VI,
    store: IS,
    embedder: Box<dyn Embedder>,
}

impl<VI, IS> RetrievalEngine<VI, IS>
where
    VI: VectorIndex,
    IS: IncidentStore,
{
    pub fn new(index: VI, store: IS, embedder: Box<dyn Embedder>) -> Self {
        Self {
            index,
            store,
            embedder,
        }
    }

    /// Bulk ingest: one embedding per incident from its canonical
    /// embedding text, then paired writes — store rows first, vector
    /// points second, keyed by the same ids.
    pub async fn ingest(&self, incidents: &[Incident]) -> Result<usize> {
        if incidents.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = incidents.iter().map(Incident::embedding_text).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| RetrievalError::Unavailable(format!("embedding: {e}")))?;

        self.store.insert_batch(incidents).await?;

        let vectors: Vec<IndexedVector> = incidents
            .iter()
            .zip(embeddings)
            .map(|(inc, vector)| IndexedVector {
                incident_id: inc.id.clone(),
                tech_stack: inc.tech_stack,
                vector,
            })
            .collect();
        self.index.upsert(&vectors).await?;

        tracing::info!(count = incidents.len(), "ingested incidents");
        Ok(incidents.len())
    }

    /// Retrieve historical incidents similar to `query`, partitioned by
    /// whether they share `current_stack`.
    ///
    /// Pipeline: validate, embed, over-fetch nearest neighbors, collect
    /// first-seen scores per distinct id, bulk-fetch the full records,
    /// partition, sort each partition descending by similarity, then
    /// truncate — `limit / 2` per partition, `limit` for the merged
    /// `all_results` list.
    pub async fn search(
        &self,
        query: &str,
        current_stack: Option<TechStack>,
        limit: usize,
    ) -> Result<SearchResult> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(RetrievalError::InvalidQuery(
                "limit must be positive".to_string(),
            ));
        }

        let query_vector = self
            .embedder
            .embed_text(query)
            .map_err(|e| RetrievalError::Unavailable(format!("embedding: {e}")))?;

        let hits = self
            .index
            .query(&query_vector, limit * OVERSAMPLE_FACTOR)
            .await?;
        tracing::debug!(candidates = hits.len(), "vector candidates");
        if hits.is_empty() {
            // Valid outcome: not enough historical data, not a failure.
            return Ok(SearchResult::default());
        }

        // First-seen score per distinct id. A well-formed index never
        // repeats an id, but a duplicate must not double-count.
        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut ids: Vec<String> = Vec::new();
        for hit in &hits {
            if !scores.contains_key(&hit.incident_id) {
                scores.insert(hit.incident_id.clone(), hit.score);
                ids.push(hit.incident_id.clone());
            }
        }

        let fetched = self.store.fetch_by_ids(&ids).await?;

        let mut same_stack: Vec<ScoredIncident> = Vec::new();
        let mut cross_stack: Vec<ScoredIncident> = Vec::new();
        for incident in fetched {
            let similarity_score = scores.get(&incident.id).copied().unwrap_or(0.0);
            let scored = ScoredIncident {
                incident,
                similarity_score,
            };
            match current_stack {
                Some(stack) if scored.incident.tech_stack == stack => same_stack.push(scored),
                _ => cross_stack.push(scored),
            }
        }

        sort_by_score_desc(&mut same_stack);
        sort_by_score_desc(&mut cross_stack);

        let mut all_results: Vec<ScoredIncident> = same_stack
            .iter()
            .chain(cross_stack.iter())
            .cloned()
            .collect();
        sort_by_score_desc(&mut all_results);

        tracing::debug!(
            same = same_stack.len(),
            cross = cross_stack.len(),
            "partitioned candidates"
        );

        same_stack.truncate(limit / 2);
        cross_stack.truncate(limit / 2);
        all_results.truncate(limit);

        Ok(SearchResult {
            same_stack,
            cross_stack,
            all_results,
        })
    }
}

/// Descending by similarity; stable, so ties keep retrieval order.
fn sort_by_score_desc(incidents: &mut [ScoredIncident]) {
    incidents.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
