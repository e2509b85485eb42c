//! Domain types shared by the vector index, incident store and retrieval engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Technology stack an incident was recorded against.
///
/// This is a closed set: the corpus only contains these tags, and the
/// same/cross-stack partition is only meaningful over a closed set.
/// Serialized as the lowercase tags used by the ingest corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechStack {
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "nodejs")]
    NodeJs,
}

impl TechStack {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechStack::Java => "java",
            TechStack::Python => "python",
            TechStack::NodeJs => "nodejs",
        }
    }
}

impl fmt::Display for TechStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TechStack {
    type Err = crate::error::RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "java" => Ok(TechStack::Java),
            "python" => Ok(TechStack::Python),
            "nodejs" => Ok(TechStack::NodeJs),
            other => Err(crate::error::RetrievalError::InvalidQuery(format!(
                "unknown tech stack tag: {other}"
            ))),
        }
    }
}

/// An immutable historical incident record.
///
/// `solution` is an ordered sequence of remediation steps; step order is
/// meaningful and must be preserved end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tech_stack: TechStack,
    pub error_type: String,
    pub root_cause: String,
    pub solution: Vec<String>,
    pub service: String,
}

impl Incident {
    /// The exact text embedded at ingest time. Query-time embeddings are
    /// compared against vectors produced from this concatenation, so the
    /// formula must not change without a full re-index.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.root_cause)
    }
}

/// Write-side record for the vector index: one embedding per incident,
/// created once at ingest, keyed by the incident id.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub incident_id: String,
    pub tech_stack: TechStack,
    pub vector: Vec<f32>,
}

/// Read-side record from a nearest-neighbor query.
///
/// The payload stack tag stays a raw string here: partitioning uses the
/// typed value on the fetched store row, not the index payload.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub incident_id: String,
    pub tech_stack: String,
    pub score: f32,
}

/// An incident enriched with its similarity to the current query.
/// Derived per search, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredIncident {
    #[serde(flatten)]
    pub incident: Incident,
    pub similarity_score: f32,
}

/// The partitioned result of one retrieval call.
///
/// `same_stack` and `cross_stack` are each sorted descending by
/// `similarity_score` and share no incident id. `all_results` is the
/// ranked merged candidate list, kept for diagnostics and alternate
/// consumers; it is not rebalanced across partitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub same_stack: Vec<ScoredIncident>,
    pub cross_stack: Vec<ScoredIncident>,
    pub all_results: Vec<ScoredIncident>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.same_stack.is_empty() && self.cross_stack.is_empty() && self.all_results.is_empty()
    }
}

/// Scoreless listing filter for the incident store.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub tech_stack: Option<TechStack>,
    pub error_type: Option<String>,
}
