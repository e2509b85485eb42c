//! Analysis orchestrator: retrieve similar incidents, then ask the
//! generation backend for a root cause, remediation steps and reasoning
//! grounded strictly in the retrieved incidents.
//!
//! Retrieval errors propagate; generation failures never do — they
//! become the fixed fallback triple so the caller can always render a
//! complete analysis.

pub mod chat;
pub mod parse;
pub mod prompt;

pub use chat::{ChatApi, ChatClient};
pub use parse::Analysis;

use incidentdb_core::error::Result;
use incidentdb_core::traits::{IncidentStore, VectorIndex};
use incidentdb_core::types::{ScoredIncident, TechStack};
use incidentdb_retrieval::RetrievalEngine;

/// How many candidates retrieval works with per analysis.
const SEARCH_LIMIT: usize = 10;
/// How many incidents per partition are reported back to the caller.
const REPORT_LIMIT: usize = 5;

/// Combined result handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct IncidentAnalysis {
    pub same_stack: Vec<ScoredIncident>,
    pub cross_stack: Vec<ScoredIncident>,
    pub root_cause: String,
    pub solution_steps: Vec<String>,
    pub reasoning: String,
    pub most_similar: Option<ScoredIncident>,
}

pub struct IncidentAnalyzer<VI, IS, C>
where
    VI: VectorIndex,
    IS: IncidentStore,
    C: ChatApi,
{
    engine: RetrievalEngine<VI, IS>,
    chat: C,
}

impl<VI, IS, C> IncidentAnalyzer<VI, IS, C>
where
    VI: VectorIndex,
    IS: IncidentStore,
    C: ChatApi,
{
    pub fn new(engine: RetrievalEngine<VI, IS>, chat: C) -> Self {
        Self { engine, chat }
    }

    pub async fn analyze(
        &self,
        description: &str,
        tech_stack: TechStack,
        error_message: Option<&str>,
    ) -> Result<IncidentAnalysis> {
        let query = match error_message {
            Some(err) if !err.trim().is_empty() => format!("{description} {err}"),
            _ => description.to_string(),
        };
        let results = self
            .engine
            .search(&query, Some(tech_stack), SEARCH_LIMIT)
            .await?;

        let user_prompt = prompt::build_prompt(
            description,
            tech_stack,
            error_message,
            &results.same_stack,
            &results.cross_stack,
        );
        let analysis = match self.chat.complete(prompt::SYSTEM_PROMPT, &user_prompt).await {
            Ok(reply) => parse::parse_reply(&reply).unwrap_or_else(|| {
                tracing::warn!("model reply missing section markers");
                parse::fallback("response missing section markers")
            }),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                parse::fallback(&e.to_string())
            }
        };

        let mut same_stack = results.same_stack;
        let mut cross_stack = results.cross_stack;
        same_stack.truncate(REPORT_LIMIT);
        cross_stack.truncate(REPORT_LIMIT);
        let most_similar = same_stack
            .first()
            .cloned()
            .or_else(|| cross_stack.first().cloned());

        Ok(IncidentAnalysis {
            same_stack,
            cross_stack,
            root_cause: analysis.root_cause,
            solution_steps: analysis.solution_steps,
            reasoning: analysis.reasoning,
            most_similar,
        })
    }
}
