//! Strict grounded prompt: the model may only cite the retrieved
//! incidents, and must answer in a fixed three-section format the parser
//! understands.

use incidentdb_core::types::{ScoredIncident, TechStack};

pub const SYSTEM_PROMPT: &str = "You are a precise DevOps engineer. Base your analysis ONLY on \
provided incidents. Never hallucinate. If insufficient data, say so clearly.";

pub fn build_prompt(
    description: &str,
    tech_stack: TechStack,
    error_message: Option<&str>,
    same_stack: &[ScoredIncident],
    cross_stack: &[ScoredIncident],
) -> String {
    let same_context = same_stack
        .first()
        .map(|s| incident_context(s, &format!("MOST SIMILAR INCIDENT (Same Stack - {tech_stack})")))
        .unwrap_or_default();
    let cross_context = cross_stack
        .first()
        .map(|s| {
            incident_context(
                s,
                &format!("CROSS-STACK INSIGHT ({})", s.incident.tech_stack),
            )
        })
        .unwrap_or_default();

    format!(
        "You are a DevOps engineer analyzing a production incident. Use ONLY the provided \
similar incidents as reference. DO NOT make up information.

CURRENT INCIDENT:
Tech Stack: {tech_stack}
Description: {description}
Error: {error}

{same_context}

{cross_context}

STRICT INSTRUCTIONS:
1. Identify the MOST LIKELY root cause based on similar incidents above
2. Provide a 5-step solution adapted to {tech_stack}
3. Explain why similar incidents apply
4. Use ONLY information from the incidents above
5. If no similar incidents exist, say \"Insufficient data - manual investigation required\"

Format EXACTLY as:

ROOT CAUSE:
[Single paragraph explaining the most likely root cause based on similar incidents]

SOLUTION:
1. [Immediate action - 5 min]
2. [Investigation step - 10 min]
3. [Fix implementation - 15 min]
4. [Verification - 5 min]
5. [Prevention - 10 min]

REASONING:
[Explain why the similar incident's solution applies to this {tech_stack} case. Focus on \
shared root cause, not syntax.]
",
        error = error_message.unwrap_or("Not provided"),
    )
}

fn incident_context(scored: &ScoredIncident, header: &str) -> String {
    let inc = &scored.incident;
    let first_step = inc.solution.first().map(String::as_str).unwrap_or("");
    format!(
        "{header}:\nID: {}\nTitle: {}\nRoot Cause: {}\nSolution: {}\n",
        inc.id, inc.title, inc.root_cause, first_step
    )
}
