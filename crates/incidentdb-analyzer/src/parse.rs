//! Best-effort parser for the model's three-section reply. The section
//! markers are a prompt-side contract, not a guarantee; a reply without
//! them is an unparseable outcome and the caller falls back to the fixed
//! failure triple.

/// Structured analysis extracted from one model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub root_cause: String,
    pub solution_steps: Vec<String>,
    pub reasoning: String,
}

const ROOT_CAUSE_MARKER: &str = "ROOT CAUSE:";
const SOLUTION_MARKER: &str = "SOLUTION:";
const REASONING_MARKER: &str = "REASONING:";

/// Deterministic fallback for any generation failure: transport error,
/// bad status, or an unparseable reply.
pub fn fallback(cause: &str) -> Analysis {
    Analysis {
        root_cause: format!("Error: {cause}"),
        solution_steps: vec!["LLM call failed".to_string()],
        reasoning: "Check API key".to_string(),
    }
}

/// `None` when the reply carries no `ROOT CAUSE:` marker at all; missing
/// later sections degrade to explicit placeholders rather than failing
/// the whole reply.
pub fn parse_reply(text: &str) -> Option<Analysis> {
    if !text.contains(ROOT_CAUSE_MARKER) {
        return None;
    }

    let (root_part, rest) = match text.split_once(SOLUTION_MARKER) {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    };
    let root_cause = root_part.replace(ROOT_CAUSE_MARKER, "").trim().to_string();

    let (solution_steps, reasoning) = match rest {
        Some(tail) => {
            let (solution_part, reasoning_part) = match tail.split_once(REASONING_MARKER) {
                Some((head, tail)) => (head, Some(tail)),
                None => (tail, None),
            };
            let steps = split_steps(solution_part);
            let reasoning = reasoning_part
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Insufficient similar incidents found".to_string());
            (steps, reasoning)
        }
        None => (
            vec!["Manual investigation required".to_string()],
            "Insufficient similar incidents found".to_string(),
        ),
    };

    Some(Analysis {
        root_cause,
        solution_steps,
        reasoning,
    })
}

/// One step per non-empty line, leading "N." numbering stripped. Order
/// is preserved; it is the remediation order.
fn split_steps(block: &str) -> Vec<String> {
    let steps: Vec<String> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(strip_numbering)
        .filter(|l| !l.is_empty())
        .collect();
    if steps.is_empty() {
        vec!["Manual investigation required".to_string()]
    } else {
        steps
    }
}

fn strip_numbering(line: &str) -> String {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    rest.trim().to_string()
}
