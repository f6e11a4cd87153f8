//! Response evaluation — scores a candidate reply against the expected
//! answer and decides where the interview goes next.

use serde::Deserialize;
use tracing::warn;

use crate::errors::InterviewError;
use crate::interview::generator::HISTORY_EXCERPT_LEN;
use crate::interview::history::Turn;
use crate::interview::prompts::{EVALUATION_SYSTEM, EVALUATION_TEMPLATE};
use crate::llm_client::{extract_json_object, Oracle, ORACLE_TIMEOUT};

/// A reply scoring below this is a "low" answer.
pub const LOW_SCORE_THRESHOLD: u8 = 55;
/// The interview stops asking after this many committed question turns.
pub const TURN_CAP: usize = 10;
/// The interview stops asking on the Nth low-scoring reply.
pub const MAX_LOW_SCORES: u32 = 3;
/// Comment length bound, in characters.
const MAX_COMMENT_CHARS: usize = 50;

/// Where the state machine goes after an evaluated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextDirective {
    Deepen,
    NextTopic,
    EndAsking,
}

/// Evaluation of one candidate reply.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub score: u8,
    pub comment: String,
    pub next: NextDirective,
}

#[derive(Deserialize)]
struct ScorePayload {
    score: serde_json::Value,
    comment: String,
}

/// Scores `candidate_reply` against `expected_answer` via the oracle and
/// applies the termination heuristics.
///
/// `history` is the committed transcript including the turn being scored;
/// `prior_low_scores` is the session's cumulative sub-threshold count before
/// this reply.
pub async fn evaluate_reply(
    oracle: &dyn Oracle,
    candidate_reply: &str,
    expected_answer: &str,
    history: &[Turn],
    prior_low_scores: u32,
) -> Result<Evaluation, InterviewError> {
    let instruction = EVALUATION_TEMPLATE
        .replace("{candidate_reply}", candidate_reply)
        .replace("{expected_answer}", expected_answer)
        .replace("{history}", &excerpt(history));

    let raw = match tokio::time::timeout(
        ORACLE_TIMEOUT,
        oracle.complete(&instruction, EVALUATION_SYSTEM),
    )
    .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(InterviewError::MalformedGeneration(format!(
                "evaluation oracle call failed: {e}"
            )))
        }
        Err(_) => {
            return Err(InterviewError::MalformedGeneration(format!(
                "evaluation exceeded {}s",
                ORACLE_TIMEOUT.as_secs()
            )))
        }
    };

    let json = extract_json_object(&raw).ok_or_else(|| {
        warn!("Evaluation output contained no JSON object: {raw}");
        InterviewError::MalformedGeneration("no JSON object in evaluation output".into())
    })?;
    let payload: ScorePayload = serde_json::from_str(json).map_err(|e| {
        warn!("Evaluation JSON failed validation: {e}: {json}");
        InterviewError::MalformedGeneration(format!("evaluation JSON missing fields: {e}"))
    })?;

    let score = clamp_score(&payload.score)?;
    let comment = truncate_comment(&payload.comment);
    let next = decide_next(score, history.len(), prior_low_scores);

    Ok(Evaluation {
        score,
        comment,
        next,
    })
}

/// Termination heuristics, first match wins:
/// 1. turn cap reached → stop asking, regardless of score;
/// 2. this reply is the Nth low score overall → stop asking;
/// 3. solid answer → deepen the current topic;
/// 4. weak answer → move to the next topic.
///
/// The low-score count is cumulative across the session, not consecutive:
/// a strong answer does not clear earlier low marks.
pub fn decide_next(score: u8, history_len: usize, prior_low_scores: u32) -> NextDirective {
    if history_len >= TURN_CAP {
        return NextDirective::EndAsking;
    }
    if score < LOW_SCORE_THRESHOLD && prior_low_scores + 1 >= MAX_LOW_SCORES {
        return NextDirective::EndAsking;
    }
    if score >= LOW_SCORE_THRESHOLD {
        NextDirective::Deepen
    } else {
        NextDirective::NextTopic
    }
}

/// Accepts the score as a JSON number or numeric string, clamped to [0,100].
/// Out-of-range values are a data-quality warning, not a failure.
fn clamp_score(value: &serde_json::Value) -> Result<u8, InterviewError> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        InterviewError::MalformedGeneration(format!("evaluation score is not numeric: {value}"))
    })?;

    if !(0.0..=100.0).contains(&raw) {
        warn!("Evaluation score {raw} outside [0,100]; clamping");
    }
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

fn truncate_comment(comment: &str) -> String {
    comment.trim().chars().take(MAX_COMMENT_CHARS).collect()
}

fn excerpt(history: &[Turn]) -> String {
    if history.is_empty() {
        return "（无）".to_string();
    }
    let start = history.len().saturating_sub(HISTORY_EXCERPT_LEN);
    history[start..]
        .iter()
        .map(|t| format!("问：{}", t.question))
        .collect::<Vec<_>>()
        .join("\n")
}
