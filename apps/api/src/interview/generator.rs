//! Turn generation — builds the instruction for the oracle, parses its free
//! text into a question/answer pair, and owns the topic-selection policy.

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::warn;

use crate::errors::InterviewError;
use crate::interview::history::{Phase, Turn};
use crate::interview::prompts::{
    CANDIDATE_QA_SYSTEM, CANDIDATE_QA_TEMPLATE, GENERATION_SYSTEM, GENERATION_TEMPLATE,
    HINT_DEEPEN, HINT_FIRST_QUESTION, HINT_NEXT_TOPIC, HINT_RANDOM_FALLBACK,
};
use crate::llm_client::{extract_json_object, Oracle, ORACLE_TIMEOUT};

/// How many recent turns are excerpted into generation/evaluation prompts.
pub const HISTORY_EXCERPT_LEN: usize = 3;

/// Instruction tag controlling how the next question is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    FirstQuestion,
    Deepen,
    NextTopic,
    /// All keywords exhausted: re-draw a previously used keyword uniformly
    /// at random. Explicitly non-deterministic.
    RandomFallback,
}

/// A freshly generated question with the model answer it will be scored
/// against, plus the keyword it targets.
#[derive(Debug, Clone)]
pub struct GeneratedTurn {
    pub keyword: String,
    pub question: String,
    pub answer: String,
}

#[derive(Deserialize)]
struct QaPayload {
    question: String,
    answer: String,
}

#[derive(Deserialize)]
struct AnswerPayload {
    answer: String,
}

/// Generates one question/answer pair for the given directive.
///
/// `NextTopic` keeps topic coverage monotonic: it targets the highest-ranked
/// keyword no prior turn has used, and degrades to `RandomFallback` when
/// every keyword has been covered. `Deepen` stays on the most recent topic.
pub async fn generate_turn(
    oracle: &dyn Oracle,
    keywords: &[String],
    history: &[Turn],
    directive: Directive,
) -> Result<GeneratedTurn, InterviewError> {
    let (keyword, hint) = resolve_target(keywords, history, directive)?;

    let instruction = GENERATION_TEMPLATE
        .replace("{directive_hint}", hint)
        .replace("{keyword}", &keyword)
        .replace("{history}", &history_excerpt(history));

    let raw = ask_oracle(oracle, &instruction, GENERATION_SYSTEM).await?;
    let payload: QaPayload = parse_payload(&raw)?;

    Ok(GeneratedTurn {
        keyword,
        question: payload.question,
        answer: payload.answer,
    })
}

/// Closing phase: the candidate asks, the interviewer answers.
pub async fn answer_candidate_question(
    oracle: &dyn Oracle,
    history: &[Turn],
    question: &str,
) -> Result<String, InterviewError> {
    let instruction = CANDIDATE_QA_TEMPLATE
        .replace("{question}", question)
        .replace("{history}", &history_excerpt(history));

    let raw = ask_oracle(oracle, &instruction, CANDIDATE_QA_SYSTEM).await?;
    let payload: AnswerPayload = parse_payload(&raw)?;
    Ok(payload.answer)
}

/// Resolves the target keyword for a directive.
fn resolve_target(
    keywords: &[String],
    history: &[Turn],
    directive: Directive,
) -> Result<(String, &'static str), InterviewError> {
    match directive {
        Directive::FirstQuestion => keywords
            .first()
            .cloned()
            .map(|k| (k, HINT_FIRST_QUESTION))
            .ok_or(InterviewError::NoKeywords),
        Directive::Deepen => last_topic(history)
            .map(|k| (k.to_string(), HINT_DEEPEN))
            .ok_or_else(|| {
                InterviewError::MalformedGeneration("deepen requested with no prior topic".into())
            }),
        Directive::NextTopic => match pick_fresh_topic(keywords, history) {
            Some(keyword) => Ok((keyword.to_string(), HINT_NEXT_TOPIC)),
            None => resolve_target(keywords, history, Directive::RandomFallback),
        },
        Directive::RandomFallback => random_used_topic(history)
            .map(|k| (k, HINT_RANDOM_FALLBACK))
            .ok_or_else(|| {
                InterviewError::MalformedGeneration("fallback requested with no prior topic".into())
            }),
    }
}

/// The topic of the most recent asking-phase turn.
fn last_topic(history: &[Turn]) -> Option<&str> {
    history
        .iter()
        .rev()
        .filter(|t| t.phase == Phase::Asking)
        .find_map(|t| t.keyword.as_deref())
}

/// Highest-ranked keyword not yet the subject of any prior question.
fn pick_fresh_topic<'a>(keywords: &'a [String], history: &[Turn]) -> Option<&'a str> {
    let used: Vec<String> = history
        .iter()
        .filter_map(|t| t.keyword.as_deref())
        .map(str::to_lowercase)
        .collect();
    keywords
        .iter()
        .find(|k| !used.contains(&k.to_lowercase()))
        .map(String::as_str)
}

/// Uniform draw over previously used keywords. Non-deterministic on purpose:
/// once coverage is complete there is no principled next topic, so any
/// revisit is as good as another.
fn random_used_topic(history: &[Turn]) -> Option<String> {
    let used: Vec<&str> = history.iter().filter_map(|t| t.keyword.as_deref()).collect();
    used.choose(&mut rand::thread_rng()).map(|k| k.to_string())
}

/// Renders the last few turns as a prompt excerpt.
fn history_excerpt(history: &[Turn]) -> String {
    if history.is_empty() {
        return "（无）".to_string();
    }
    let start = history.len().saturating_sub(HISTORY_EXCERPT_LEN);
    history[start..]
        .iter()
        .map(|turn| {
            let mut line = format!("问：{}", turn.question);
            if let Some(reply) = &turn.candidate_reply {
                line.push_str(&format!("\n答：{reply}"));
            }
            if let Some(score) = turn.score {
                line.push_str(&format!("（得分{score}）"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bounded oracle call. Transport errors and timeouts are fatal for the
/// attempted turn and surface as `MalformedGeneration`, putting them on the
/// state machine's retry-then-force-close path.
async fn ask_oracle(
    oracle: &dyn Oracle,
    instruction: &str,
    system: &str,
) -> Result<String, InterviewError> {
    match tokio::time::timeout(ORACLE_TIMEOUT, oracle.complete(instruction, system)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(InterviewError::MalformedGeneration(format!(
            "oracle call failed: {e}"
        ))),
        Err(_) => Err(InterviewError::MalformedGeneration(format!(
            "oracle call exceeded {}s",
            ORACLE_TIMEOUT.as_secs()
        ))),
    }
}

/// Extracts and deserializes the JSON object in raw oracle output.
fn parse_payload<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, InterviewError> {
    let json = extract_json_object(raw).ok_or_else(|| {
        warn!("Oracle output contained no JSON object: {raw}");
        InterviewError::MalformedGeneration("no JSON object in oracle output".into())
    })?;
    serde_json::from_str(json).map_err(|e| {
        warn!("Oracle JSON failed validation: {e}: {json}");
        InterviewError::MalformedGeneration(format!("oracle JSON missing required fields: {e}"))
    })
}
