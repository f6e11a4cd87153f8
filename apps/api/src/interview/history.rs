//! Conversation history — the append-only transcript backing every session.
//!
//! A `Turn` is committed with both `question` and `answer` populated, never
//! half-filled. The candidate's reply and its score are filled in exactly
//! once, after evaluation. There are no retroactive edits beyond that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Macro-stage of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Asking,
    Replying,
    Closed,
}

/// One exchange unit in the transcript.
///
/// In the `Asking` phase, `question` is the interviewer's question, `answer`
/// the model answer it will be scored against, and `keyword` the topic under
/// examination. In the `Replying` phase the roles flip: `question` holds the
/// candidate's free-text question and `answer` the interviewer's reply;
/// `keyword`, `candidate_reply`, `score` and `comment` stay empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub index: usize,
    pub phase: Phase,
    pub keyword: Option<String>,
    pub question: String,
    pub answer: String,
    pub candidate_reply: Option<String>,
    /// 0–100, filled once after evaluation.
    pub score: Option<u8>,
    pub comment: Option<String>,
    pub asked_at: DateTime<Utc>,
}

/// Append-only ordered log of turns.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits a fully-formed question/answer pair as a new turn and returns
    /// its index.
    pub fn append(
        &mut self,
        phase: Phase,
        keyword: Option<String>,
        question: String,
        answer: String,
    ) -> usize {
        let index = self.turns.len();
        self.turns.push(Turn {
            index,
            phase,
            keyword,
            question,
            answer,
            candidate_reply: None,
            score: None,
            comment: None,
            asked_at: Utc::now(),
        });
        index
    }

    /// Fills the candidate reply and its evaluation on the newest turn.
    /// A turn is scored at most once; a second attempt is dropped.
    pub fn record_reply(&mut self, reply: &str, score: u8, comment: &str) {
        match self.turns.last_mut() {
            Some(turn) if turn.score.is_none() => {
                turn.candidate_reply = Some(reply.to_string());
                turn.score = Some(score);
                turn.comment = Some(comment.to_string());
            }
            Some(turn) => {
                warn!("Turn {} already scored; dropping duplicate reply", turn.index);
            }
            None => {
                warn!("Reply received before any turn was committed; dropping");
            }
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
