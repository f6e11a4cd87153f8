//! Interview state machine — the core of Parley.
//!
//! Phases: `Start → Asking → Replying → Closed`. One session processes one
//! in-flight exchange at a time; the only suspension points are oracle
//! calls. Transition table:
//!
//! | State    | Event                         | Next       |
//! |----------|-------------------------------|------------|
//! | Start    | init                          | Asking     |
//! | Asking   | reply → Deepen / NextTopic    | Asking     |
//! | Asking   | reply → EndAsking             | Replying   |
//! | Replying | closing acknowledgment        | Closed     |
//! | Replying | free-text question            | Replying   |
//! | any      | two generation failures       | Closed     |

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::InterviewError;
use crate::interview::evaluator::{self, NextDirective, LOW_SCORE_THRESHOLD};
use crate::interview::generator::{self, Directive, GeneratedTurn};
use crate::interview::history::{ConversationHistory, Phase, Turn};
use crate::interview::keywords::{self, KeywordSources};
use crate::llm_client::Oracle;

/// Prompt inviting the candidate to ask questions once scoring ends.
pub const CLOSING_INVITE: &str = "我的提问结束了，请问你有什么想问我的吗？";
/// The candidate acknowledges having nothing to ask; prefix-matched on the
/// trimmed reply, so "我没有问题了" and "我没有问题" both close the session.
pub const CLOSING_ACK: &str = "我没有问题";
/// Farewell shown when the candidate closes the session normally.
pub const FAREWELL: &str = "感谢你参加本次面试，我们会尽快反馈结果，再见！";
/// Question text of the turn appended on a forced closure.
pub const SYSTEM_CLOSE_QUESTION: &str = "很抱歉，系统出现故障，本次面试提前结束。";
/// Answer text of the turn appended on a forced closure.
pub const SYSTEM_CLOSE_ANSWER: &str = "面试因系统故障提前结束。";

/// What `submit_reply` hands back to the serving layer.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    pub next_prompt: String,
    pub finished: bool,
}

/// One interview, exclusively owning its keyword ranking and transcript.
#[derive(Debug)]
pub struct InterviewSession {
    id: Uuid,
    keywords: Vec<String>,
    history: ConversationHistory,
    phase: Phase,
    /// Cumulative count of sub-threshold replies. Never reset by a strong
    /// answer: three weak answers end the asking phase no matter what came
    /// in between.
    low_score_count: u32,
    total_asked: u32,
    finished: bool,
    created_at: DateTime<Utc>,
}

impl InterviewSession {
    /// Builds the keyword ranking, generates the first question, and enters
    /// the `Asking` phase. Fails with `NoKeywords` when the ranking is
    /// empty, and with `MalformedGeneration` when the oracle cannot produce
    /// a usable first question in two attempts.
    pub async fn start(
        oracle: &dyn Oracle,
        sources: &KeywordSources,
    ) -> Result<(Self, String), InterviewError> {
        let ranked = keywords::rank(sources);
        if ranked.is_empty() {
            return Err(InterviewError::NoKeywords);
        }

        let mut session = Self {
            id: Uuid::new_v4(),
            keywords: ranked,
            history: ConversationHistory::new(),
            phase: Phase::Start,
            low_score_count: 0,
            total_asked: 0,
            finished: false,
            created_at: Utc::now(),
        };

        let generated = session
            .generate_with_retry(oracle, Directive::FirstQuestion)
            .await?;
        let question = generated.question.clone();
        session.commit_question(generated);
        session.phase = Phase::Asking;

        info!(
            "Interview {} started with {} keywords",
            session.id,
            session.keywords.len()
        );
        Ok((session, question))
    }

    /// Advances the machine by one event. Contract violation to call once
    /// `finished` is true.
    pub async fn submit_reply(
        &mut self,
        oracle: &dyn Oracle,
        reply: &str,
    ) -> Result<ReplyOutcome, InterviewError> {
        if self.finished {
            return Err(InterviewError::SessionClosed);
        }
        match self.phase {
            Phase::Asking => self.handle_asking(oracle, reply).await,
            Phase::Replying => self.handle_replying(oracle, reply).await,
            Phase::Start | Phase::Closed => Err(InterviewError::SessionClosed),
        }
    }

    /// Scores the reply to the open question, then asks the next question,
    /// hands over to the candidate-Q&A phase, or force-closes.
    async fn handle_asking(
        &mut self,
        oracle: &dyn Oracle,
        reply: &str,
    ) -> Result<ReplyOutcome, InterviewError> {
        let expected = self
            .history
            .last()
            .map(|t| t.answer.clone())
            .unwrap_or_default();

        let evaluation = match evaluator::evaluate_reply(
            oracle,
            reply,
            &expected,
            self.history.turns(),
            self.low_score_count,
        )
        .await
        {
            Ok(eval) => eval,
            Err(InterviewError::MalformedGeneration(first)) => {
                warn!("Interview {}: evaluation failed ({first}), retrying once", self.id);
                match evaluator::evaluate_reply(
                    oracle,
                    reply,
                    &expected,
                    self.history.turns(),
                    self.low_score_count,
                )
                .await
                {
                    Ok(eval) => eval,
                    Err(_) => return Ok(self.force_close()),
                }
            }
            Err(e) => return Err(e),
        };

        self.history
            .record_reply(reply, evaluation.score, &evaluation.comment);
        if evaluation.score < LOW_SCORE_THRESHOLD {
            self.low_score_count += 1;
        }
        info!(
            "Interview {}: turn {} scored {} (low_score_count={})",
            self.id,
            self.history.len(),
            evaluation.score,
            self.low_score_count
        );

        match evaluation.next {
            NextDirective::EndAsking => {
                self.phase = Phase::Replying;
                Ok(ReplyOutcome {
                    next_prompt: CLOSING_INVITE.to_string(),
                    finished: false,
                })
            }
            NextDirective::Deepen => self.ask_next(oracle, Directive::Deepen).await,
            NextDirective::NextTopic => self.ask_next(oracle, Directive::NextTopic).await,
        }
    }

    async fn ask_next(
        &mut self,
        oracle: &dyn Oracle,
        directive: Directive,
    ) -> Result<ReplyOutcome, InterviewError> {
        match self.generate_with_retry(oracle, directive).await {
            Ok(generated) => {
                let question = generated.question.clone();
                self.commit_question(generated);
                Ok(ReplyOutcome {
                    next_prompt: question,
                    finished: false,
                })
            }
            Err(InterviewError::MalformedGeneration(_)) => Ok(self.force_close()),
            Err(e) => Err(e),
        }
    }

    /// Closing phase: the candidate either bows out or asks a question the
    /// interviewer answers.
    async fn handle_replying(
        &mut self,
        oracle: &dyn Oracle,
        reply: &str,
    ) -> Result<ReplyOutcome, InterviewError> {
        if reply.trim().starts_with(CLOSING_ACK) {
            self.phase = Phase::Closed;
            self.finished = true;
            info!("Interview {} closed by candidate", self.id);
            return Ok(ReplyOutcome {
                next_prompt: FAREWELL.to_string(),
                finished: true,
            });
        }

        let answer =
            match generator::answer_candidate_question(oracle, self.history.turns(), reply).await {
                Ok(answer) => answer,
                Err(InterviewError::MalformedGeneration(first)) => {
                    warn!("Interview {}: Q&A answer failed ({first}), retrying once", self.id);
                    match generator::answer_candidate_question(oracle, self.history.turns(), reply)
                        .await
                    {
                        Ok(answer) => answer,
                        Err(_) => return Ok(self.force_close()),
                    }
                }
                Err(e) => return Err(e),
            };

        self.history
            .append(Phase::Replying, None, reply.to_string(), answer.clone());
        Ok(ReplyOutcome {
            next_prompt: answer,
            finished: false,
        })
    }

    /// One local retry on a malformed generation; the failed attempt is
    /// discarded and never reaches the history. A second consecutive failure
    /// propagates so the caller can force-close.
    async fn generate_with_retry(
        &self,
        oracle: &dyn Oracle,
        directive: Directive,
    ) -> Result<GeneratedTurn, InterviewError> {
        match generator::generate_turn(oracle, &self.keywords, self.history.turns(), directive)
            .await
        {
            Ok(generated) => Ok(generated),
            Err(InterviewError::MalformedGeneration(first)) => {
                warn!(
                    "Interview {}: generation failed ({first}), retrying once",
                    self.id
                );
                generator::generate_turn(oracle, &self.keywords, self.history.turns(), directive)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    fn commit_question(&mut self, generated: GeneratedTurn) {
        self.history.append(
            Phase::Asking,
            Some(generated.keyword),
            generated.question,
            generated.answer,
        );
        self.total_asked += 1;
    }

    /// Forced closure after two consecutive generation failures: exactly one
    /// user-visible system-error turn is appended, fully populated.
    fn force_close(&mut self) -> ReplyOutcome {
        warn!("Interview {} force-closed after repeated generation failures", self.id);
        self.history.append(
            Phase::Closed,
            None,
            SYSTEM_CLOSE_QUESTION.to_string(),
            SYSTEM_CLOSE_ANSWER.to_string(),
        );
        self.phase = Phase::Closed;
        self.finished = true;
        ReplyOutcome {
            next_prompt: SYSTEM_CLOSE_QUESTION.to_string(),
            finished: true,
        }
    }

    /// Marks the session closed without appending a turn. Used by the finish
    /// endpoint when the candidate abandons an open session.
    pub fn close(&mut self) {
        if !self.finished {
            self.phase = Phase::Closed;
            self.finished = true;
            info!("Interview {} closed by caller", self.id);
        }
    }

    pub fn export_history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn total_asked(&self) -> u32 {
        self.total_asked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedOracle;

    fn docker_sources() -> KeywordSources {
        KeywordSources {
            explicit: vec!["Docker".into(), "Kubernetes".into(), "Redis".into()],
            ..Default::default()
        }
    }

    fn qa(keyword: &str) -> String {
        format!(r#"{{"question": "请讲讲{keyword}", "answer": "{keyword}的标准答案"}}"#)
    }

    fn scored(score: u8) -> String {
        format!(r#"{{"score": {score}, "comment": "点评"}}"#)
    }

    #[tokio::test]
    async fn test_start_targets_top_ranked_keyword() {
        let oracle = ScriptedOracle::new([qa("Docker")]);
        let (session, first_question) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();

        assert_eq!(session.phase(), Phase::Asking);
        assert_eq!(first_question, "请讲讲Docker");
        assert_eq!(session.export_history()[0].keyword.as_deref(), Some("Docker"));
    }

    #[tokio::test]
    async fn test_start_without_keywords_fails() {
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        let result = InterviewSession::start(&oracle, &KeywordSources::default()).await;
        assert!(matches!(result, Err(InterviewError::NoKeywords)));
    }

    #[tokio::test]
    async fn test_high_score_deepens_low_score_switches_topic() {
        // Q(Docker) · eval 80 → deepen Q(Docker) · eval 30 → next topic Q(Kubernetes)
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(80),
            qa("Docker"),
            scored(30),
            qa("Kubernetes"),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();

        session.submit_reply(&oracle, "容器与镜像……").await.unwrap();
        let turns = session.export_history();
        assert_eq!(turns[0].score, Some(80));
        assert_eq!(turns[1].keyword.as_deref(), Some("Docker"));

        session.submit_reply(&oracle, "不太清楚").await.unwrap();
        let turns = session.export_history();
        assert_eq!(turns[1].score, Some(30));
        // NextTopic honors rank order: Kubernetes before Redis.
        assert_eq!(turns[2].keyword.as_deref(), Some("Kubernetes"));
    }

    #[tokio::test]
    async fn test_third_low_score_moves_to_replying() {
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(40),
            qa("Kubernetes"),
            scored(80), // strong answer in between does not reset the count
            qa("Kubernetes"),
            scored(50),
            qa("Redis"),
            scored(30),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();

        session.submit_reply(&oracle, "r1").await.unwrap();
        session.submit_reply(&oracle, "r2").await.unwrap();
        session.submit_reply(&oracle, "r3").await.unwrap();
        let outcome = session.submit_reply(&oracle, "r4").await.unwrap();

        assert_eq!(outcome.next_prompt, CLOSING_INVITE);
        assert!(!outcome.finished);
        assert_eq!(session.phase(), Phase::Replying);
    }

    #[tokio::test]
    async fn test_turn_cap_fires_regardless_of_score() {
        let mut script = vec![qa("Docker")];
        for _ in 0..9 {
            script.push(scored(90));
            script.push(qa("Docker"));
        }
        script.push(scored(60)); // 10th committed turn: cap fires despite passing score
        let oracle = ScriptedOracle::new(script);

        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();
        let mut last = None;
        for i in 0..10 {
            last = Some(session.submit_reply(&oracle, &format!("回答{i}")).await.unwrap());
        }

        assert_eq!(last.unwrap().next_prompt, CLOSING_INVITE);
        assert_eq!(session.phase(), Phase::Replying);
        assert_eq!(session.total_asked(), 10);
        assert_eq!(oracle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_replying_phase_answers_then_closes_on_ack() {
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(30),
            qa("Kubernetes"),
            scored(40),
            qa("Redis"),
            scored(20),
            r#"{"answer": "团队主要使用Rust。"}"#.to_string(),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();
        for reply in ["r1", "r2", "r3"] {
            session.submit_reply(&oracle, reply).await.unwrap();
        }
        assert_eq!(session.phase(), Phase::Replying);

        let outcome = session
            .submit_reply(&oracle, "团队的技术栈是什么？")
            .await
            .unwrap();
        assert_eq!(outcome.next_prompt, "团队主要使用Rust。");
        assert!(!outcome.finished);
        let qa_turn = session.export_history().last().unwrap();
        assert_eq!(qa_turn.phase, Phase::Replying);
        assert_eq!(qa_turn.question, "团队的技术栈是什么？");

        let outcome = session.submit_reply(&oracle, "我没有问题了").await.unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.next_prompt, FAREWELL);
        assert_eq!(session.phase(), Phase::Closed);
        assert!(session.finished());
    }

    #[tokio::test]
    async fn test_two_malformed_generations_force_close_with_one_turn() {
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(80),
            "不是JSON".to_string(),
            "还是不是JSON".to_string(),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();

        let before = session.export_history().len();
        let outcome = session.submit_reply(&oracle, "回答").await.unwrap();

        assert!(outcome.finished);
        assert_eq!(outcome.next_prompt, SYSTEM_CLOSE_QUESTION);
        assert_eq!(session.phase(), Phase::Closed);
        // Exactly one closure turn, no committed broken attempts.
        assert_eq!(session.export_history().len(), before + 1);
        let closure = session.export_history().last().unwrap();
        assert_eq!(closure.question, SYSTEM_CLOSE_QUESTION);
        assert_eq!(closure.answer, SYSTEM_CLOSE_ANSWER);
    }

    #[tokio::test]
    async fn test_single_malformed_generation_recovers_via_retry() {
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(80),
            "一次性故障".to_string(),
            qa("Docker"),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();

        let outcome = session.submit_reply(&oracle, "回答").await.unwrap();
        assert!(!outcome.finished);
        assert_eq!(session.phase(), Phase::Asking);
        assert_eq!(session.export_history().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_reply_on_closed_session_is_rejected() {
        let oracle = ScriptedOracle::new([qa("Docker")]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();
        session.close();

        let before = session.export_history().len();
        let result = session.submit_reply(&oracle, "还在吗").await;
        assert!(matches!(result, Err(InterviewError::SessionClosed)));
        assert_eq!(session.export_history().len(), before);
    }

    #[tokio::test]
    async fn test_committed_turns_always_have_question_and_answer() {
        let oracle = ScriptedOracle::new([
            qa("Docker"),
            scored(80),
            qa("Docker"),
            scored(40),
            qa("Kubernetes"),
        ]);
        let (mut session, _) = InterviewSession::start(&oracle, &docker_sources())
            .await
            .unwrap();
        session.submit_reply(&oracle, "r1").await.unwrap();
        session.submit_reply(&oracle, "r2").await.unwrap();

        for turn in session.export_history() {
            assert!(!turn.question.is_empty());
            assert!(!turn.answer.is_empty());
        }
    }
}
