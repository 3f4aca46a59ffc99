//! Read-only session view for observers.

use trivia_core::{
    ConnectionState, FinalResult, QuestionRound, RankingEntry, SessionIdentity, SessionPhase,
};

/// Answer state of the current round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AnswerState {
    /// Nothing selected this round.
    #[default]
    Unanswered,
    /// The binding first selection.
    Answered {
        /// Option text chosen.
        selected: String,
        /// Whether it matched the correct answer.
        is_correct: bool,
    },
}

/// Progress of the final score submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    /// The game has not ended.
    #[default]
    NotStarted,
    /// Request in flight.
    Pending,
    /// The server recorded the score.
    Submitted,
    /// The request failed with this display message.
    Failed(String),
}

/// Progress of ranking retrieval.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RankingState {
    /// Not polling.
    #[default]
    Idle,
    /// Fetching until a non-empty list arrives.
    Polling,
    /// The ranked list.
    Ready(Vec<RankingEntry>),
    /// Gave up after this many fetches.
    Unavailable {
        /// Fetches made.
        attempts: u32,
    },
}

/// Everything an observer may show about a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Who the local participant is.
    pub identity: SessionIdentity,
    /// Life-cycle phase.
    pub phase: SessionPhase,
    /// Transport connection state.
    pub connection: ConnectionState,
    /// The transport stopped for good before the game ended.
    pub connection_lost: bool,
    /// Current question, if one has arrived.
    pub question: Option<QuestionRound>,
    /// 1-based number of the current question; 0 before the first.
    pub question_number: u32,
    /// Answer state of the current question.
    pub answer: AnswerState,
    /// Countdown units left on the current question.
    pub countdown: u32,
    /// Running score.
    pub score: u32,
    /// Result built when the game ended.
    pub final_result: Option<FinalResult>,
    /// Submission progress.
    pub submission: SubmissionState,
    /// Ranking progress.
    pub ranking: RankingState,
}

impl SessionSnapshot {
    /// Whether answer options accept a selection.
    pub fn options_enabled(&self) -> bool {
        self.phase == SessionPhase::InQuestion
            && self.question.is_some()
            && self.answer == AnswerState::Unanswered
    }

    /// Whether the connection is down while the game is still on.
    pub fn is_reconnecting(&self) -> bool {
        self.phase.is_active()
            && !self.connection_lost
            && self.connection != ConnectionState::Connected
    }
}
