//! Session state machine.
//!
//! [`SessionMachine::handle`] takes one [`SessionInput`] and returns the
//! [`SessionAction`]s the driver must perform. The machine does no I/O and
//! holds no clocks, so every transition can be exercised synchronously.
//!
//! ```text
//! Idle ──Connected──▶ AwaitingPeers ──guest added / question──▶ InQuestion
//!                                                               │  ▲
//!                                        answer / countdown = 0 ▼  │ question
//!                                                     AwaitingNextQuestion
//!          InQuestion | AwaitingNextQuestion ──end──▶ Ending ──submitted──▶ Finished
//! ```
//!
//! `leave` moves any phase before `Ending` straight to `Finished`; during
//! `Ending` the phase waits for the submission to settle. A transport that
//! stops for good before the game ends also finishes the session, marked as
//! lost.

use tracing::{debug, info, warn};
use trivia_core::protocol::{JoinPayload, LeavePayload};
use trivia_core::{
    ConnectionState, FinalResult, GameCode, InboundMessage, OutboundEvent, QuestionRound,
    SessionIdentity, SessionPhase,
};
use trivia_api::{RankingOutcome, SubmitOutcome};

use crate::scoring::{Countdown, Scoreboard, Tick};
use crate::snapshot::{AnswerState, RankingState, SessionSnapshot, SubmissionState};

/// Default countdown start value.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 5;
/// Default points for a correct answer.
pub const DEFAULT_CORRECT_ANSWER_POINTS: u32 = 10;

/// Game rules for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Countdown start value for every question.
    pub countdown_seconds: u32,
    /// Points for a correct first answer.
    pub correct_answer_points: u32,
    /// Re-send `joined` when the connection comes back mid-session.
    pub rejoin_on_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            correct_answer_points: DEFAULT_CORRECT_ANSWER_POINTS,
            rejoin_on_reconnect: true,
        }
    }
}

/// Something that happened to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInput {
    /// The transport changed connection state.
    Connection {
        /// New state.
        state: ConnectionState,
        /// Transport connection epoch when the state was read.
        epoch: u64,
    },
    /// The transport stopped for good and will not reconnect.
    TransportClosed,
    /// A decoded server event.
    Inbound(InboundMessage),
    /// Host intent: start the round.
    Start,
    /// Participant intent: choose an option by its text.
    Select(String),
    /// One countdown unit elapsed.
    Tick,
    /// Participant intent: leave the game.
    Leave,
    /// Participant intent: submit the final result again after a failure.
    RetrySubmission,
    /// The score submission finished.
    SubmissionFinished(SubmitOutcome),
    /// Ranking polling finished.
    RankingFinished(RankingOutcome),
}

/// Side effect requested by the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Send an event to the game server.
    Emit(OutboundEvent),
    /// Close the connection.
    Disconnect,
    /// (Re)start the countdown ticker from a full period.
    StartTicker,
    /// Stop the countdown ticker.
    StopTicker,
    /// Submit the final result once.
    Submit(FinalResult),
    /// Start polling the ranking for a game.
    PollRanking(GameCode),
    /// Stop ranking polling.
    CancelRanking,
}

/// State of one session.
#[derive(Debug)]
pub struct SessionMachine {
    identity: SessionIdentity,
    token: String,
    config: SessionConfig,
    phase: SessionPhase,
    connection: ConnectionState,
    connected_epoch: Option<u64>,
    connection_lost: bool,
    round: Option<QuestionRound>,
    answer: AnswerState,
    question_number: u32,
    last_topic: Option<String>,
    scoreboard: Scoreboard,
    countdown: Countdown,
    final_result: Option<FinalResult>,
    submission: SubmissionState,
    ranking: RankingState,
    leave_sent: bool,
    abandoned: bool,
}

impl SessionMachine {
    /// A new `Idle` session for `identity`, authenticated by `token`.
    pub fn new(identity: SessionIdentity, token: impl Into<String>, config: SessionConfig) -> Self {
        let countdown = Countdown::new(config.countdown_seconds);
        Self {
            identity,
            token: token.into(),
            config,
            phase: SessionPhase::Idle,
            connection: ConnectionState::Disconnected,
            connected_epoch: None,
            connection_lost: false,
            round: None,
            answer: AnswerState::Unanswered,
            question_number: 0,
            last_topic: None,
            scoreboard: Scoreboard::new(),
            countdown,
            final_result: None,
            submission: SubmissionState::NotStarted,
            ranking: RankingState::Idle,
            leave_sent: false,
            abandoned: false,
        }
    }

    /// Apply one input.
    pub fn handle(&mut self, input: SessionInput) -> Vec<SessionAction> {
        match input {
            SessionInput::Connection { state, epoch } => self.on_connection(state, epoch),
            SessionInput::TransportClosed => self.on_transport_closed(),
            SessionInput::Inbound(InboundMessage::GuestAdded(_)) => self.on_guest_added(),
            SessionInput::Inbound(InboundMessage::Question(round)) => self.on_question_arrived(round),
            SessionInput::Inbound(InboundMessage::End(_)) => self.on_end_received(),
            SessionInput::Start => self.start_session(),
            SessionInput::Select(option) => self.on_option_selected(&option),
            SessionInput::Tick => self.on_tick(),
            SessionInput::Leave => self.leave(),
            SessionInput::RetrySubmission => self.retry_submission(),
            SessionInput::SubmissionFinished(outcome) => self.on_submission_finished(outcome),
            SessionInput::RankingFinished(outcome) => self.on_ranking_finished(outcome),
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Last reported connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Running score.
    pub fn score(&self) -> u32 {
        self.scoreboard.total()
    }

    /// Countdown units left.
    pub fn countdown(&self) -> u32 {
        self.countdown.remaining()
    }

    /// Result built at game end.
    pub fn final_result(&self) -> Option<&FinalResult> {
        self.final_result.as_ref()
    }

    /// Whether nothing more will happen: terminal with no request in flight.
    ///
    /// A failed submission keeps the session open for a retry until the
    /// participant leaves.
    pub fn is_done(&self) -> bool {
        let awaiting_retry =
            matches!(self.submission, SubmissionState::Failed(_)) && !self.abandoned;
        self.phase.is_terminal()
            && self.submission != SubmissionState::Pending
            && self.ranking != RankingState::Polling
            && !awaiting_retry
    }

    /// Copy of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            phase: self.phase,
            connection: self.connection,
            connection_lost: self.connection_lost,
            question: self.round.clone(),
            question_number: self.question_number,
            answer: self.answer.clone(),
            countdown: self.countdown.remaining(),
            score: self.scoreboard.total(),
            final_result: self.final_result.clone(),
            submission: self.submission.clone(),
            ranking: self.ranking.clone(),
        }
    }

    // ─── Connection ──────────────────────────────────────────────────────

    /// Every new connection epoch seen as `Connected` is a fresh join, even
    /// when the drop in between was never observed.
    fn on_connection(&mut self, state: ConnectionState, epoch: u64) -> Vec<SessionAction> {
        let previous = self.connection;
        self.connection = state;
        if state != previous {
            debug!(game_code = %self.identity.game_code, %previous, %state, epoch, phase = %self.phase, "connection changed");
        }

        match state {
            ConnectionState::Connected => {
                if self.connected_epoch == Some(epoch) {
                    return Vec::new();
                }
                let reconnect = self.connected_epoch.is_some();
                self.connected_epoch = Some(epoch);
                if self.phase == SessionPhase::Idle {
                    self.phase = SessionPhase::AwaitingPeers;
                    info!(game_code = %self.identity.game_code, "connected, joining");
                    vec![self.joined()]
                } else if reconnect && self.phase.is_active() {
                    if self.config.rejoin_on_reconnect {
                        info!(game_code = %self.identity.game_code, phase = %self.phase, epoch, "connection restored, rejoining");
                        vec![self.joined()]
                    } else {
                        warn!(game_code = %self.identity.game_code, phase = %self.phase, "connection restored, not rejoining");
                        Vec::new()
                    }
                } else {
                    Vec::new()
                }
            }
            ConnectionState::Disconnected if state != previous && self.phase.is_active() => {
                warn!(game_code = %self.identity.game_code, phase = %self.phase, "connection lost mid-session");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// The transport gave up. A session that has not reached the end of the
    /// game cannot continue and finishes as lost.
    fn on_transport_closed(&mut self) -> Vec<SessionAction> {
        self.connection = ConnectionState::Disconnected;
        if self.phase != SessionPhase::Idle && !self.phase.is_active() {
            debug!(phase = %self.phase, "transport closed");
            return Vec::new();
        }

        warn!(game_code = %self.identity.game_code, phase = %self.phase, "transport closed for good, session lost");
        self.connection_lost = true;
        self.abandoned = true;
        self.phase = SessionPhase::Finished;
        vec![SessionAction::StopTicker]
    }

    fn joined(&self) -> SessionAction {
        SessionAction::Emit(OutboundEvent::Joined(JoinPayload::new(
            &self.identity,
            &self.token,
        )))
    }

    // ─── Operations ──────────────────────────────────────────────────────

    /// Host asks the server to start: emits `start game` then `add guest`.
    ///
    /// Ignored with a warning unless this participant is the host, the
    /// transport is connected, and the session is waiting for peers.
    pub fn start_session(&mut self) -> Vec<SessionAction> {
        if !self.identity.is_host {
            warn!(game_code = %self.identity.game_code, "only the host can start the game");
            return Vec::new();
        }
        if self.connection != ConnectionState::Connected {
            warn!(game_code = %self.identity.game_code, connection = %self.connection, "cannot start while not connected");
            return Vec::new();
        }
        if self.phase != SessionPhase::AwaitingPeers {
            warn!(game_code = %self.identity.game_code, phase = %self.phase, "start ignored");
            return Vec::new();
        }

        info!(game_code = %self.identity.game_code, "starting game");
        let payload = JoinPayload::new(&self.identity, &self.token);
        vec![
            SessionAction::Emit(OutboundEvent::StartGame(payload.clone())),
            SessionAction::Emit(OutboundEvent::AddGuest(payload)),
        ]
    }

    fn on_guest_added(&mut self) -> Vec<SessionAction> {
        if self.phase == SessionPhase::AwaitingPeers {
            info!(game_code = %self.identity.game_code, "guest added, game starting");
            self.phase = SessionPhase::InQuestion;
        } else {
            debug!(phase = %self.phase, "guest added ignored");
        }
        Vec::new()
    }

    /// A new question supersedes the current one.
    ///
    /// The previous answer is cleared before the round becomes visible and
    /// the countdown restarts at its full value.
    pub fn on_question_arrived(&mut self, round: QuestionRound) -> Vec<SessionAction> {
        if !self.phase.is_active() {
            debug!(phase = %self.phase, question = round.id, "question outside an active game dropped");
            return Vec::new();
        }

        self.answer = AnswerState::Unanswered;
        self.countdown.restart();
        self.question_number += 1;
        if !round.topic_id.is_empty() {
            self.last_topic = Some(round.topic_id.clone());
        }
        debug!(
            game_code = %self.identity.game_code,
            question = round.id,
            number = self.question_number,
            "question arrived"
        );
        self.round = Some(round);
        self.phase = SessionPhase::InQuestion;
        vec![SessionAction::StartTicker]
    }

    /// The participant picks an option. The first pick of a round binds.
    pub fn on_option_selected(&mut self, option: &str) -> Vec<SessionAction> {
        if self.phase != SessionPhase::InQuestion || self.answer != AnswerState::Unanswered {
            debug!(phase = %self.phase, "selection rejected");
            return Vec::new();
        }
        let Some(round) = &self.round else {
            debug!("selection rejected, no question yet");
            return Vec::new();
        };

        let is_correct = round.is_correct(option);
        if is_correct {
            self.scoreboard.award(self.config.correct_answer_points);
        }
        debug!(question = round.id, is_correct, score = self.scoreboard.total(), "answered");
        self.answer = AnswerState::Answered {
            selected: option.to_string(),
            is_correct,
        };
        self.phase = SessionPhase::AwaitingNextQuestion;
        Vec::new()
    }

    fn on_tick(&mut self) -> Vec<SessionAction> {
        if !matches!(
            self.phase,
            SessionPhase::InQuestion | SessionPhase::AwaitingNextQuestion
        ) {
            return vec![SessionAction::StopTicker];
        }
        match self.countdown.tick() {
            Tick::Running(_) => Vec::new(),
            Tick::Expired => {
                let mut actions = vec![SessionAction::StopTicker];
                actions.extend(self.on_countdown_expired());
                actions
            }
            Tick::Idle => vec![SessionAction::StopTicker],
        }
    }

    /// Time is up on the current question. An unanswered question simply
    /// resolves; there is no penalty.
    pub fn on_countdown_expired(&mut self) -> Vec<SessionAction> {
        if self.phase == SessionPhase::InQuestion && self.answer == AnswerState::Unanswered {
            debug!(game_code = %self.identity.game_code, "time up, unanswered");
            self.phase = SessionPhase::AwaitingNextQuestion;
        }
        Vec::new()
    }

    /// The game is over: build the final result, leave, and submit once.
    ///
    /// The topic comes from the identity when set, otherwise from the most
    /// recent question.
    pub fn on_end_received(&mut self) -> Vec<SessionAction> {
        if self.final_result.is_some() {
            debug!("duplicate end ignored");
            return Vec::new();
        }
        if !matches!(
            self.phase,
            SessionPhase::InQuestion | SessionPhase::AwaitingNextQuestion
        ) {
            warn!(phase = %self.phase, "end outside a round dropped");
            return Vec::new();
        }

        let topic_id = if self.identity.topic_id.is_empty() {
            self.last_topic.clone().unwrap_or_default()
        } else {
            self.identity.topic_id.clone()
        };
        let result = FinalResult {
            topic_id,
            game_code: self.identity.game_code.clone(),
            player_score: self.scoreboard.total(),
            player_name: self.identity.participant_name.clone(),
        };
        info!(
            game_code = %result.game_code,
            score = result.player_score,
            topic = %result.topic_id,
            "game over"
        );

        self.final_result = Some(result.clone());
        self.submission = SubmissionState::Pending;
        self.phase = SessionPhase::Ending;

        let mut actions = vec![SessionAction::StopTicker];
        actions.extend(self.leave_event());
        actions.push(SessionAction::Disconnect);
        actions.push(SessionAction::Submit(result));
        actions
    }

    /// Leave the game from any non-terminal phase. Idempotent.
    ///
    /// While the result is being submitted this only skips ranking
    /// retrieval; after the game has finished it only stops retrieval.
    pub fn leave(&mut self) -> Vec<SessionAction> {
        self.abandoned = true;
        if self.phase == SessionPhase::Ending {
            debug!(game_code = %self.identity.game_code, "leave during submission, ranking skipped");
            return Vec::new();
        }
        if self.phase.is_terminal() {
            if self.ranking == RankingState::Polling {
                self.ranking = RankingState::Idle;
                return vec![SessionAction::CancelRanking];
            }
            return Vec::new();
        }

        info!(game_code = %self.identity.game_code, phase = %self.phase, "leaving");
        let mut actions = vec![SessionAction::StopTicker];
        actions.extend(self.leave_event());
        actions.push(SessionAction::Disconnect);
        self.phase = SessionPhase::Finished;
        actions
    }

    fn leave_event(&mut self) -> Option<SessionAction> {
        if self.leave_sent {
            return None;
        }
        self.leave_sent = true;
        Some(SessionAction::Emit(OutboundEvent::Leave(LeavePayload::new(
            &self.identity,
        ))))
    }

    // ─── Result reporting ────────────────────────────────────────────────

    fn on_submission_finished(&mut self, outcome: SubmitOutcome) -> Vec<SessionAction> {
        if self.submission != SubmissionState::Pending {
            debug!("unexpected submission result ignored");
            return Vec::new();
        }
        self.phase = SessionPhase::Finished;

        match outcome {
            SubmitOutcome::Success => {
                self.submission = SubmissionState::Submitted;
                if !self.abandoned {
                    self.ranking = RankingState::Polling;
                    return vec![SessionAction::PollRanking(self.identity.game_code.clone())];
                }
                Vec::new()
            }
            SubmitOutcome::Error(error) => {
                self.submission = SubmissionState::Failed(error.message);
                Vec::new()
            }
        }
    }

    /// Submit the final result again after a failed attempt.
    pub fn retry_submission(&mut self) -> Vec<SessionAction> {
        if !matches!(self.submission, SubmissionState::Failed(_)) {
            debug!(submission = ?self.submission, "retry ignored");
            return Vec::new();
        }
        let Some(result) = self.final_result.clone() else {
            return Vec::new();
        };
        info!(game_code = %result.game_code, "retrying result submission");
        self.submission = SubmissionState::Pending;
        vec![SessionAction::Submit(result)]
    }

    fn on_ranking_finished(&mut self, outcome: RankingOutcome) -> Vec<SessionAction> {
        if self.ranking != RankingState::Polling {
            debug!("stale ranking result ignored");
            return Vec::new();
        }
        self.ranking = match outcome {
            RankingOutcome::Ready(entries) => RankingState::Ready(entries),
            RankingOutcome::Unavailable { attempts } => RankingState::Unavailable { attempts },
            RankingOutcome::Cancelled => RankingState::Idle,
        };
        Vec::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
