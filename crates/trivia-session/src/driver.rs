//! Session driver task.
//!
//! [`spawn_session`] moves a [`SessionMachine`] into one tokio task. The task
//! waits on every input source at once: participant intents from the
//! [`SessionHandle`], transport state changes, inbound events, the countdown
//! ticker, and completions of the submission and ranking requests it
//! started. Each input is applied to the machine in arrival order, the
//! resulting actions are executed, and the new snapshot is published.
//!
//! The task ends once the machine is done, returning the last snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trivia_api::{GameApi, ResultReporter};
use trivia_core::protocol::decode_inbound;
use trivia_core::{ConnectionState, PayloadEncoding, PollPolicy, SessionIdentity};
use trivia_transport::{RawEvent, Transport};

use crate::machine::{SessionAction, SessionConfig, SessionInput, SessionMachine};
use crate::snapshot::SessionSnapshot;

/// Default duration of one countdown unit.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime parameters of a session task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    /// Game rules.
    pub session: SessionConfig,
    /// Duration of one countdown unit.
    pub tick_interval: Duration,
    /// Ranking polling bounds.
    pub ranking: PollPolicy,
    /// How outbound payloads are placed on the wire.
    pub payload_encoding: PayloadEncoding,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            ranking: PollPolicy::default(),
            payload_encoding: PayloadEncoding::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Observer and intent side of a running session.
///
/// Dropping the handle leaves the game.
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<SessionInput>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<SessionSnapshot>,
}

impl SessionHandle {
    /// Ask the server to start the game. Only meaningful for the host.
    pub fn start(&self) {
        self.send(SessionInput::Start);
    }

    /// Choose the option whose text is `option`.
    pub fn select(&self, option: impl Into<String>) {
        self.send(SessionInput::Select(option.into()));
    }

    /// Leave the game, or stop ranking retrieval once it is over.
    pub fn leave(&self) {
        self.send(SessionInput::Leave);
    }

    /// Submit the final result again after a failure.
    pub fn retry_submission(&self) {
        self.send(SessionInput::RetrySubmission);
    }

    fn send(&self, input: SessionInput) {
        if self.intents.send(input).is_err() {
            debug!("session already finished, intent dropped");
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Feed of snapshots, one per observable change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate`.
    ///
    /// Returns `None` if the session ends first without ever satisfying it.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.snapshots.clone();
        match rx.wait_for(|s| predicate(s)).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        }
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end and return its final snapshot.
    pub async fn join(self) -> SessionSnapshot {
        let Self {
            intents,
            snapshots,
            task,
        } = self;
        let result = task.await;
        drop(intents);
        match result {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "session task failed");
                snapshots.borrow().clone()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Start a session for `identity` over `transport`, reporting through `api`.
///
/// Must be called inside a tokio runtime. The transport is expected to be
/// connecting already; its current state is the first input.
pub fn spawn_session(
    identity: SessionIdentity,
    token: impl Into<String>,
    config: DriverConfig,
    transport: Arc<dyn Transport>,
    api: Arc<dyn GameApi>,
) -> SessionHandle {
    let machine = SessionMachine::new(identity, token, config.session.clone());
    let (snapshot_tx, snapshots) = watch::channel(machine.snapshot());
    let (intents, intent_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    // Subscribe before spawning so nothing sent in between is lost.
    let inputs = Inputs {
        intents: intent_rx,
        completions: completion_rx,
        state: transport.state(),
        events: transport.subscribe(),
        ticker: None,
    };
    let driver = Driver {
        machine,
        transport,
        reporter: ResultReporter::new(api),
        config,
        snapshot_tx,
        completion_tx,
        ranking_cancel: CancellationToken::new(),
    };
    let task = tokio::spawn(driver.run(inputs));

    SessionHandle {
        intents,
        snapshots,
        task,
    }
}

struct Inputs {
    intents: mpsc::UnboundedReceiver<SessionInput>,
    completions: mpsc::UnboundedReceiver<SessionInput>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Receiver<RawEvent>,
    ticker: Option<Interval>,
}

struct Driver {
    machine: SessionMachine,
    transport: Arc<dyn Transport>,
    reporter: ResultReporter,
    config: DriverConfig,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    completion_tx: mpsc::UnboundedSender<SessionInput>,
    ranking_cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self, mut inputs: Inputs) -> SessionSnapshot {
        let game_code = self.machine.snapshot().identity.game_code;
        info!(%game_code, "session started");

        let initial = self.connection_input(&mut inputs.state);
        self.dispatch(initial, &mut inputs);

        let mut intents_open = true;
        let mut state_open = true;
        let mut events_open = true;

        while !self.machine.is_done() {
            let input = tokio::select! {
                intent = inputs.intents.recv(), if intents_open => match intent {
                    Some(intent) => Some(intent),
                    None => {
                        debug!(%game_code, "handle dropped, leaving");
                        intents_open = false;
                        Some(SessionInput::Leave)
                    }
                },
                Some(done) = inputs.completions.recv() => Some(done),
                changed = inputs.state.changed(), if state_open => match changed {
                    Ok(()) => Some(self.connection_input(&mut inputs.state)),
                    Err(_) => {
                        state_open = false;
                        Some(SessionInput::TransportClosed)
                    }
                },
                event = inputs.events.recv(), if events_open => match event {
                    Ok(event) => decode(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%game_code, skipped, "session lagged, inbound events dropped");
                        None
                    }
                    Err(RecvError::Closed) => {
                        events_open = false;
                        None
                    }
                },
                () = next_tick(&mut inputs.ticker) => Some(SessionInput::Tick),
            };

            if let Some(input) = input {
                self.dispatch(input, &mut inputs);
            }
        }

        self.ranking_cancel.cancel();
        let snapshot = self.machine.snapshot();
        info!(%game_code, phase = %snapshot.phase, score = snapshot.score, "session ended");
        snapshot
    }

    /// Latest connection state paired with the epoch it belongs to.
    ///
    /// The epoch is bumped before a transport publishes `Connected`, so a
    /// `Connected` read here never carries an older epoch than its own.
    fn connection_input(&self, state: &mut watch::Receiver<ConnectionState>) -> SessionInput {
        let state = *state.borrow_and_update();
        SessionInput::Connection {
            state,
            epoch: self.transport.connection_epoch(),
        }
    }

    fn dispatch(&mut self, input: SessionInput, inputs: &mut Inputs) {
        for action in self.machine.handle(input) {
            self.execute(action, inputs);
        }
        let next = self.machine.snapshot();
        let _ = self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn execute(&mut self, action: SessionAction, inputs: &mut Inputs) {
        match action {
            SessionAction::Emit(event) => {
                debug!(event = event.name(), "emit");
                self.transport
                    .emit(event.name(), event.encode_payload(self.config.payload_encoding));
            }
            SessionAction::Disconnect => self.transport.disconnect(),
            SessionAction::StartTicker => {
                let period = self.config.tick_interval;
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                inputs.ticker = Some(ticker);
            }
            SessionAction::StopTicker => inputs.ticker = None,
            SessionAction::Submit(result) => {
                let reporter = self.reporter.clone();
                let tx = self.completion_tx.clone();
                drop(tokio::spawn(async move {
                    let outcome = reporter.submit(&result).await;
                    let _ = tx.send(SessionInput::SubmissionFinished(outcome));
                }));
            }
            SessionAction::PollRanking(game_code) => {
                let reporter = self.reporter.clone();
                let tx = self.completion_tx.clone();
                let policy = self.config.ranking.clone();
                let cancel = self.ranking_cancel.child_token();
                drop(tokio::spawn(async move {
                    let outcome = reporter.poll_ranking(&game_code, &policy, &cancel).await;
                    let _ = tx.send(SessionInput::RankingFinished(outcome));
                }));
            }
            SessionAction::CancelRanking => self.ranking_cancel.cancel(),
        }
    }
}

fn decode(event: RawEvent) -> Option<SessionInput> {
    match decode_inbound(&event.name, event.payload) {
        Ok(Some(message)) => {
            debug!(event = message.event_name(), "inbound");
            Some(SessionInput::Inbound(message))
        }
        Ok(None) => {
            debug!(event = %event.name, "unhandled event ignored");
            None
        }
        Err(error) => {
            warn!(event = %event.name, %error, "malformed event dropped");
            None
        }
    }
}

/// Next tick of `ticker`, or never while it is stopped.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            let _ = ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
