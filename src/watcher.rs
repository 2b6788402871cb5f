use crate::{
    executor::Executor,
    ledger::{
        Ledger,
        LedgerError,
        MatchCore,
        Reject,
    },
    reader,
    reasoner::{
        self,
        Reasoner,
    },
    turn::{
        TurnDetector,
        TurnKey,
    },
    types::Phase,
    wallets::AgentKey,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use tracing::{
    debug,
    info,
    warn,
};

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStatus {
    /// No match adopted.
    NoMatch,
    /// Match still waiting for activation.
    Waiting,
    /// Not our turn, or the turn was already claimed by an earlier cycle.
    Idle,
    /// A previous cycle's turn handling is still in flight.
    Busy,
    /// We acted; the flag carries whether the shot confirmed.
    Acted(bool),
    /// Match reached its terminal phase; the watcher let go of it.
    Finished,
}

/// Drives one match: polls the ledger, claims turns exactly once, runs the
/// decision pipeline and submits the result.
pub struct GameWatcher<L, R> {
    ledger: L,
    reasoner: Option<R>,
    roster: Vec<AgentKey>,
    executor: Executor,
    detector: TurnDetector,
    match_id: Option<u64>,
    processing: bool,
}

impl<L: Ledger, R: Reasoner> GameWatcher<L, R> {
    pub fn new(
        ledger: L,
        reasoner: Option<R>,
        roster: Vec<AgentKey>,
        executor: Executor,
    ) -> Self {
        Self {
            ledger,
            reasoner,
            roster,
            executor,
            detector: TurnDetector::new(),
            match_id: None,
            processing: false,
        }
    }

    pub fn match_id(&self) -> Option<u64> {
        self.match_id
    }

    /// Adopt a match. Always resets the turn detector: deadlines can
    /// coincidentally repeat across unrelated matches, so claims must never
    /// leak from one match into the next.
    pub fn set_match(&mut self, match_id: u64) {
        info!(%match_id, "adopting match");
        self.match_id = Some(match_id);
        self.detector.reset();
        self.processing = false;
    }

    /// One poll cycle. Errors mean the cycle is skipped; the caller logs and
    /// polls again on the next tick.
    pub async fn poll_once(&mut self) -> Result<WatchStatus> {
        let Some(match_id) = self.match_id else {
            return Ok(WatchStatus::NoMatch);
        };
        if self.processing {
            return Ok(WatchStatus::Busy);
        }

        let core = self.ledger.match_core(match_id).await?;
        match core.phase {
            Phase::Waiting => {
                self.handle_waiting(match_id, &core).await;
                Ok(WatchStatus::Waiting)
            }
            Phase::Finished => {
                match &core.winner {
                    Some(winner) => {
                        info!(%match_id, %winner, prize = core.prize_pool, "match finished")
                    }
                    None => info!(%match_id, "match finished"),
                }
                self.match_id = None;
                Ok(WatchStatus::Finished)
            }
            Phase::Active => {
                let Some(agent) = self
                    .roster
                    .iter()
                    .find(|key| key.address == core.current_turn)
                    .cloned()
                else {
                    return Ok(WatchStatus::Idle);
                };
                let key = TurnKey::new(
                    match_id,
                    core.current_turn.clone(),
                    core.turn_deadline,
                );
                if !self.detector.claim(key) {
                    return Ok(WatchStatus::Idle);
                }

                self.processing = true;
                let result = self.take_turn(match_id, &agent).await;
                self.processing = false;
                Ok(WatchStatus::Acted(result?))
            }
        }
    }

    async fn take_turn(&mut self, match_id: u64, agent: &AgentKey) -> Result<bool> {
        let state = reader::read_match(&self.ledger, match_id, &agent.address).await?;
        let actor_index = state
            .player_index(&agent.address)
            .ok_or_else(|| eyre!("agent {} not seated in match {match_id}", agent.address))?;

        let (actions, path) =
            reasoner::decide_actions(self.reasoner.as_ref(), &state, actor_index).await;
        info!(
            %match_id,
            agent = %agent.name,
            %path,
            action_count = actions.len(),
            "taking turn"
        );

        let confirmed = self
            .executor
            .execute_sequence(&self.ledger, agent, match_id, &actions)
            .await?;
        if !confirmed {
            warn!(%match_id, agent = %agent.name, "turn shot did not confirm");
        }
        Ok(confirmed)
    }

    /// In the waiting phase, push the match to activate once its betting
    /// deadline has elapsed. "Too early" and "wrong phase" answers are the
    /// expected outcome of racing other participants.
    async fn handle_waiting(&self, match_id: u64, core: &MatchCore) {
        let now = match self.ledger.ledger_time().await {
            Ok(now) => now,
            Err(err) => {
                warn!(%match_id, error = %err, "could not read ledger time");
                return;
            }
        };
        if now < core.activation_deadline {
            return;
        }
        let Some(agent) = self.roster.first() else {
            return;
        };
        match self.ledger.activate_match(agent, match_id).await {
            Ok(()) => info!(%match_id, "activated match"),
            Err(LedgerError::Rejected(
                Reject::ActivationTooEarly | Reject::MatchNotActive,
            )) => {
                debug!(%match_id, "activation not accepted yet");
            }
            Err(err) => warn!(%match_id, error = %err, "activation attempt failed"),
        }
    }
}
