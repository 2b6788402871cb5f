use crate::{
    ledger::Ledger,
    types::GameAction,
    wallets::AgentKey,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{
    error,
    warn,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Submits actions to the ledger with bounded retries. Rejections the ledger
/// classifies as permanent (wrong turn, wrong phase, finished match) abort
/// immediately: retrying those can only waste the turn deadline or risk a
/// double submission.
#[derive(Clone, Debug)]
pub struct Executor {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl Executor {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Submit one action, retrying retryable failures with a linearly
    /// growing delay. Returns whether the write confirmed.
    pub async fn submit<L: Ledger>(
        &self,
        ledger: &L,
        key: &AgentKey,
        match_id: u64,
        action: &GameAction,
    ) -> bool {
        for attempt in 1..=self.max_attempts {
            let result = match action {
                GameAction::UseItem { index } => {
                    ledger.use_item(key, match_id, *index).await
                }
                GameAction::ShootOpponent { target } => {
                    ledger.shoot_opponent(key, match_id, target).await
                }
                GameAction::ShootSelf => ledger.shoot_self(key, match_id).await,
            };
            match result {
                Ok(()) => return true,
                Err(err) if !err.is_retryable() => {
                    warn!(%match_id, %action, error = %err, "ledger rejected action, not retrying");
                    return false;
                }
                Err(err) => {
                    warn!(%match_id, %action, attempt, error = %err, "action submission failed");
                    if attempt < self.max_attempts {
                        sleep(self.base_delay * attempt).await;
                    }
                }
            }
        }
        false
    }

    /// Execute a validated sequence: items first, shot last. A dropped item
    /// use is tolerable and logged; the terminal shot's outcome is the
    /// outcome of the whole turn.
    pub async fn execute_sequence<L: Ledger>(
        &self,
        ledger: &L,
        key: &AgentKey,
        match_id: u64,
        actions: &[GameAction],
    ) -> Result<bool> {
        for action in actions {
            if action.is_shot() {
                return Ok(self.submit(ledger, key, match_id, action).await);
            }
            if !self.submit(ledger, key, match_id, action).await {
                warn!(%match_id, %action, "item use dropped, continuing with the turn");
            }
        }
        // The validator guarantees a terminal shot; reaching this point is a
        // programming defect, not a ledger condition.
        error!(%match_id, "validated action sequence ended without a shot");
        Err(eyre!(
            "invariant violation: action sequence for match {match_id} had no terminal shot"
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        ledger::{
            LedgerError,
            Reject,
        },
        test_helpers::{
            FakeLedger,
            match_state,
            test_key,
        },
        types::Address,
    };

    fn executor() -> Executor {
        Executor::new(3, Duration::ZERO)
    }

    fn transient() -> LedgerError {
        LedgerError::Transport("connection reset".into())
    }

    #[tokio::test]
    async fn submit__retries_transient_errors_then_succeeds() {
        let ledger = FakeLedger::new()
            .with_match(match_state().player("0xaa", 80, vec![]).player("0xbb", 60, vec![]).build());
        ledger.script_write(Err(transient()));
        ledger.script_write(Err(transient()));
        ledger.script_write(Ok(()));

        let confirmed = executor()
            .submit(&ledger, &test_key("0xaa"), 1, &GameAction::ShootSelf)
            .await;

        assert!(confirmed);
        assert_eq!(3, ledger.write_count("shoot_self"));
    }

    #[tokio::test]
    async fn submit__gives_up_after_the_retry_bound() {
        let ledger = FakeLedger::new();
        for _ in 0..4 {
            ledger.script_write(Err(transient()));
        }

        let confirmed = executor()
            .submit(&ledger, &test_key("0xaa"), 1, &GameAction::ShootSelf)
            .await;

        assert!(!confirmed);
        assert_eq!(3, ledger.write_count("shoot_self"));
    }

    #[tokio::test]
    async fn submit__aborts_immediately_on_rejection() {
        let ledger = FakeLedger::new();
        ledger.script_write(Err(LedgerError::Rejected(Reject::NotYourTurn)));

        let confirmed = executor()
            .submit(&ledger, &test_key("0xaa"), 1, &GameAction::ShootSelf)
            .await;

        assert!(!confirmed);
        assert_eq!(1, ledger.write_count("shoot_self"));
    }

    #[tokio::test]
    async fn execute_sequence__tolerates_a_dropped_item_use() {
        let ledger = FakeLedger::new();
        // item use fails on every attempt, shot succeeds first try
        for _ in 0..3 {
            ledger.script_write(Err(transient()));
        }
        ledger.script_write(Ok(()));

        let actions = vec![
            GameAction::UseItem { index: 0 },
            GameAction::ShootOpponent {
                target: Address::from("0xbb"),
            },
        ];
        let confirmed = executor()
            .execute_sequence(&ledger, &test_key("0xaa"), 1, &actions)
            .await
            .unwrap();

        assert!(confirmed);
        assert_eq!(3, ledger.write_count("use_item"));
        assert_eq!(1, ledger.write_count("shoot_opponent"));
    }

    #[tokio::test]
    async fn execute_sequence__shot_outcome_is_the_turn_outcome() {
        let ledger = FakeLedger::new();
        ledger.script_write(Ok(())); // item
        ledger.script_write(Err(LedgerError::Rejected(Reject::MatchNotActive))); // shot

        let actions = vec![GameAction::UseItem { index: 0 }, GameAction::ShootSelf];
        let confirmed = executor()
            .execute_sequence(&ledger, &test_key("0xaa"), 1, &actions)
            .await
            .unwrap();

        assert!(!confirmed);
    }

    #[tokio::test]
    async fn execute_sequence__reports_missing_terminal_shot_loudly() {
        let ledger = FakeLedger::new();

        let actions = vec![GameAction::UseItem { index: 0 }];
        let result = executor()
            .execute_sequence(&ledger, &test_key("0xaa"), 1, &actions)
            .await;

        assert!(result.is_err());
    }
}
