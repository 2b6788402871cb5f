use crate::{
    ledger::{
        Ledger,
        LedgerError,
        LedgerResult,
        Reject,
    },
    types::Phase,
    wallets::AgentKey,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Stateless check run on a coarser cadence than the main poll: when the
/// ledger's own turn deadline has passed, force the stalled turn forward.
pub async fn enforce<L: Ledger>(
    ledger: &L,
    key: &AgentKey,
    match_id: u64,
) -> LedgerResult<()> {
    let core = ledger.match_core(match_id).await?;
    if core.phase != Phase::Active {
        return Ok(());
    }
    let now = ledger.ledger_time().await?;
    if now <= core.turn_deadline {
        return Ok(());
    }

    match ledger.force_timeout(key, match_id).await {
        Ok(()) => {
            info!(%match_id, stalled = %core.current_turn, "forced a stalled turn forward");
        }
        // Fine: our clock read was ahead of the ledger's own check.
        Err(LedgerError::Rejected(Reject::TurnNotExpired)) => {
            debug!(%match_id, "turn not expired on the ledger yet");
        }
        Err(err) => warn!(%match_id, error = %err, "force-timeout attempt failed"),
    }
    Ok(())
}
