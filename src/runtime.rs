use crate::{
    config::AppConfig,
    executor::Executor,
    ledger::Ledger,
    matchmaker::Matchmaker,
    reasoner::Reasoner,
    timeout,
    wallets::AgentKey,
    watcher::{
        GameWatcher,
        WatchStatus,
    },
};
use color_eyre::eyre::Result;
use tokio::time::{
    self,
    MissedTickBehavior,
};
use tracing::{
    debug,
    info,
    warn,
};

enum Exit {
    Finished,
    Shutdown,
}

/// Top-level agent loop: acquire a match, watch it to the end, repeat.
/// Ctrl-c ends the loop between and during matches.
pub async fn run<L, R>(
    ledger: L,
    reasoner: Option<R>,
    roster: Vec<AgentKey>,
    config: &AppConfig,
) -> Result<()>
where
    L: Ledger + Clone,
    R: Reasoner,
{
    let matchmaker = Matchmaker::new(
        ledger.clone(),
        roster.clone(),
        config.buy_in,
        config.table_size,
        config.settle_delay,
        config.retry_delay,
    );
    let mut watcher =
        GameWatcher::new(ledger.clone(), reasoner, roster.clone(), Executor::default());

    loop {
        let match_id = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            match_id = matchmaker.acquire() => match_id,
        };

        watcher.set_match(match_id);
        match watch_match(&mut watcher, &ledger, &roster, config).await {
            Exit::Finished => {
                info!(%match_id, "match over, returning to matchmaking");
            }
            Exit::Shutdown => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Poll one match until it finishes. The timeout enforcer runs alongside on
/// its own, slower cadence. Any single-cycle error is logged and the loop
/// keeps polling.
async fn watch_match<L, R>(
    watcher: &mut GameWatcher<L, R>,
    ledger: &L,
    roster: &[AgentKey],
    config: &AppConfig,
) -> Exit
where
    L: Ledger,
    R: Reasoner,
{
    let mut poll = time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut timeout_tick = time::interval(config.timeout_interval);
    timeout_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Exit::Shutdown,
            _ = poll.tick() => {
                match watcher.poll_once().await {
                    Ok(WatchStatus::Finished) => return Exit::Finished,
                    Ok(status) => debug!(?status, "poll cycle"),
                    Err(err) => warn!(error = %err, "poll cycle skipped"),
                }
            }
            _ = timeout_tick.tick() => {
                let Some(match_id) = watcher.match_id() else { continue };
                let Some(enforcer) = roster.first() else { continue };
                if let Err(err) = timeout::enforce(ledger, enforcer, match_id).await {
                    warn!(error = %err, "timeout check skipped");
                }
            }
        }
    }
}
