use crate::{
    ledger::{
        Ledger,
        LedgerError,
        LedgerResult,
        Reject,
    },
    types::Address,
    wallets::AgentKey,
};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{
    debug,
    info,
    warn,
};

/// Starts (or adopts) a match for the managed roster. Other operators may be
/// racing to start the same match; the race is not prevented but resolved
/// after the fact: record the match-id counter before acting, then scan from
/// that anchor for whichever match actually got our agents seated.
pub struct Matchmaker<L> {
    ledger: L,
    roster: Vec<AgentKey>,
    buy_in: u64,
    table_size: usize,
    settle_delay: Duration,
    retry_delay: Duration,
}

impl<L: Ledger> Matchmaker<L> {
    pub fn new(
        ledger: L,
        roster: Vec<AgentKey>,
        buy_in: u64,
        table_size: usize,
        settle_delay: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            roster,
            buy_in,
            table_size,
            settle_delay,
            retry_delay,
        }
    }

    /// Keep attempting until a match containing a managed agent exists.
    pub async fn acquire(&self) -> u64 {
        loop {
            match self.attempt().await {
                Ok(Some(match_id)) => return match_id,
                Ok(None) => debug!("no adoptable match yet"),
                Err(err) => warn!(error = %err, "matchmaking cycle failed"),
            }
            // Small jitter so several operators do not hammer the queue in
            // lockstep.
            let jitter = rand::rng().random_range(0..250);
            sleep(self.retry_delay + Duration::from_millis(jitter)).await;
        }
    }

    /// One full join → settle → start → scan pass.
    pub async fn attempt(&self) -> LedgerResult<Option<u64>> {
        // The anchor must be recorded before any action: a match started by
        // a third party between here and our own start attempt would
        // otherwise be invisible to the scan.
        let anchor = self.ledger.next_match_id().await?;

        for agent in &self.roster {
            match self.ledger.join_queue(agent, self.buy_in).await {
                Ok(()) => debug!(agent = %agent.name, "joined queue"),
                Err(LedgerError::Rejected(Reject::AlreadyQueued)) => {
                    debug!(agent = %agent.name, "already queued");
                }
                Err(err) => {
                    warn!(agent = %agent.name, error = %err, "queue join failed");
                }
            }
        }

        sleep(self.settle_delay).await;

        let queue_len = self.ledger.queue_len(self.buy_in).await?;
        if queue_len >= self.table_size {
            match self
                .ledger
                .start_match(&self.roster[0], self.buy_in, self.table_size)
                .await
            {
                Ok(()) => info!("match start accepted"),
                // Someone else may have started it first; the scan below
                // finds whatever match our agents ended up in.
                Err(err) => info!(error = %err, "direct start failed, scanning from anchor"),
            }
        }

        self.scan_from(anchor).await
    }

    /// First match at or after the anchor whose player set intersects the
    /// managed roster.
    async fn scan_from(&self, anchor: u64) -> LedgerResult<Option<u64>> {
        let next = self.ledger.next_match_id().await?;
        for match_id in anchor..next {
            let players = self.ledger.match_players(match_id).await?;
            if players.iter().any(|player| self.is_managed(player)) {
                info!(%match_id, "adopting match with managed agents");
                return Ok(Some(match_id));
            }
        }
        Ok(None)
    }

    fn is_managed(&self, address: &Address) -> bool {
        self.roster.iter().any(|key| &key.address == address)
    }
}
