use crate::{
    ledger::{
        Ledger,
        LedgerResult,
    },
    types::{
        Address,
        MatchState,
        PlayerInfo,
    },
};
use futures::future::try_join_all;

/// Pull one consistent snapshot of a match as seen by `viewer`.
///
/// The per-player item reads and the viewer's private reads are independent
/// I/O, so they are issued concurrently: latency is bounded by the slowest
/// single call, not the sum.
pub async fn read_match<L: Ledger>(
    ledger: &L,
    match_id: u64,
    viewer: &Address,
) -> LedgerResult<MatchState> {
    let core = ledger.match_core(match_id).await?;

    let item_reads = core
        .players
        .iter()
        .map(|row| ledger.items(match_id, &row.address));
    let (items, saw_active, shell_hint) = futures::try_join!(
        try_join_all(item_reads),
        ledger.saw_active(match_id, viewer),
        ledger.shell_hint(match_id, viewer),
    )?;

    let players = core
        .players
        .into_iter()
        .zip(items)
        .map(|(row, items)| PlayerInfo {
            address: row.address,
            hp: row.hp,
            alive: row.alive,
            items,
        })
        .collect();

    Ok(MatchState {
        match_id,
        phase: core.phase,
        round: core.round,
        players,
        current_turn: core.current_turn,
        turn_deadline: core.turn_deadline,
        activation_deadline: core.activation_deadline,
        shells_remaining: core.shells_remaining,
        live_remaining: core.live_remaining,
        blank_remaining: core.blank_remaining,
        shell_known: shell_hint.is_some(),
        known_shell_is_live: shell_hint.unwrap_or(false),
        saw_active,
        winner: core.winner,
        prize_pool: core.prize_pool,
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        test_helpers::{
            FakeLedger,
            match_state,
        },
        types::Item,
    };

    #[tokio::test]
    async fn read_match__assembles_items_and_private_knowledge() {
        let state = match_state()
            .match_id(3)
            .player("0xaa", 80, vec![Item::Magnifier])
            .player("0xbb", 60, vec![Item::Handsaw, Item::Nothing])
            .shells(2, 1)
            .known_shell(true)
            .build();
        let ledger = FakeLedger::new().with_match(state.clone());

        let read = read_match(&ledger, 3, &"0xaa".into()).await.unwrap();

        assert_eq!(state.players, read.players);
        assert!(read.shell_known);
        assert!(read.known_shell_is_live);
        assert_eq!(2.0 / 3.0, read.live_probability());
    }

    #[tokio::test]
    async fn read_match__probability_is_zero_when_chamber_is_empty() {
        let state = match_state()
            .match_id(3)
            .player("0xaa", 80, vec![])
            .player("0xbb", 60, vec![])
            .shells(0, 0)
            .build();
        let ledger = FakeLedger::new().with_match(state);

        let read = read_match(&ledger, 3, &"0xaa".into()).await.unwrap();

        assert_eq!(0.0, read.live_probability());
    }
}
