use crate::types::{
    GameAction,
    Item,
    MatchState,
};
use std::collections::HashSet;
use thiserror::Error;

/// Why a whole sequence was thrown out. Item-level problems are pruned, not
/// rejected; these are the unrecoverable cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("shot targets {0} which is not an alive opponent")]
    InvalidTarget(crate::types::Address),
    #[error("sequence is empty after pruning")]
    Empty,
    #[error("sequence does not end in a shot")]
    NoTerminalShot,
    #[error("sequence contains more than one shot")]
    MultipleShots,
}

/// Check a proposed sequence against the current snapshot.
///
/// Invalid item uses (out of bounds, empty slot, already spent earlier in
/// this same sequence) are silently dropped. An opponent shot at anything
/// other than a currently alive opponent invalidates the whole sequence:
/// it signals the upstream reasoning was working from a wrong picture.
/// What survives must be zero-or-more item uses ending in exactly one shot.
pub fn validate(
    actions: &[GameAction],
    state: &MatchState,
    actor_index: usize,
) -> Result<Vec<GameAction>, RejectReason> {
    let actor = &state.players[actor_index];
    let mut kept: Vec<GameAction> = Vec::with_capacity(actions.len());
    let mut spent: HashSet<usize> = HashSet::new();
    let mut shots = 0usize;

    for action in actions {
        match action {
            GameAction::UseItem { index } => {
                let slot = actor.items.get(*index);
                let usable = matches!(slot, Some(item) if *item != Item::Nothing)
                    && !spent.contains(index);
                if usable {
                    spent.insert(*index);
                    kept.push(action.clone());
                }
            }
            GameAction::ShootOpponent { target } => {
                let is_alive_opponent = state
                    .players
                    .iter()
                    .enumerate()
                    .any(|(i, p)| i != actor_index && p.alive && &p.address == target);
                if !is_alive_opponent {
                    return Err(RejectReason::InvalidTarget(target.clone()));
                }
                shots += 1;
                kept.push(action.clone());
            }
            GameAction::ShootSelf => {
                shots += 1;
                kept.push(action.clone());
            }
        }
    }

    if kept.is_empty() {
        return Err(RejectReason::Empty);
    }
    if shots > 1 {
        return Err(RejectReason::MultipleShots);
    }
    match kept.last() {
        Some(last) if last.is_shot() => Ok(kept),
        _ => Err(RejectReason::NoTerminalShot),
    }
}
