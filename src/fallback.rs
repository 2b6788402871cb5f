use crate::types::{
    GameAction,
    Item,
    MAX_HP,
    MatchState,
    PlayerInfo,
};

/// Deterministic decision path used whenever the reasoning provider is
/// unavailable, errors out, or produces a sequence the validator throws away.
///
/// The branch order is a strict priority and is load-bearing:
/// guaranteed-safe self-shots, then guaranteed-lethal opponent shots, then
/// information gathering, then healing, then the probability-driven default.
pub fn decide(state: &MatchState, actor_index: usize) -> Vec<GameAction> {
    let actor = &state.players[actor_index];

    if state.shell_known {
        if !state.known_shell_is_live {
            // A known blank buys a free extra turn; spending an item first
            // would waste that certainty.
            return vec![GameAction::ShootSelf];
        }
        let mut actions = Vec::new();
        if !state.saw_active
            && let Some(index) = first_item(actor, Item::doubles_damage)
        {
            actions.push(GameAction::UseItem { index });
        }
        actions.push(shoot_weakest(state, actor_index));
        return actions;
    }

    // Unknown shell: reveal if we can. Reacting to the revealed value is
    // deferred to the next poll cycle, the snapshot will have changed.
    if let Some(index) = first_item(actor, Item::reveals_shell) {
        return vec![
            GameAction::UseItem { index },
            shoot_weakest(state, actor_index),
        ];
    }

    let mut actions = Vec::new();
    if actor.hp < MAX_HP
        && let Some(index) = first_item(actor, Item::heals)
    {
        actions.push(GameAction::UseItem { index });
    }

    if state.blank_remaining == 0 && state.live_remaining > 0 {
        if !state.saw_active
            && let Some(index) = first_item(actor, Item::doubles_damage)
        {
            actions.push(GameAction::UseItem { index });
        }
        actions.push(shoot_weakest(state, actor_index));
    } else if state.live_remaining == 0 && state.blank_remaining > 0 {
        actions.push(GameAction::ShootSelf);
    } else {
        actions.push(shoot_weakest(state, actor_index));
    }
    actions
}

fn first_item(player: &PlayerInfo, matches: impl Fn(&Item) -> bool) -> Option<usize> {
    player.items.iter().position(matches)
}

fn shoot_weakest(state: &MatchState, actor_index: usize) -> GameAction {
    match state.lowest_hp_opponent(actor_index) {
        Some(target) => GameAction::ShootOpponent {
            target: target.address.clone(),
        },
        // No opponent standing; the match is over in all but phase. A
        // self-shot is the only structurally valid shot left.
        None => GameAction::ShootSelf,
    }
}
