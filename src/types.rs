use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Starting (and maximum) hit points the ledger assigns each player.
pub const MAX_HP: u32 = 100;

/// Hex-encoded on-ledger account identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Active,
    Finished,
}

/// Item slots as the ledger reports them. `Nothing` is a filler value in a
/// real slot, not an absent slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Nothing,
    Magnifier,
    Medkit,
    Handsaw,
    Beer,
    Handcuffs,
}

impl Item {
    pub fn reveals_shell(&self) -> bool {
        matches!(self, Item::Magnifier)
    }

    pub fn heals(&self) -> bool {
        matches!(self, Item::Medkit)
    }

    pub fn doubles_damage(&self) -> bool {
        matches!(self, Item::Handsaw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub address: Address,
    pub hp: u32,
    pub alive: bool,
    pub items: Vec<Item>,
}

/// One consistent snapshot of a match, read fresh every poll cycle. Never
/// cached across polls.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchState {
    pub match_id: u64,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<PlayerInfo>,
    pub current_turn: Address,
    pub turn_deadline: u64,
    pub activation_deadline: u64,
    pub shells_remaining: u32,
    pub live_remaining: u32,
    pub blank_remaining: u32,
    /// Private knowledge of the upcoming shell, as seen by the viewer the
    /// snapshot was read for.
    pub shell_known: bool,
    pub known_shell_is_live: bool,
    /// Whether the viewer's damage-doubler is already armed for the next shot.
    pub saw_active: bool,
    pub winner: Option<Address>,
    pub prize_pool: u64,
}

impl MatchState {
    pub fn live_probability(&self) -> f64 {
        let total = self.live_remaining + self.blank_remaining;
        if total == 0 {
            0.0
        } else {
            f64::from(self.live_remaining) / f64::from(total)
        }
    }

    pub fn player_index(&self, address: &Address) -> Option<usize> {
        self.players.iter().position(|p| &p.address == address)
    }

    /// Lowest-HP alive opponent of `actor_index`, ties broken by player
    /// order. `None` only when no opponent is left standing.
    pub fn lowest_hp_opponent(&self, actor_index: usize) -> Option<&PlayerInfo> {
        self.players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != actor_index && p.alive)
            .min_by_key(|(i, p)| (p.hp, *i))
            .map(|(_, p)| p)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameAction {
    UseItem { index: usize },
    ShootOpponent { target: Address },
    ShootSelf,
}

impl GameAction {
    pub fn is_shot(&self) -> bool {
        matches!(
            self,
            GameAction::ShootOpponent { .. } | GameAction::ShootSelf
        )
    }
}

impl fmt::Display for GameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameAction::UseItem { index } => write!(f, "use_item({index})"),
            GameAction::ShootOpponent { target } => write!(f, "shoot({target})"),
            GameAction::ShootSelf => f.write_str("shoot_self"),
        }
    }
}
