use crate::{
    types::{
        Address,
        Item,
        Phase,
    },
    wallets::AgentKey,
};
use thiserror::Error;

/// Rejection codes the ledger reports for calls that can never succeed by
/// retrying. Everything else (transport failures, transient reverts) is
/// retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Reject {
    #[error("not your turn")]
    NotYourTurn,
    #[error("match not active")]
    MatchNotActive,
    #[error("match already finished")]
    MatchFinished,
    #[error("activation window not open yet")]
    ActivationTooEarly,
    #[error("turn deadline not expired")]
    TurnNotExpired,
    #[error("already queued")]
    AlreadyQueued,
    #[error("queue too small to start")]
    QueueTooSmall,
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("ledger rejected call: {0}")]
    Rejected(Reject),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LedgerError::Rejected(_))
    }

    pub fn rejection(&self) -> Option<Reject> {
        match self {
            LedgerError::Rejected(code) => Some(*code),
            _ => None,
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Public per-player row as the ledger stores it. Items and private shell
/// knowledge come from separate reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerRow {
    pub address: Address,
    pub hp: u32,
    pub alive: bool,
}

/// Core match record, one read.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCore {
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<PlayerRow>,
    pub current_turn: Address,
    pub turn_deadline: u64,
    pub activation_deadline: u64,
    pub shells_remaining: u32,
    pub live_remaining: u32,
    pub blank_remaining: u32,
    pub winner: Option<Address>,
    pub prize_pool: u64,
}

/// Private knowledge of the upcoming shell for one player: `None` when the
/// player has no knowledge, otherwise whether the shell is live.
pub type ShellHint = Option<bool>;

/// The game node's read/write surface. All writes are confirmed to finality
/// before they resolve successfully.
pub trait Ledger {
    fn ledger_time(&self) -> impl Future<Output = LedgerResult<u64>>;

    fn match_core(&self, match_id: u64) -> impl Future<Output = LedgerResult<MatchCore>>;

    fn items(
        &self,
        match_id: u64,
        address: &Address,
    ) -> impl Future<Output = LedgerResult<Vec<Item>>>;

    fn saw_active(
        &self,
        match_id: u64,
        address: &Address,
    ) -> impl Future<Output = LedgerResult<bool>>;

    fn shell_hint(
        &self,
        match_id: u64,
        address: &Address,
    ) -> impl Future<Output = LedgerResult<ShellHint>>;

    fn queue_len(&self, buy_in: u64) -> impl Future<Output = LedgerResult<usize>>;

    fn next_match_id(&self) -> impl Future<Output = LedgerResult<u64>>;

    fn match_players(
        &self,
        match_id: u64,
    ) -> impl Future<Output = LedgerResult<Vec<Address>>>;

    fn use_item(
        &self,
        key: &AgentKey,
        match_id: u64,
        index: usize,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn shoot_opponent(
        &self,
        key: &AgentKey,
        match_id: u64,
        target: &Address,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn shoot_self(
        &self,
        key: &AgentKey,
        match_id: u64,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn force_timeout(
        &self,
        key: &AgentKey,
        match_id: u64,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn activate_match(
        &self,
        key: &AgentKey,
        match_id: u64,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn join_queue(
        &self,
        key: &AgentKey,
        buy_in: u64,
    ) -> impl Future<Output = LedgerResult<()>>;

    fn start_match(
        &self,
        key: &AgentKey,
        buy_in: u64,
        count: usize,
    ) -> impl Future<Output = LedgerResult<()>>;
}
