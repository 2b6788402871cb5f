//! In-memory doubles and builders shared by unit and integration tests.

use crate::{
    ledger::{
        Ledger,
        LedgerError,
        LedgerResult,
        MatchCore,
        PlayerRow,
        Reject,
        ShellHint,
    },
    reasoner::{
        ProviderError,
        Reasoner,
    },
    types::{
        Address,
        Item,
        MAX_HP,
        MatchState,
        Phase,
        PlayerInfo,
    },
    wallets::AgentKey,
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};

pub fn test_key(address: &str) -> AgentKey {
    AgentKey::new(
        address.trim_start_matches("0x"),
        Address::from(address),
        format!("secret-{address}").into_bytes(),
    )
}

pub fn match_state() -> MatchStateBuilder {
    MatchStateBuilder::default()
}

pub struct MatchStateBuilder {
    state: MatchState,
    turn_overridden: bool,
}

impl Default for MatchStateBuilder {
    fn default() -> Self {
        Self {
            state: MatchState {
                match_id: 1,
                phase: Phase::Active,
                round: 1,
                players: Vec::new(),
                current_turn: Address::from("0x0"),
                turn_deadline: 1_000,
                activation_deadline: 0,
                shells_remaining: 2,
                live_remaining: 1,
                blank_remaining: 1,
                shell_known: false,
                known_shell_is_live: false,
                saw_active: false,
                winner: None,
                prize_pool: 0,
            },
            turn_overridden: false,
        }
    }
}

impl MatchStateBuilder {
    pub fn match_id(mut self, match_id: u64) -> Self {
        self.state.match_id = match_id;
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.state.phase = phase;
        self
    }

    pub fn player(mut self, address: impl Into<String>, hp: u32, items: Vec<Item>) -> Self {
        self.state.players.push(PlayerInfo {
            address: Address::new(address),
            hp,
            alive: true,
            items,
        });
        self
    }

    pub fn dead_player(mut self, address: impl Into<String>) -> Self {
        self.state.players.push(PlayerInfo {
            address: Address::new(address),
            hp: 0,
            alive: false,
            items: Vec::new(),
        });
        self
    }

    pub fn shells(mut self, live: u32, blank: u32) -> Self {
        self.state.live_remaining = live;
        self.state.blank_remaining = blank;
        self.state.shells_remaining = live + blank;
        self
    }

    pub fn known_shell(mut self, is_live: bool) -> Self {
        self.state.shell_known = true;
        self.state.known_shell_is_live = is_live;
        self
    }

    pub fn saw_active(mut self) -> Self {
        self.state.saw_active = true;
        self
    }

    pub fn turn(mut self, address: impl Into<String>) -> Self {
        self.state.current_turn = Address::new(address);
        self.turn_overridden = true;
        self
    }

    pub fn deadline(mut self, deadline: u64) -> Self {
        self.state.turn_deadline = deadline;
        self
    }

    pub fn activation_deadline(mut self, deadline: u64) -> Self {
        self.state.activation_deadline = deadline;
        self
    }

    pub fn winner(mut self, address: impl Into<String>) -> Self {
        self.state.winner = Some(Address::new(address));
        self
    }

    /// Unless `turn()` was called, the first listed player holds the turn.
    pub fn build(mut self) -> MatchState {
        if !self.turn_overridden
            && let Some(first) = self.state.players.first()
        {
            self.state.current_turn = first.address.clone();
        }
        self.state
    }
}

struct ExternalStart {
    after_joins: usize,
    match_id: u64,
    players: Vec<Address>,
    fired: bool,
}

#[derive(Default)]
struct Inner {
    time: u64,
    matches: HashMap<u64, MatchState>,
    next_match_id: u64,
    queue: Vec<Address>,
    write_log: Vec<String>,
    write_script: VecDeque<LedgerResult<()>>,
    start_error: Option<LedgerError>,
    external_start: Option<ExternalStart>,
}

/// Scriptable in-memory ledger. All state sits behind one mutex so tests and
/// the code under test observe a single consistent world.
#[derive(Clone)]
pub struct FakeLedger {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_match_id: 1,
                ..Inner::default()
            })),
        }
    }

    pub fn with_match(self, state: MatchState) -> Self {
        self.set_match(state);
        self
    }

    pub fn set_match(&self, state: MatchState) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_match_id = inner.next_match_id.max(state.match_id + 1);
        inner.matches.insert(state.match_id, state);
    }

    pub fn update_match(&self, match_id: u64, mutate: impl FnOnce(&mut MatchState)) {
        let mut inner = self.inner.lock().unwrap();
        let state = inner
            .matches
            .get_mut(&match_id)
            .expect("update_match on unknown match");
        mutate(state);
    }

    pub fn set_time(&self, time: u64) {
        self.inner.lock().unwrap().time = time;
    }

    pub fn set_next_match_id(&self, next: u64) {
        self.inner.lock().unwrap().next_match_id = next;
    }

    /// Queue an outcome for the next game write (item use, shot, activation,
    /// force-timeout). Unscripted writes succeed.
    pub fn script_write(&self, outcome: LedgerResult<()>) {
        self.inner.lock().unwrap().write_script.push_back(outcome);
    }

    pub fn fail_start(&self, error: LedgerError) {
        self.inner.lock().unwrap().start_error = Some(error);
    }

    /// Simulate an uncoordinated external operator: once `after_joins` queue
    /// joins have been observed, a match with `players` appears under
    /// `match_id` and the seated players leave the queue.
    pub fn external_start_after_joins(
        &self,
        after_joins: usize,
        match_id: u64,
        players: Vec<Address>,
    ) {
        self.inner.lock().unwrap().external_start = Some(ExternalStart {
            after_joins,
            match_id,
            players,
            fired: false,
        });
    }

    pub fn write_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .write_log
            .iter()
            .filter(|entry| entry.starts_with(name))
            .count()
    }

    pub fn write_log(&self) -> Vec<String> {
        self.inner.lock().unwrap().write_log.clone()
    }

    fn record_and_take_outcome(&self, entry: String) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_log.push(entry);
        inner.write_script.pop_front().unwrap_or(Ok(()))
    }
}

fn seat_players(match_id: u64, players: Vec<Address>, time: u64) -> MatchState {
    let players = players
        .into_iter()
        .map(|address| PlayerInfo {
            address,
            hp: MAX_HP,
            alive: true,
            items: Vec::new(),
        })
        .collect::<Vec<_>>();
    let current_turn = players
        .first()
        .map(|p| p.address.clone())
        .unwrap_or_else(|| Address::from("0x0"));
    MatchState {
        match_id,
        phase: Phase::Active,
        round: 1,
        players,
        current_turn,
        turn_deadline: time + 60,
        activation_deadline: 0,
        shells_remaining: 4,
        live_remaining: 2,
        blank_remaining: 2,
        shell_known: false,
        known_shell_is_live: false,
        saw_active: false,
        winner: None,
        prize_pool: 0,
    }
}

impl Ledger for FakeLedger {
    async fn ledger_time(&self) -> LedgerResult<u64> {
        Ok(self.inner.lock().unwrap().time)
    }

    async fn match_core(&self, match_id: u64) -> LedgerResult<MatchCore> {
        let inner = self.inner.lock().unwrap();
        let state = inner
            .matches
            .get(&match_id)
            .ok_or_else(|| LedgerError::Transport(format!("unknown match {match_id}")))?;
        Ok(MatchCore {
            phase: state.phase,
            round: state.round,
            players: state
                .players
                .iter()
                .map(|p| PlayerRow {
                    address: p.address.clone(),
                    hp: p.hp,
                    alive: p.alive,
                })
                .collect(),
            current_turn: state.current_turn.clone(),
            turn_deadline: state.turn_deadline,
            activation_deadline: state.activation_deadline,
            shells_remaining: state.shells_remaining,
            live_remaining: state.live_remaining,
            blank_remaining: state.blank_remaining,
            winner: state.winner.clone(),
            prize_pool: state.prize_pool,
        })
    }

    async fn items(&self, match_id: u64, address: &Address) -> LedgerResult<Vec<Item>> {
        let inner = self.inner.lock().unwrap();
        let state = inner
            .matches
            .get(&match_id)
            .ok_or_else(|| LedgerError::Transport(format!("unknown match {match_id}")))?;
        let player = state
            .players
            .iter()
            .find(|p| &p.address == address)
            .ok_or_else(|| LedgerError::Transport(format!("unknown player {address}")))?;
        Ok(player.items.clone())
    }

    async fn saw_active(&self, match_id: u64, _address: &Address) -> LedgerResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .matches
            .get(&match_id)
            .map(|state| state.saw_active)
            .unwrap_or(false))
    }

    async fn shell_hint(
        &self,
        match_id: u64,
        _address: &Address,
    ) -> LedgerResult<ShellHint> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .matches
            .get(&match_id)
            .and_then(|state| state.shell_known.then_some(state.known_shell_is_live)))
    }

    async fn queue_len(&self, _buy_in: u64) -> LedgerResult<usize> {
        Ok(self.inner.lock().unwrap().queue.len())
    }

    async fn next_match_id(&self) -> LedgerResult<u64> {
        Ok(self.inner.lock().unwrap().next_match_id)
    }

    async fn match_players(&self, match_id: u64) -> LedgerResult<Vec<Address>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .matches
            .get(&match_id)
            .map(|state| state.players.iter().map(|p| p.address.clone()).collect())
            .unwrap_or_default())
    }

    async fn use_item(
        &self,
        _key: &AgentKey,
        _match_id: u64,
        index: usize,
    ) -> LedgerResult<()> {
        self.record_and_take_outcome(format!("use_item({index})"))
    }

    async fn shoot_opponent(
        &self,
        _key: &AgentKey,
        _match_id: u64,
        target: &Address,
    ) -> LedgerResult<()> {
        self.record_and_take_outcome(format!("shoot_opponent({target})"))
    }

    async fn shoot_self(&self, _key: &AgentKey, _match_id: u64) -> LedgerResult<()> {
        self.record_and_take_outcome("shoot_self".to_string())
    }

    async fn force_timeout(&self, _key: &AgentKey, _match_id: u64) -> LedgerResult<()> {
        self.record_and_take_outcome("force_timeout".to_string())
    }

    async fn activate_match(&self, _key: &AgentKey, match_id: u64) -> LedgerResult<()> {
        let outcome = self.record_and_take_outcome(format!("activate_match({match_id})"));
        if outcome.is_ok() {
            let mut inner = self.inner.lock().unwrap();
            if let Some(state) = inner.matches.get_mut(&match_id)
                && state.phase == Phase::Waiting
            {
                state.phase = Phase::Active;
            }
        }
        outcome
    }

    async fn join_queue(&self, key: &AgentKey, _buy_in: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_log.push(format!("join_queue({})", key.address));
        let joins_so_far = inner
            .write_log
            .iter()
            .filter(|entry| entry.starts_with("join_queue"))
            .count();

        let result = if inner.queue.contains(&key.address) {
            Err(LedgerError::Rejected(Reject::AlreadyQueued))
        } else {
            inner.queue.push(key.address.clone());
            Ok(())
        };

        // A racing external operator may consume the queue mid-join.
        let mut fire = None;
        if let Some(external) = inner.external_start.as_mut()
            && !external.fired
            && joins_so_far >= external.after_joins
        {
            external.fired = true;
            fire = Some((external.match_id, external.players.clone()));
        }
        if let Some((match_id, players)) = fire {
            inner.queue.retain(|queued| !players.contains(queued));
            let state = seat_players(match_id, players, inner.time);
            inner.next_match_id = inner.next_match_id.max(match_id + 1);
            inner.matches.insert(match_id, state);
        }

        result
    }

    async fn start_match(
        &self,
        _key: &AgentKey,
        _buy_in: u64,
        count: usize,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_log.push("start_match".to_string());
        if let Some(error) = inner.start_error.clone() {
            return Err(error);
        }
        if inner.queue.len() < count {
            return Err(LedgerError::Rejected(Reject::QueueTooSmall));
        }
        let seated: Vec<Address> = inner.queue.drain(..count).collect();
        let match_id = inner.next_match_id;
        inner.next_match_id += 1;
        let state = seat_players(match_id, seated, inner.time);
        inner.matches.insert(match_id, state);
        Ok(())
    }
}

#[derive(Default)]
struct ReasonerInner {
    script: VecDeque<Result<String, ProviderError>>,
    calls: usize,
}

/// Reasoning provider double with scripted completions. An exhausted script
/// yields a provider error.
#[derive(Clone, Default)]
pub struct FakeReasoner {
    inner: Arc<Mutex<ReasonerInner>>,
}

impl FakeReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, outcome: Result<String, ProviderError>) {
        self.inner.lock().unwrap().script.push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

impl Reasoner for FakeReasoner {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        inner
            .script
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError("no scripted response".to_string())))
    }
}
