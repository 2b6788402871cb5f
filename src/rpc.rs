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
    types::{
        Address,
        Item,
        Phase,
    },
    wallets::AgentKey,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use sha2::{
    Digest,
    Sha256,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const CONFIRM_INTERVAL: Duration = Duration::from_millis(500);
const CONFIRM_ATTEMPTS: u32 = 120;

/// HTTP client for a chamber game node. Reads are plain GETs; writes are
/// signed, submitted, and polled to finality before they count as done.
#[derive(Clone)]
pub struct HttpLedger {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> LedgerResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        Ok(Self { base_url, http })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> LedgerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| LedgerError::Transport(format!("GET {path}: {err}")))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|err| LedgerError::Transport(format!("GET {path}: {err}")))?;
        if !status.is_success() {
            return Err(error_from_body(&bytes, status.as_u16()));
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            LedgerError::Transport(format!("GET {path}: invalid payload: {err}"))
        })
    }

    /// Submit a signed call and await its receipt.
    async fn submit_call(&self, key: &AgentKey, call: CallDto<'_>) -> LedgerResult<()> {
        let nonce = chrono::Utc::now().timestamp_millis();
        let envelope = TxEnvelope {
            from: &key.address,
            nonce,
            call,
        };
        let sig = sign_envelope(key, &envelope)?;
        let submission = TxSubmission { envelope, sig };

        let url = format!("{}/tx", self.base_url);
        let res = self
            .http
            .post(&url)
            .json(&submission)
            .send()
            .await
            .map_err(|err| LedgerError::Transport(format!("POST /tx: {err}")))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|err| LedgerError::Transport(format!("POST /tx: {err}")))?;
        if !status.is_success() {
            return Err(error_from_body(&bytes, status.as_u16()));
        }
        let accepted: TxAcceptedDto = serde_json::from_slice(&bytes).map_err(|err| {
            LedgerError::Transport(format!("POST /tx: invalid payload: {err}"))
        })?;

        self.await_receipt(&accepted.tx_id).await
    }

    async fn await_receipt(&self, tx_id: &str) -> LedgerResult<()> {
        for _ in 0..CONFIRM_ATTEMPTS {
            let receipt: TxReceiptDto =
                self.get_json(&format!("/tx/{tx_id}")).await?;
            match receipt.status.as_str() {
                "pending" => {
                    debug!(%tx_id, "transaction still pending");
                    sleep(CONFIRM_INTERVAL).await;
                }
                "confirmed" => return Ok(()),
                "reverted" => {
                    return Err(LedgerError::Reverted(
                        receipt.message.unwrap_or_else(|| "reverted".to_string()),
                    ));
                }
                "rejected" => {
                    return Err(rejection_error(
                        receipt.code.as_deref(),
                        receipt.message.as_deref(),
                    ));
                }
                other => {
                    return Err(LedgerError::Transport(format!(
                        "unknown receipt status '{other}' for tx {tx_id}"
                    )));
                }
            }
        }
        // Treated as a transient failure: the caller's retry policy decides.
        Err(LedgerError::Transport(format!(
            "transaction {tx_id} not finalized in time"
        )))
    }
}

impl Ledger for HttpLedger {
    async fn ledger_time(&self) -> LedgerResult<u64> {
        let dto: TimeDto = self.get_json("/time").await?;
        Ok(dto.time)
    }

    async fn match_core(&self, match_id: u64) -> LedgerResult<MatchCore> {
        let dto: MatchDto = self.get_json(&format!("/match/{match_id}")).await?;
        Ok(dto.into())
    }

    async fn items(&self, match_id: u64, address: &Address) -> LedgerResult<Vec<Item>> {
        let dto: ItemsDto = self
            .get_json(&format!("/match/{match_id}/items/{address}"))
            .await?;
        Ok(dto.items)
    }

    async fn saw_active(&self, match_id: u64, address: &Address) -> LedgerResult<bool> {
        let dto: SawDto = self
            .get_json(&format!("/match/{match_id}/saw/{address}"))
            .await?;
        Ok(dto.active)
    }

    async fn shell_hint(
        &self,
        match_id: u64,
        address: &Address,
    ) -> LedgerResult<ShellHint> {
        let dto: ShellDto = self
            .get_json(&format!("/match/{match_id}/shell/{address}"))
            .await?;
        if dto.known {
            Ok(Some(dto.live.unwrap_or(false)))
        } else {
            Ok(None)
        }
    }

    async fn queue_len(&self, buy_in: u64) -> LedgerResult<usize> {
        let dto: QueueDto = self.get_json(&format!("/queue/{buy_in}")).await?;
        Ok(dto.players.len())
    }

    async fn next_match_id(&self) -> LedgerResult<u64> {
        let dto: NextMatchDto = self.get_json("/matches/next").await?;
        Ok(dto.next_match_id)
    }

    async fn match_players(&self, match_id: u64) -> LedgerResult<Vec<Address>> {
        let dto: QueueDto = self
            .get_json(&format!("/match/{match_id}/players"))
            .await?;
        Ok(dto.players)
    }

    async fn use_item(
        &self,
        key: &AgentKey,
        match_id: u64,
        index: usize,
    ) -> LedgerResult<()> {
        self.submit_call(key, CallDto::UseItem { match_id, index }).await
    }

    async fn shoot_opponent(
        &self,
        key: &AgentKey,
        match_id: u64,
        target: &Address,
    ) -> LedgerResult<()> {
        self.submit_call(key, CallDto::ShootOpponent { match_id, target })
            .await
    }

    async fn shoot_self(&self, key: &AgentKey, match_id: u64) -> LedgerResult<()> {
        self.submit_call(key, CallDto::ShootSelf { match_id }).await
    }

    async fn force_timeout(&self, key: &AgentKey, match_id: u64) -> LedgerResult<()> {
        self.submit_call(key, CallDto::ForceTimeout { match_id }).await
    }

    async fn activate_match(&self, key: &AgentKey, match_id: u64) -> LedgerResult<()> {
        self.submit_call(key, CallDto::ActivateMatch { match_id }).await
    }

    async fn join_queue(&self, key: &AgentKey, buy_in: u64) -> LedgerResult<()> {
        self.submit_call(key, CallDto::JoinQueue { buy_in }).await
    }

    async fn start_match(
        &self,
        key: &AgentKey,
        buy_in: u64,
        count: usize,
    ) -> LedgerResult<()> {
        self.submit_call(key, CallDto::StartMatch { buy_in, count }).await
    }
}

fn sign_envelope(key: &AgentKey, envelope: &TxEnvelope<'_>) -> LedgerResult<String> {
    let payload = serde_json::to_vec(envelope)
        .map_err(|err| LedgerError::Transport(format!("encoding call: {err}")))?;
    Ok(payload_signature(key.secret(), &payload))
}

fn payload_signature(secret: &[u8], payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

fn error_from_body(bytes: &[u8], http_status: u16) -> LedgerError {
    match serde_json::from_slice::<ErrorDto>(bytes) {
        Ok(dto) => rejection_error(dto.code.as_deref(), dto.message.as_deref()),
        Err(_) => LedgerError::Transport(format!(
            "node responded with HTTP {http_status}: {}",
            String::from_utf8_lossy(bytes)
        )),
    }
}

/// Known permanent codes become typed rejections; anything else is treated
/// as a transient revert and left to the retry policy.
fn rejection_error(code: Option<&str>, message: Option<&str>) -> LedgerError {
    let reject = match code {
        Some("NOT_YOUR_TURN") => Some(Reject::NotYourTurn),
        Some("MATCH_NOT_ACTIVE") => Some(Reject::MatchNotActive),
        Some("MATCH_FINISHED") => Some(Reject::MatchFinished),
        Some("TOO_EARLY") => Some(Reject::ActivationTooEarly),
        Some("TURN_NOT_EXPIRED") => Some(Reject::TurnNotExpired),
        Some("ALREADY_QUEUED") => Some(Reject::AlreadyQueued),
        Some("QUEUE_TOO_SMALL") => Some(Reject::QueueTooSmall),
        _ => None,
    };
    match reject {
        Some(code) => LedgerError::Rejected(code),
        None => LedgerError::Reverted(format!(
            "{}: {}",
            code.unwrap_or("UNKNOWN"),
            message.unwrap_or("no message")
        )),
    }
}

#[derive(Deserialize)]
struct TimeDto {
    time: u64,
}

#[derive(Deserialize)]
struct PlayerRowDto {
    address: Address,
    hp: u32,
    alive: bool,
}

#[derive(Deserialize)]
struct MatchDto {
    phase: Phase,
    round: u32,
    players: Vec<PlayerRowDto>,
    current_turn: Address,
    turn_deadline: u64,
    #[serde(default)]
    activation_deadline: u64,
    shells_remaining: u32,
    live_remaining: u32,
    blank_remaining: u32,
    #[serde(default)]
    winner: Option<Address>,
    #[serde(default)]
    prize_pool: u64,
}

impl From<MatchDto> for MatchCore {
    fn from(dto: MatchDto) -> Self {
        MatchCore {
            phase: dto.phase,
            round: dto.round,
            players: dto
                .players
                .into_iter()
                .map(|p| PlayerRow {
                    address: p.address,
                    hp: p.hp,
                    alive: p.alive,
                })
                .collect(),
            current_turn: dto.current_turn,
            turn_deadline: dto.turn_deadline,
            activation_deadline: dto.activation_deadline,
            shells_remaining: dto.shells_remaining,
            live_remaining: dto.live_remaining,
            blank_remaining: dto.blank_remaining,
            winner: dto.winner,
            prize_pool: dto.prize_pool,
        }
    }
}

#[derive(Deserialize)]
struct ItemsDto {
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct SawDto {
    active: bool,
}

#[derive(Deserialize)]
struct ShellDto {
    known: bool,
    #[serde(default)]
    live: Option<bool>,
}

#[derive(Deserialize)]
struct QueueDto {
    players: Vec<Address>,
}

#[derive(Deserialize)]
struct NextMatchDto {
    next_match_id: u64,
}

#[derive(Deserialize)]
struct ErrorDto {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct TxEnvelope<'a> {
    from: &'a Address,
    nonce: i64,
    call: CallDto<'a>,
}

#[derive(Serialize)]
struct TxSubmission<'a> {
    #[serde(flatten)]
    envelope: TxEnvelope<'a>,
    sig: String,
}

#[derive(Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
enum CallDto<'a> {
    UseItem { match_id: u64, index: usize },
    ShootOpponent { match_id: u64, target: &'a Address },
    ShootSelf { match_id: u64 },
    ForceTimeout { match_id: u64 },
    ActivateMatch { match_id: u64 },
    JoinQueue { buy_in: u64 },
    StartMatch { buy_in: u64, count: usize },
}

#[derive(Deserialize)]
struct TxAcceptedDto {
    tx_id: String,
}

#[derive(Deserialize)]
struct TxReceiptDto {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
