use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
/// Env var holding the reasoning provider key; the provider is disabled
/// without it.
pub const LLM_API_KEY_ENV: &str = "CHAMBER_LLM_API_KEY";

pub const DEFAULT_BUY_IN: u64 = 1_000;
pub const DEFAULT_TABLE_SIZE: usize = 2;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub rpc_url: String,
    pub wallet_dir: Option<String>,
    pub wallet_names: Vec<String>,
    pub buy_in: u64,
    pub table_size: usize,
    pub poll_interval: Duration,
    pub timeout_interval: Duration,
    pub settle_delay: Duration,
    pub retry_delay: Duration,
    pub llm: Option<LlmConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            wallet_dir: None,
            wallet_names: Vec::new(),
            buy_in: DEFAULT_BUY_IN,
            table_size: DEFAULT_TABLE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout_interval: DEFAULT_TIMEOUT_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Provider config when a key is present in the environment; the agent
    /// runs purely on the deterministic fallback otherwise.
    pub fn llm_from_env(base_url: Option<String>, model: Option<String>) -> Option<LlmConfig> {
        let api_key = std::env::var(LLM_API_KEY_ENV).ok()?;
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        Some(LlmConfig {
            base_url: base_url.unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key,
            timeout: DEFAULT_LLM_TIMEOUT,
        })
    }
}
