use chamber_agent::{
    config::{
        self,
        AppConfig,
    },
    reasoner::LlmReasoner,
    rpc::HttpLedger,
    runtime,
    wallets,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: chamber-agent --wallet <name> [--wallet <name> ...]\n\
         [--rpc-url <url>] [--wallet-dir <path>]\n\
         [--buy-in <amount>] [--table-size <n>]\n\
         [--poll-interval <secs>] [--timeout-interval <secs>]\n\
         [--llm-url <url>] [--llm-model <name>] [--no-llm]\n\
         \n\
         Flags:\n\
           --wallet <name>            Keystore wallet to play with (repeat for several agents)\n\
           --rpc-url <url>            Game node RPC endpoint (default {})\n\
           --wallet-dir <path>        Override wallet directory (defaults to ~/.chamber/wallets)\n\
           --buy-in <amount>          Queue buy-in to play at (default {})\n\
           --table-size <n>           Players needed to start a match (default {})\n\
           --poll-interval <secs>     Match poll cadence (default {})\n\
           --timeout-interval <secs>  Opponent timeout check cadence (default {})\n\
           --llm-url <url>            Reasoning provider base URL (default {})\n\
           --llm-model <name>         Reasoning model (default {})\n\
           --no-llm                   Skip the reasoning provider, fallback policy only\n\
         \n\
         Environment:\n\
           {}   API key for the reasoning provider (unset disables it)\n\
           {}  Wallet password (prompted when unset)",
        config::DEFAULT_RPC_URL,
        config::DEFAULT_BUY_IN,
        config::DEFAULT_TABLE_SIZE,
        config::DEFAULT_POLL_INTERVAL.as_secs(),
        config::DEFAULT_TIMEOUT_INTERVAL.as_secs(),
        config::DEFAULT_LLM_BASE_URL,
        config::DEFAULT_LLM_MODEL,
        config::LLM_API_KEY_ENV,
        wallets::WALLET_PASSWORD_ENV,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut rpc_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_names: Vec<String> = Vec::new();
    let mut buy_in: Option<u64> = None;
    let mut table_size: Option<usize> = None;
    let mut poll_interval: Option<u64> = None;
    let mut timeout_interval: Option<u64> = None;
    let mut llm_url: Option<String> = None;
    let mut llm_model: Option<String> = None;
    let mut no_llm = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if rpc_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                rpc_url = Some(url);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_names.contains(&name) {
                    return Err(eyre!("Wallet {name} listed twice"));
                }
                wallet_names.push(name);
            }
            "--buy-in" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--buy-in requires an amount"))?;
                if buy_in.is_some() {
                    return Err(eyre!("--buy-in may only be specified once"));
                }
                buy_in = Some(raw.parse().map_err(|_| eyre!("Invalid buy-in: {raw}"))?);
            }
            "--table-size" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--table-size requires a player count"))?;
                if table_size.is_some() {
                    return Err(eyre!("--table-size may only be specified once"));
                }
                let size: usize =
                    raw.parse().map_err(|_| eyre!("Invalid table size: {raw}"))?;
                if size < 2 {
                    return Err(eyre!("--table-size must be at least 2"));
                }
                table_size = Some(size);
            }
            "--poll-interval" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--poll-interval requires seconds"))?;
                if poll_interval.is_some() {
                    return Err(eyre!("--poll-interval may only be specified once"));
                }
                poll_interval =
                    Some(raw.parse().map_err(|_| eyre!("Invalid interval: {raw}"))?);
            }
            "--timeout-interval" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--timeout-interval requires seconds"))?;
                if timeout_interval.is_some() {
                    return Err(eyre!("--timeout-interval may only be specified once"));
                }
                timeout_interval =
                    Some(raw.parse().map_err(|_| eyre!("Invalid interval: {raw}"))?);
            }
            "--llm-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--llm-url requires a URL argument"))?;
                if llm_url.is_some() {
                    return Err(eyre!("--llm-url may only be specified once"));
                }
                llm_url = Some(url);
            }
            "--llm-model" => {
                let model = args
                    .next()
                    .ok_or_else(|| eyre!("--llm-model requires a model name"))?;
                if llm_model.is_some() {
                    return Err(eyre!("--llm-model may only be specified once"));
                }
                llm_model = Some(model);
            }
            "--no-llm" => no_llm = true,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    if wallet_names.is_empty() {
        return Err(eyre!("Specify at least one --wallet <name> to play with"));
    }

    let llm = if no_llm {
        None
    } else {
        AppConfig::llm_from_env(llm_url, llm_model)
    };

    let defaults = AppConfig::default();
    Ok(AppConfig {
        rpc_url: rpc_url.unwrap_or(defaults.rpc_url),
        wallet_dir,
        wallet_names,
        buy_in: buy_in.unwrap_or(defaults.buy_in),
        table_size: table_size.unwrap_or(defaults.table_size),
        poll_interval: poll_interval
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval),
        timeout_interval: timeout_interval
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout_interval),
        settle_delay: defaults.settle_delay,
        retry_delay: defaults.retry_delay,
        llm,
    })
}

fn init_logging() {
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily("logs", "agent.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    let _ = LOG_GUARD.set(guard);
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let config = parse_cli_args()?;

    let wallet_dir = wallets::resolve_wallet_dir(config.wallet_dir.as_deref())?;
    let roster = wallets::load_roster(&wallet_dir, &config.wallet_names)?;
    tracing::info!(agents = roster.len(), rpc_url = %config.rpc_url, "starting agent");

    let ledger = HttpLedger::new(config.rpc_url.clone())?;
    let reasoner = match &config.llm {
        Some(llm) => Some(LlmReasoner::new(
            llm.base_url.clone(),
            llm.api_key.clone(),
            llm.model.clone(),
            llm.timeout,
        )?),
        None => {
            tracing::info!("no reasoning provider configured, using fallback policy");
            None
        }
    };

    runtime::run(ledger, reasoner, roster, &config).await
}
