/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Authorized session placing periodic orders until shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use deriv_trader_adapter::DerivClient;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deriv_trader_bot::config::ApiToken;
use deriv_trader_bot::{BotConfig, Trader};

#[derive(Parser, Debug)]
#[command(name = "deriv-trader-bot", version, about = "Periodic randomized Deriv order runner")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "token", env = "DERIV_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long = "symbol")]
    symbol: Option<String>,
    #[arg(long = "amount")]
    amount: Option<Decimal>,
    #[arg(long = "interval-secs")]
    interval_secs: Option<u64>,
    #[arg(long = "max-trades")]
    max_trades: Option<u32>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut BotConfig) {
        if let Some(token) = &self.token {
            config.api_token = ApiToken::new(token.clone());
        }
        if let Some(symbol) = &self.symbol {
            config.symbol = symbol.clone();
        }
        if let Some(amount) = self.amount {
            config.amount = amount;
        }
        if let Some(interval_secs) = self.interval_secs {
            config.interval_secs = interval_secs;
        }
        if let Some(max_trades) = self.max_trades {
            config.max_trades = Some(max_trades);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = ?args.config_path.as_ref().map(|path| path.display().to_string()),
        dry_run = args.dry_run,
        "starting deriv-trader-bot"
    );

    let mut config = load_config(args.config_path.as_ref())?;
    args.apply_overrides(&mut config);
    config.validate().context("validate config")?;
    info!(symbol = %config.symbol, amount = %config.amount, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = Arc::new(DerivClient::with_config(config.connection.client_config()));

    info!("connecting to deriv");
    let account = client
        .connect(config.api_token.expose())
        .await
        .context("connect to deriv")?;
    let balance = client.get_balance().await.context("query initial balance")?;
    info!(
        loginid = %account.loginid,
        currency = %account.currency,
        balance = %balance,
        "connected to deriv"
    );

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let mut trader = Trader::new(client.clone(), config.trader_settings());
    let summary = trader.run(shutdown).await;

    client.disconnect().await;
    info!(
        attempted = summary.attempted,
        opened = summary.opened,
        failed = summary.failed,
        last_balance = ?summary.last_balance,
        "trading session finished"
    );

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<BotConfig> {
    let Some(path) = path else {
        return Ok(BotConfig::default());
    };
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    BotConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
