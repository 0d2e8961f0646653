mod schedule;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use advisor::OpenAiClient;
use common::{Config, ExchangeAccount, NewsProvider, OhlcvProvider, TradingMode};
use engine::{
    CycleHandle, CycleOutcome, CycleRunner, CycleServices, FearGreedClient, NoNews, SerpApiNews,
    UpbitClient,
};
use ledger::TradeLedger;
use paper::PaperClient;
use risk::RunGuard;
use strategy::{SnapshotSources, StrategyFileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(mode = %cfg.trading_mode, "CoinPilot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    let strategy_reference = strategy_file.load_reference()?;
    let times = schedule::parse_times(&strategy_file.schedule.times)?;
    let market = &strategy_file.market;

    // ── Database ──────────────────────────────────────────────────────────────
    ensure_parent_dir(&cfg.database_url)?;
    let ledger = TradeLedger::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening trade ledger at {}", cfg.database_url))?;

    // ── Exchange (injected based on TRADING_MODE) ─────────────────────────────
    let (exchange, candles): (Arc<dyn ExchangeAccount>, Arc<dyn OhlcvProvider>) =
        match cfg.trading_mode {
            TradingMode::Live => {
                info!("Live trading mode: using UpbitClient");
                let upbit = Arc::new(UpbitClient::new(
                    cfg.upbit_access_key.clone().unwrap_or_default(),
                    cfg.upbit_secret_key.clone().unwrap_or_default(),
                )?);
                (upbit.clone() as Arc<dyn ExchangeAccount>, upbit as Arc<dyn OhlcvProvider>)
            }
            TradingMode::Paper => {
                info!(
                    initial_quote = cfg.paper_initial_quote,
                    "Paper trading mode: using PaperClient over live market data"
                );
                let upbit = Arc::new(UpbitClient::public()?);
                let paper = PaperClient::new(
                    upbit.clone(),
                    market.pair.clone(),
                    market.base_currency.clone(),
                    market.quote_currency.clone(),
                    cfg.paper_initial_quote,
                    strategy_file.execution.fee_rate,
                );
                (Arc::new(paper) as Arc<dyn ExchangeAccount>, upbit as Arc<dyn OhlcvProvider>)
            }
        };

    // ── Advisory feeds ────────────────────────────────────────────────────────
    let news: Arc<dyn NewsProvider> = match &cfg.serpapi_api_key {
        Some(key) => Arc::new(SerpApiNews::new(key.clone())?),
        None => {
            warn!("SERPAPI_API_KEY not set, news headlines disabled");
            Arc::new(NoNews)
        }
    };

    // ── Cycle runner ──────────────────────────────────────────────────────────
    let decision = OpenAiClient::new(cfg.openai_api_key.clone(), cfg.openai_decision_model.clone())?;
    let reflection =
        OpenAiClient::new(cfg.openai_api_key.clone(), cfg.openai_reflection_model.clone())?;
    info!(
        decision_model = %decision.model(),
        reflection_model = %reflection.model(),
        "Decision service configured"
    );

    let services = CycleServices {
        sources: SnapshotSources {
            exchange,
            candles,
            sentiment: Arc::new(FearGreedClient::new()?),
            news,
        },
        decision: Arc::new(decision),
        reflection: Arc::new(reflection),
        ledger: ledger.clone(),
    };
    let handle = CycleHandle::new(Arc::new(RunGuard::new()));
    let runner = Arc::new(CycleRunner::new(
        services,
        &strategy_file,
        strategy_reference,
        handle.clone(),
    ));

    // ── Ledger API ────────────────────────────────────────────────────────────
    match &cfg.dashboard_token {
        Some(token) => {
            let api_state = api::AppState {
                ledger: ledger.clone(),
                cycle: handle.clone(),
                trading_mode: cfg.trading_mode,
                dashboard_token: token.clone(),
            };
            let port = cfg.dashboard_port;
            tokio::spawn(async move {
                if let Err(e) = api::serve(api_state, port).await {
                    error!(error = %e, "Ledger API stopped");
                }
            });
        }
        None => info!("DASHBOARD_TOKEN not set, ledger API disabled"),
    }

    // ── Schedule ──────────────────────────────────────────────────────────────
    if strategy_file.schedule.run_on_start {
        run_isolated(&runner).await;
    }

    loop {
        let now = Local::now();
        let Some(next) = schedule::next_after(&now, &times) else {
            warn!("No schedule times configured. Waiting for shutdown signal.");
            tokio::signal::ctrl_c().await?;
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next.format("%Y-%m-%d %H:%M %Z"), "Next trading cycle scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => run_isolated(&runner).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutdown signal received. Exiting.");
    ledger.close().await;
    Ok(())
}

/// Run one cycle on its own task so a panic inside it cannot end the scheduler.
async fn run_isolated(runner: &Arc<CycleRunner>) {
    let runner = Arc::clone(runner);
    match tokio::spawn(async move { runner.run_cycle().await }).await {
        Ok(outcome) => log_outcome(outcome),
        Err(e) => error!(error = %e, "Cycle aborted: task did not complete"),
    }
}

fn log_outcome(outcome: CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(record) => info!(
            action = %record.action,
            size_percent = record.size_percent,
            portfolio_value = record.portfolio_value(),
            "Cycle finished"
        ),
        CycleOutcome::Aborted { stage, reason } => {
            error!(stage = %stage, reason = %reason, "Cycle aborted")
        }
        CycleOutcome::Skipped => warn!("Cycle skipped: previous cycle still running"),
    }
}

/// SQLite creates the file but not its directory.
fn ensure_parent_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}
