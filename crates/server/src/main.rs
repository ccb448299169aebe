//! bist-lock: BIST stock screener with a 30-day locked portfolio
//!
//! Usage:
//!   bist-lock status                 Show the locked portfolio and its live return
//!   bist-lock select                 Run the filter cascade and lock a new selection
//!   bist-lock reset                  Delete an expired or unreadable selection
//!   bist-lock tiers                  Print the filter ladder
//!   bist-lock serve --port 3001      Launch the HTTP API

mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use persistence::{Database, JsonFileStore, SelectionStore, SqliteSelectionStore};
use rust_decimal::Decimal;
use screener::provider::DEFAULT_SECTOR;
use screener::{
    default_universe, load_universe_file, normalize_universe, HoldingPerformance, PortfolioManager,
    PortfolioStatus, PortfolioSummary, ScanProgress, ScanStatus, YahooMarketData, QUORUM,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::routes::{api_router, AppState};

pub(crate) const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

const DEFAULT_JSON_PATH: &str = "data/portfolio.json";
const DEFAULT_SQLITE_PATH: &str = "data/bist-lock.db";

#[derive(Parser)]
#[command(name = "bist-lock")]
#[command(about = "BIST stock screener with a 30-day locked portfolio", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Selection store backend
    #[arg(long, global = true, env = "BIST_LOCK_STORE", value_enum, default_value_t = StoreKind::Json)]
    store: StoreKind,

    /// Path of the selection file or database
    #[arg(long, global = true, env = "BIST_LOCK_DATA_PATH")]
    data_path: Option<PathBuf>,

    /// Tickers to scan (comma-separated), overrides the built-in BIST list
    #[arg(long, global = true, value_delimiter = ',')]
    universe: Vec<String>,

    /// File listing tickers to scan
    #[arg(long, global = true, env = "BIST_LOCK_UNIVERSE_FILE")]
    universe_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Show lock state and, while locked, the live unrealized return
    Status,
    /// Run the filter cascade and lock a new selection (only when unlocked)
    Select,
    /// Delete the stored selection (expired or unreadable only)
    Reset,
    /// Print the filter tiers and the scan universe
    Tiers,
    /// Launch the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,screener=debug,persistence=debug,bist_lock=debug,sqlx=warn")
    } else {
        EnvFilter::new("info,screener=info,persistence=info,bist_lock=info,sqlx=warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing so BIST_LOCK_* values from .env reach clap
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let progress = Arc::new(ScanProgress::new());
    let manager = Arc::new(build_manager(&cli, progress.clone()).await?);

    match cli.command {
        Commands::Status => cmd_status(&manager).await?,
        Commands::Select => cmd_select(manager, progress).await?,
        Commands::Reset => cmd_reset(&manager).await?,
        Commands::Tiers => cmd_tiers(&manager),
        Commands::Serve { host, port } => cmd_serve(manager, progress, &host, port).await?,
    }

    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

fn resolve_universe(cli: &Cli) -> anyhow::Result<Vec<String>> {
    if !cli.universe.is_empty() {
        return Ok(normalize_universe(&cli.universe));
    }
    if let Some(path) = &cli.universe_file {
        let universe = load_universe_file(path)?;
        info!(path = %path.display(), tickers = universe.len(), "Loaded universe file");
        return Ok(universe);
    }
    Ok(default_universe())
}

async fn open_store(kind: StoreKind, data_path: Option<PathBuf>) -> anyhow::Result<Arc<dyn SelectionStore>> {
    let store: Arc<dyn SelectionStore> = match kind {
        StoreKind::Json => {
            let path = data_path.unwrap_or_else(|| PathBuf::from(DEFAULT_JSON_PATH));
            Arc::new(JsonFileStore::new(path))
        }
        StoreKind::Sqlite => {
            let path = data_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH));
            let db = Database::new(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
            Arc::new(SqliteSelectionStore::new(db.pool_clone()))
        }
    };
    info!(store = %store.describe(), "Selection store ready");
    Ok(store)
}

async fn build_manager(cli: &Cli, progress: Arc<ScanProgress>) -> anyhow::Result<PortfolioManager> {
    let universe = resolve_universe(cli)?;
    if universe.len() < QUORUM {
        warn!(
            tickers = universe.len(),
            quorum = QUORUM,
            "Universe is smaller than the quorum; selection will be refused"
        );
    }

    let store = open_store(cli.store, cli.data_path.clone()).await?;
    let market = Arc::new(YahooMarketData::default());

    Ok(PortfolioManager::new(store, market.clone(), market, universe).with_progress(progress))
}

// ============================================================================
// CLI commands
// ============================================================================

fn print_banner(manager: &PortfolioManager) {
    println!("\n=== bist-lock v{} ===", APP_VERSION);
    println!("Store: {}", manager.store_description());
}

fn signed(value: Decimal) -> String {
    if value > Decimal::ZERO {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn print_holdings(holdings: &[HoldingPerformance], summary: &PortfolioSummary) {
    println!(
        "\n  {:>3}  {:<10} {:<22} {:<24} {:>10} {:>10} {:>8}",
        "#", "Ticker", "Sector", "Tier", "Entry", "Current", "P&L%"
    );
    println!("  {}", "-".repeat(96));
    for (i, h) in holdings.iter().enumerate() {
        println!(
            "  {:>3}  {:<10} {:<22} {:<24} {:>10} {:>10} {:>8}{}",
            i + 1,
            h.ticker,
            h.sector.as_deref().unwrap_or(DEFAULT_SECTOR),
            h.tier_label,
            h.entry_price.round_dp(2),
            h.current_price.round_dp(2),
            signed(h.profit_pct),
            if h.quote_available { "" } else { "  (no quote)" },
        );
    }
    println!(
        "\n  Invested: {} | Value: {} | Profit: {} ({}%)",
        summary.total_invested,
        summary.current_value,
        signed(summary.total_profit),
        signed(summary.total_profit_pct),
    );
}

async fn cmd_status(manager: &PortfolioManager) -> anyhow::Result<()> {
    print_banner(manager);

    match manager.view_status().await? {
        PortfolioStatus::Empty => {
            println!("\nNo active selection. Run `bist-lock select` to start a 30-day period.");
        }
        PortfolioStatus::Corrupt { reason } => {
            println!("\nStored selection is unreadable: {reason}");
            println!("Run `bist-lock reset` to clear it.");
        }
        PortfolioStatus::Expired { selection, lock } => {
            println!(
                "\nUNLOCKED: the period that started {} ended on {}.",
                selection.start_date, lock.unlock_date
            );
            println!("Filter used: {}", selection.filter_used);
            println!("Run `bist-lock select` for a new selection.");
        }
        PortfolioStatus::Locked {
            selection,
            lock,
            holdings,
            summary,
        } => {
            println!(
                "\nLOCKED: {} days remaining (unlocks {})",
                lock.days_remaining, lock.unlock_date
            );
            println!(
                "Started: {} | Filter used: {}",
                selection.start_date, selection.filter_used
            );
            print_holdings(&holdings, &summary);
        }
    }

    Ok(())
}

async fn cmd_select(manager: Arc<PortfolioManager>, progress: Arc<ScanProgress>) -> anyhow::Result<()> {
    print_banner(&manager);
    println!("Universe: {} tickers | Quorum: {}\n", manager.universe().len(), QUORUM);

    progress.try_start();
    let task_manager = manager.clone();
    let handle = tokio::spawn(async move { task_manager.request_new_selection().await });

    // Progress display loop
    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snap = progress.snapshot();
        if snap.status != ScanStatus::Running || snap.total == 0 {
            continue;
        }
        let bar_len = 30;
        let filled = (snap.scanned * bar_len / snap.total).min(bar_len);
        let bar: String = "=".repeat(filled) + &" ".repeat(bar_len - filled);
        print!(
            "\r  Tier {}/{} {:<24} [{}] {}/{}   ",
            snap.tier_index + 1,
            snap.tier_count,
            snap.current_tier.as_deref().unwrap_or(""),
            bar,
            snap.scanned,
            snap.total
        );
    }
    println!();

    let selection = match handle.await? {
        Ok(selection) => selection,
        Err(e) => {
            progress.fail(e.to_string());
            return Err(e.into());
        }
    };

    println!("\nLocked {} stocks on {} ({})", selection.stocks.len(), selection.start_date, selection.filter_used);
    println!(
        "\n  {:>3}  {:<10} {:>10} {:>7} {:>8} {:>8} {:>9}  {}",
        "#", "Ticker", "Price", "RSI", "P/E", "P/B", "Mom%", "Tier"
    );
    println!("  {}", "-".repeat(86));
    for (i, s) in selection.stocks.iter().enumerate() {
        let ratio = |v: Option<Decimal>| v.map(|d| d.round_dp(2).to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>3}  {:<10} {:>10} {:>7} {:>8} {:>8} {:>9}  {}",
            i + 1,
            s.ticker,
            s.price.round_dp(2),
            s.rsi,
            ratio(s.pe_ratio),
            ratio(s.pb_ratio),
            signed((s.momentum * Decimal::ONE_HUNDRED).round_dp(2)),
            s.tier_label,
        );
    }

    Ok(())
}

async fn cmd_reset(manager: &PortfolioManager) -> anyhow::Result<()> {
    print_banner(manager);
    manager.delete_selection().await?;
    println!("\nSelection deleted.");
    Ok(())
}

fn cmd_tiers(manager: &PortfolioManager) {
    println!("\nQuorum: {} stocks per selection", QUORUM);
    println!("\n  {:<26} {:>8} {:>8} {:>8}", "Tier", "RSI >", "P/E <", "P/B <");
    println!("  {}", "-".repeat(54));
    for tier in manager.tiers() {
        let (pe, pb) = match &tier.fundamentals {
            screener::FundamentalGate::Check { max_pe, max_pb } => (max_pe.to_string(), max_pb.to_string()),
            screener::FundamentalGate::Disabled => ("-".to_string(), "-".to_string()),
        };
        println!("  {:<26} {:>8} {:>8} {:>8}", tier.label, tier.min_rsi, pe, pb);
    }
    println!("\nUniverse ({}): {}", manager.universe().len(), manager.universe().join(", "));
}

// ============================================================================
// Serve command: Axum web server
// ============================================================================

async fn cmd_serve(
    manager: Arc<PortfolioManager>,
    progress: Arc<ScanProgress>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    info!("bist-lock v{} starting...", APP_VERSION);
    let store = manager.store_description();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = axum::Router::new()
        .nest("/api", api_router(AppState { manager, progress }))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== bist-lock v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    /api/health              - Health check");
    println!("  GET    /api/status              - Lock state and live return");
    println!("  POST   /api/selection           - Start a new selection scan");
    println!("  GET    /api/selection/progress  - Poll scan progress");
    println!("  DELETE /api/selection           - Delete an expired selection");
    println!("  GET    /api/tiers               - Filter ladder and universe");
    println!("\n  Store: {}", store);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
