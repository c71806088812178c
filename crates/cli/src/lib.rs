use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use config::{FlagOverrides, ServiceConfig};
use dtm_ingest::{fetch_raw_file, BuildOutcome, FetchOutcome, MatrixBuilder};
use dtm_matrix_store::{raw_file_path, store_path, SqliteMatrixStore};
use dtm_query::QueryEngine;
use http_api::AppState;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod http_api;
pub mod rate_limit;
pub mod server_security;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "dtm")]
#[command(about = "PC4 drive-time matrix: ingestion, queries and the HTTP API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (keys, rate limit, client profiles)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the raw file and the matrix store (env: DTM_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Raw pairwise file URL (env: DTM_SOURCE_URL)
    #[arg(long, global = true)]
    source_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the raw pairwise file unless it is already cached
    Fetch,

    /// Fetch and build the matrix store
    Build(BuildArgs),

    /// Build if needed, then serve the HTTP API
    #[command(name = "serve-http")]
    ServeHttp(ServeArgs),

    /// Destinations reachable from an origin
    Row(RowArgs),

    /// Drive time and distance between two postal codes
    Pair(PairArgs),

    /// Every origin present in the matrix
    Origins(OutputArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Rebuild even if a store already exists
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

#[derive(Args)]
struct OutputArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct RowArgs {
    /// Origin postal code
    origin: String,

    /// Only destinations reachable within this many minutes
    #[arg(long, allow_negative_numbers = true)]
    max_time: Option<i64>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct PairArgs {
    /// Origin postal code
    origin: String,

    /// Destination postal code
    dest: String,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = ServiceConfig::load(
        cli.config.as_deref(),
        FlagOverrides {
            data_dir: cli.data_dir.clone(),
            source_url: cli.source_url.clone(),
        },
    )?;

    match cli.command {
        Commands::Fetch => {
            run_fetch(&config).await?;
        }
        Commands::Build(args) => {
            prepare_store(&config, args.force).await?;
        }
        Commands::ServeHttp(args) => serve_http(args, &config).await?,
        Commands::Row(args) => {
            let engine = local_engine(&config)?;
            let max_time = args.max_time.map(|minutes| minutes.to_string());
            let row = engine.row(Some(&args.origin), max_time.as_deref())?;
            print_json(&row, args.output.pretty)?;
        }
        Commands::Pair(args) => {
            let engine = local_engine(&config)?;
            let pair = engine.pair(Some(&args.origin), Some(&args.dest))?;
            print_json(&pair, args.output.pretty)?;
        }
        Commands::Origins(args) => {
            let origins = local_engine(&config)?.origins()?;
            print_json(&origins, args.pretty)?;
        }
    }

    Ok(())
}

async fn run_fetch(config: &ServiceConfig) -> Result<PathBuf> {
    let raw = raw_file_path(&config.data_dir);
    match fetch_raw_file(&config.source_url, &raw, config.fetch_timeout).await? {
        FetchOutcome::Cached(path) => log::info!("Raw file already cached at {}", path.display()),
        FetchOutcome::Downloaded { path, bytes } => {
            log::info!("Downloaded {bytes} bytes to {}", path.display())
        }
    }
    Ok(raw)
}

/// Fetches the raw file if needed and builds the store. Returns the store path.
async fn prepare_store(config: &ServiceConfig, force: bool) -> Result<PathBuf> {
    let raw = run_fetch(config).await?;
    let builder = MatrixBuilder::new(store_path(&config.data_dir));
    let store = builder.store_path().to_path_buf();

    let outcome = tokio::task::spawn_blocking(move || {
        if force {
            builder.rebuild_from_file(&raw).map(BuildOutcome::Built)
        } else {
            builder.build_from_file(&raw)
        }
    })
    .await
    .context("matrix build task panicked")??;

    match outcome {
        BuildOutcome::Skipped { store } => {
            log::info!("Matrix store already built at {}", store.display())
        }
        BuildOutcome::Built(stats) => {
            if stats.skipped > 0 {
                log::warn!(
                    "Skipped {} malformed records out of {}",
                    stats.skipped,
                    stats.records
                );
            }
        }
    }
    Ok(store)
}

fn local_engine(config: &ServiceConfig) -> Result<QueryEngine> {
    let path = store_path(&config.data_dir);
    let store = SqliteMatrixStore::open(&path).with_context(|| {
        format!(
            "cannot open matrix store at {}; run `dtm build` first",
            path.display()
        )
    })?;
    Ok(QueryEngine::new(Arc::new(store), config.client_profiles()))
}

async fn serve_http(args: ServeArgs, config: &ServiceConfig) -> Result<()> {
    let path = prepare_store(config, false).await?;
    let store = SqliteMatrixStore::open(&path)?;
    log::info!(
        "Serving {} origins / {} edges from {}",
        store.origin_count()?,
        store.edge_count()?,
        path.display()
    );

    let state = Arc::new(AppState::new(config, Arc::new(store)));
    if !state.gate.is_configured() {
        log::warn!(
            "No API keys configured (set {} or [access] keys); data routes will answer 503",
            crate::config::API_KEYS_ENV
        );
    }
    let app = http_api::router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    let base_url = format!("http://{}", listener.local_addr()?);

    print_stdout(&format!("Serving drive-time API: {base_url}/dtm"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    print_stdout(&format!(
        "Try: curl -H 'Authorization: Bearer <key>' '{base_url}/dtm?origin=1012&maxTime=30'"
    ))?;

    axum::serve(listener, app).await?;
    Ok(())
}
