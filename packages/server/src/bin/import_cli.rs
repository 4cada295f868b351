//! Operator CLI for import runs and grant jobs.
//!
//! Run listings and statuses are printed as JSON, one document per line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ingest_core::common::{ImportRunId, ProposalId};
use ingest_core::domains::grants::{
    DailyVoteGrantJob, GrantKind, GrantStore, PgGrantStore, WeeklyTicketGrantJob,
};
use ingest_core::domains::import_runs::{
    ImportOrchestrator, ImportRunStatus, ImportRunStore, PgRunStore, RunCookieStore,
};
use ingest_core::domains::importing::importers::host_matches;
use ingest_core::domains::importing::{
    CoverDownloader, ImportJob, LogProgress, PgNovelStore, ResumableImporter,
};
use ingest_core::domains::scraping::storage_state::cookie_header_from_storage_state;
use ingest_core::domains::scraping::{FanqieScraper, Kks101Scraper};
use ingest_core::kernel::{BaseBookScraper, EventBus, IngestDeps, RunContext};
use ingest_core::Config;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "import_cli")]
#[command(about = "Novel import and grant operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the novel behind a proposal and wait for the run to finish
    Start {
        #[arg(long)]
        proposal: String,
        /// Cookie header stored with the run and reused on resume
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Resume a paused run and wait for it to finish
    Resume {
        #[arg(long)]
        run: String,
    },

    /// List import runs, newest first
    Runs {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Import a book directly from its URL, without a proposal or run row
    Book {
        #[arg(long)]
        url: String,
        /// 0 imports every chapter
        #[arg(long, default_value_t = 0)]
        chapters_limit: usize,
        #[arg(long)]
        cookie: Option<String>,
        /// Playwright storage_state file to read cookies from
        #[arg(long)]
        storage_state: Option<PathBuf>,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        referer: Option<String>,
    },

    /// Run a grant job for today
    Grant {
        #[arg(value_enum)]
        kind: GrantArg,
    },

    /// Show the latest grant log rows
    GrantStatus,

    /// Manage the cookie header stored for a run
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GrantArg {
    Daily,
    Weekly,
}

#[derive(Subcommand)]
enum CookieAction {
    Set {
        #[arg(long)]
        run: String,
        #[arg(long)]
        header: String,
    },
    Delete {
        #[arg(long)]
        run: String,
    },
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ingest_core=info,ingest_server=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = get_pool(&config).await?;

    match cli.command {
        Commands::Start { proposal, cookie } => cmd_start(&config, pool, &proposal, cookie).await,
        Commands::Resume { run } => cmd_resume(&config, pool, &run).await,
        Commands::Runs { status, limit } => cmd_runs(pool, status.as_deref(), limit).await,
        Commands::Book {
            url,
            chapters_limit,
            cookie,
            storage_state,
            user_agent,
            referer,
        } => {
            let cookie = resolve_book_cookie(&url, cookie, storage_state).await?;
            cmd_book(&config, pool, url, chapters_limit, cookie, user_agent, referer).await
        }
        Commands::Grant { kind } => cmd_grant(pool, kind).await,
        Commands::GrantStatus => cmd_grant_status(pool).await,
        Commands::Cookies { action } => cmd_cookies(pool, action).await,
    }
}

async fn get_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

fn orchestrator(config: &Config, pool: PgPool) -> Result<ImportOrchestrator> {
    let deps = IngestDeps::from_pool(pool, config, EventBus::new())?;
    Ok(ImportOrchestrator::new(deps))
}

/// Wait for the run to finish. Ctrl-C pauses it so it can be resumed later.
async fn wait_for_run(orchestrator: &ImportOrchestrator, run_id: ImportRunId) -> Result<()> {
    tokio::select! {
        _ = orchestrator.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(run_id = %run_id, "Interrupted, pausing run");
            orchestrator.pause_import(run_id).await?;
            orchestrator.wait_idle().await;
        }
    }
    Ok(())
}

async fn cmd_start(
    config: &Config,
    pool: PgPool,
    proposal: &str,
    cookie: Option<String>,
) -> Result<()> {
    let proposal_id = ProposalId::parse(proposal).context("Invalid proposal id")?;
    let orchestrator = orchestrator(config, pool.clone())?;

    let run_id = orchestrator.start_import_with_cookies(proposal_id, cookie);
    tracing::info!(run_id = %run_id, proposal_id = %proposal_id, "Import started");
    wait_for_run(&orchestrator, run_id).await?;

    print_run(&pool, run_id).await
}

async fn cmd_resume(config: &Config, pool: PgPool, run: &str) -> Result<()> {
    let run_id = ImportRunId::parse(run).context("Invalid run id")?;
    let orchestrator = orchestrator(config, pool.clone())?;

    if !orchestrator.resume_import(run_id).await? {
        anyhow::bail!("run {} is not paused", run_id);
    }
    wait_for_run(&orchestrator, run_id).await?;

    print_run(&pool, run_id).await
}

async fn print_run(pool: &PgPool, run_id: ImportRunId) -> Result<()> {
    let run = PgRunStore::new(pool.clone())
        .get_by_id(run_id)
        .await?
        .with_context(|| format!("run {} was not created", run_id))?;
    output(&run)
}

async fn cmd_runs(pool: PgPool, status: Option<&str>, limit: Option<i64>) -> Result<()> {
    let status = status.map(str::parse::<ImportRunStatus>).transpose()?;
    let runs = PgRunStore::new(pool).list(status, limit).await?;
    for run in &runs {
        output(run)?;
    }
    Ok(())
}

/// Explicit cookie wins; otherwise read one from the storage_state file.
async fn resolve_book_cookie(
    url: &str,
    cookie: Option<String>,
    storage_state: Option<PathBuf>,
) -> Result<Option<String>> {
    if let Some(cookie) = cookie.filter(|c| !c.trim().is_empty()) {
        return Ok(Some(cookie));
    }
    let Some(path) = storage_state else {
        return Ok(None);
    };
    let header = cookie_header_from_storage_state(&path, url).await?;
    Ok(Some(header).filter(|h| !h.is_empty()))
}

async fn cmd_book(
    config: &Config,
    pool: PgPool,
    url: String,
    chapters_limit: usize,
    cookie: Option<String>,
    user_agent: Option<String>,
    referer: Option<String>,
) -> Result<()> {
    let scraper: Box<dyn BaseBookScraper> = if host_matches(&url, "fanqienovel.com") {
        Box::new(FanqieScraper::new(cookie, user_agent)?)
    } else if host_matches(&url, "101kks.com") {
        Box::new(Kks101Scraper::new(cookie, user_agent, referer)?)
    } else {
        anyhow::bail!("no direct scraper for {}", url);
    };

    let novels = PgNovelStore::new(pool);
    let assets = CoverDownloader::new()?;
    let token = CancellationToken::new();
    let ctx = RunContext::with_timeout(token.clone(), config.import_run_timeout);

    let job = ImportJob {
        url,
        chapters_limit,
        upload_dir: config.uploads_dir.clone(),
        checkpoint: None,
    };
    let importer = ResumableImporter::new(scraper.as_ref(), &novels, &assets);

    let result = tokio::select! {
        result = importer.run(&ctx, job, &LogProgress) => result?,
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            anyhow::bail!("interrupted");
        }
    };

    output(&BookOutput {
        novel_id: result.novel_id.to_string(),
        slug: result.slug,
        chapters_total: result.chapters_total,
        chapters_saved: result.chapters_saved,
        cover_key: result.cover_key,
    })
}

#[derive(Serialize)]
struct BookOutput {
    novel_id: String,
    slug: String,
    chapters_total: usize,
    chapters_saved: usize,
    cover_key: Option<String>,
}

async fn cmd_grant(pool: PgPool, kind: GrantArg) -> Result<()> {
    let store = Arc::new(PgGrantStore::new(pool));
    let today = Utc::now().date_naive();
    let summary = match kind {
        GrantArg::Daily => DailyVoteGrantJob::new(store).run_for(today).await?,
        GrantArg::Weekly => WeeklyTicketGrantJob::new(store).run_for(today).await?,
    };
    tracing::info!(
        users = summary.users_processed,
        tickets = summary.tickets_granted,
        "Grant finished"
    );
    Ok(())
}

async fn cmd_grant_status(pool: PgPool) -> Result<()> {
    let store = PgGrantStore::new(pool);
    for kind in [GrantKind::DailyVote, GrantKind::WeeklyTicket] {
        match store.latest_log(kind).await? {
            Some(log) => output(&log)?,
            None => tracing::info!(kind = ?kind, "No grant has run yet"),
        }
    }
    Ok(())
}

async fn cmd_cookies(pool: PgPool, action: CookieAction) -> Result<()> {
    let store = PgRunStore::new(pool);
    match action {
        CookieAction::Set { run, header } => {
            let run_id = ImportRunId::parse(&run).context("Invalid run id")?;
            store.upsert(run_id, &header).await?;
            tracing::info!(run_id = %run_id, "Run cookie stored");
        }
        CookieAction::Delete { run } => {
            let run_id = ImportRunId::parse(&run).context("Invalid run id")?;
            RunCookieStore::delete(&store, run_id).await?;
            tracing::info!(run_id = %run_id, "Run cookie deleted");
        }
    }
    Ok(())
}
