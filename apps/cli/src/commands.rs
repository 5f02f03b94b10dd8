//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use newsreel_core::pipeline::{ProgressReporter, RunSummary};
use newsreel_shared::{RunId, load_config};
use newsreel_storage::Store;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// newsreel — pull configured RSS feeds into a deduplicated local store.
#[derive(Parser)]
#[command(
    name = "newsreel",
    version,
    about = "Ingest RSS feeds through pluggable scraper backends into a deduplicated article store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the YAML ingestion config.
    #[arg(short, long, default_value = "config/scraping.yaml", global = true)]
    pub config: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `ingest` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one ingestion pass and exit.
    Ingest,

    /// Inspect or prune past ingestion runs.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

/// Run-record subcommands.
#[derive(Subcommand)]
pub(crate) enum RunsAction {
    /// List past runs, newest first.
    List,
    /// Show one run in detail, with a per-domain error breakdown.
    Show {
        /// Run ID as printed by `runs list`.
        run_id: String,
    },
    /// Delete a run record and every article it created.
    Remove {
        /// Run ID as printed by `runs list`.
        run_id: String,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsreel=info",
        1 => "newsreel=debug",
        _ => "newsreel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Command::Ingest) {
        Command::Ingest => cmd_ingest(&cli.config).await,
        Command::Runs { action } => match action {
            RunsAction::List => cmd_runs_list(&cli.config).await,
            RunsAction::Show { run_id } => cmd_runs_show(&cli.config, &run_id).await,
            RunsAction::Remove { run_id } => cmd_runs_remove(&cli.config, &run_id).await,
        },
    }
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let git = newsreel_core::capture_git_metadata();

    info!(
        config = %config_path.display(),
        db_path = %config.global.db_path,
        feeds = config.enabled_feeds().count(),
        "starting ingestion"
    );

    let store = Store::open(Path::new(&config.global.db_path)).await?;

    let reporter = CliProgress::new();
    let summary = newsreel_core::run_ingestion(
        &config,
        Some(config_path),
        &git,
        &store,
        &reporter,
    )
    .await?;

    // Print summary
    println!();
    println!("  Ingestion run {}", summary.run_id);
    println!("  Status:     {}", summary.status.as_str());
    println!("  Feeds:      {}", summary.feeds_processed);
    println!("  Attempted:  {}", summary.counters.attempted);
    println!("  Succeeded:  {}", summary.counters.succeeded);
    println!("  Failed:     {}", summary.counters.failed);
    println!("  Duplicates: {} skipped", summary.skipped_duplicates);
    println!("  Too old:    {} skipped", summary.skipped_old);
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// runs
// ---------------------------------------------------------------------------

async fn cmd_runs_list(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Store::open(Path::new(&config.global.db_path)).await?;

    let ops = store.list_operations().await?;
    if ops.is_empty() {
        println!("no ingestion runs recorded");
        return Ok(());
    }

    for op in ops {
        let finished = op
            .finished_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {}  started {}  finished {}  attempted {}  succeeded {}  failed {}  commit {}",
            op.id,
            op.status.as_str(),
            op.started_at.to_rfc3339(),
            finished,
            op.counters.attempted,
            op.counters.succeeded,
            op.counters.failed,
            op.git.commit.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

async fn cmd_runs_show(config_path: &Path, run_id: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Store::open(Path::new(&config.global.db_path)).await?;

    let run_id: RunId = run_id
        .parse()
        .map_err(|e| eyre!("invalid run id '{run_id}': {e}"))?;

    let Some(op) = store.get_operation(&run_id).await? else {
        println!("no run with id {run_id}");
        return Ok(());
    };

    println!();
    println!("  Run {}", op.id);
    println!("  Status:     {}", op.status.as_str());
    println!("  Started:    {}", op.started_at.to_rfc3339());
    println!(
        "  Finished:   {}",
        op.finished_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    );
    println!("  Commit:     {}", op.git.commit.as_deref().unwrap_or("-"));
    println!("  Branch:     {}", op.git.branch.as_deref().unwrap_or("-"));
    println!("  Repo:       {}", op.git.repo.as_deref().unwrap_or("-"));
    println!("  Attempted:  {}", op.counters.attempted);
    println!("  Succeeded:  {}", op.counters.succeeded);
    println!("  Failed:     {}", op.counters.failed);
    if let Some(params) = &op.parameters_json {
        println!("  Parameters: {params}");
    }

    // Per-domain article/error distribution, plus error kind totals.
    let articles = store.list_articles_for_run(&run_id).await?;
    if articles.is_empty() {
        println!();
        println!("  no articles recorded for this run");
        return Ok(());
    }

    let mut domains: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut error_kinds: BTreeMap<String, u64> = BTreeMap::new();
    for article in &articles {
        let domain = Url::parse(&article.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".into());
        let entry = domains.entry(domain).or_default();
        entry.0 += 1;
        if let Some(kind) = &article.error_kind {
            entry.1 += 1;
            *error_kinds.entry(kind.clone()).or_default() += 1;
        }
    }

    println!();
    println!("  Articles by domain:");
    for (domain, (total, errors)) in &domains {
        println!("    {domain}: {total} articles, {errors} errors");
    }

    if !error_kinds.is_empty() {
        println!();
        println!("  Errors by kind:");
        for (kind, count) in &error_kinds {
            println!("    {kind}: {count}");
        }
    }
    println!();

    Ok(())
}

async fn cmd_runs_remove(config_path: &Path, run_id: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = Store::open(Path::new(&config.global.db_path)).await?;

    let run_id: RunId = run_id
        .parse()
        .map_err(|e| eyre!("invalid run id '{run_id}': {e}"))?;

    if store.delete_operation(&run_id).await? {
        println!("removed run {run_id} and its articles");
    } else {
        println!("no run with id {run_id}");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn feed_started(&self, name: &str, backend: &str) {
        self.spinner.set_message(format!("Feed {name} ({backend})"));
    }

    fn article_fetched(&self, url: &str, current: usize, limit: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{limit}] {url}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
