use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use denylist_common::Config;
use denylist_store::{ArtifactStore, DenylistStore};
use denylist_tracker::export::{export, fetch_current_denylist, ExportKind};
use denylist_tracker::links::ClosingPatterns;
use denylist_tracker::poll::Poller;
use denylist_tracker::reports::ReportGenerator;
use denylist_warehouse::Warehouse;
use github_client::GithubClient;

#[derive(Parser)]
#[command(name = "tracker", about = "Denylist issue tracker and report generator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate, poll, then generate reports (the scheduled job)
    Run,
    /// Poll issues and pulls into the store
    Poll,
    /// Generate reports for pending issues
    Reports,
    /// Re-resolve issues that have no entries against the current inventory
    Reparse,
    /// Apply database migrations
    Migrate,
    /// Print the updated denylist built from accepted entries
    Export {
        #[arg(long, value_enum, default_value_t = KindArg::Full)]
        kind: KindArg,
        /// Write the denylist here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write the pull request message here
        #[arg(long)]
        pr_message: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Full,
    Additions,
    Removals,
}

impl From<KindArg> for ExportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Full => ExportKind::Full,
            KindArg::Additions => ExportKind::Additions,
            KindArg::Removals => ExportKind::Removals,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("denylist=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::tracker_from_env();
    config.log_redacted();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&config.database_url)
        .await
        .context("connecting to tracker database")?;
    let store = DenylistStore::new(pool);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            store.migrate().await?;
            poll(&config, &store).await?;
            reports(&config, &store).await?;
        }
        Command::Poll => poll(&config, &store).await?,
        Command::Reports => reports(&config, &store).await?,
        Command::Reparse => {
            let github = github(&config)?;
            let warehouse = warehouse(&config).await?;
            let closing = ClosingPatterns::new(github.owner(), github.repo())?;
            let stats = Poller::new(&github, &store, &warehouse, closing)
                .reparse()
                .await?;
            info!(?stats, "Reparse complete");
        }
        Command::Migrate => {
            store.migrate().await?;
            info!("Migrations complete");
        }
        Command::Export {
            kind,
            output,
            pr_message,
        } => {
            let http = reqwest::Client::new();
            let current = fetch_current_denylist(&http, &config.denylist_csv_url).await?;
            let accepted = store.accepted_entries().await?;
            let out = export(kind.into(), &current, &accepted);
            info!(kind = ?out.kind, accepted = accepted.len(), "Denylist exported");

            match output {
                Some(path) => std::fs::write(&path, &out.denylist)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", out.denylist),
            }
            if let Some(path) = pr_message {
                std::fs::write(&path, &out.pr_message)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
    }

    Ok(())
}

async fn poll(config: &Config, store: &DenylistStore) -> Result<()> {
    let github = github(config)?;
    let warehouse = warehouse(config).await?;
    let closing = ClosingPatterns::new(github.owner(), github.repo())?;

    let stats = Poller::new(&github, store, &warehouse, closing).run().await?;
    info!(?stats, "Poll complete");
    Ok(())
}

async fn reports(config: &Config, store: &DenylistStore) -> Result<()> {
    let warehouse = warehouse(config).await?;
    let artifacts = ArtifactStore::from_location(&config.artifacts)?;

    let stats = ReportGenerator::new(
        store,
        &warehouse,
        &artifacts,
        config.report_window_days,
        config.report_block_window,
    )
    .run(Utc::now())
    .await?;
    info!(?stats, "Reports complete");
    Ok(())
}

fn github(config: &Config) -> Result<GithubClient> {
    Ok(GithubClient::new(
        config.github_token.clone(),
        &config.github_repo,
    )?)
}

async fn warehouse(config: &Config) -> Result<Warehouse> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.warehouse_url)
        .await
        .context("connecting to warehouse")?;
    Ok(Warehouse::new(pool))
}
