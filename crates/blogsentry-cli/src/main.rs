use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogsentry_core::{storage::SourceRepository, AppConfig, Database};

mod commands;

#[derive(Parser)]
#[command(name = "blogsentry")]
#[command(author, version, about = "Monitor cybersecurity blogs, summarize new posts with AI and send digests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Manage monitored blogs and feeds
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Manage notification recipients
    Recipient {
        #[command(subcommand)]
        action: RecipientAction,
    },
    /// List stored articles
    Articles {
        /// Only articles from this source (by name)
        #[arg(long)]
        source: Option<String>,
        /// Summary status: pending, done, failed or skipped
        #[arg(long)]
        status: Option<String>,
        /// Text to look for in title, summary or content
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one article with its summary and key points
    Show {
        /// Article ID or a unique prefix of it
        id: String,
    },
    /// Show article and notification statistics
    Stats,
    /// Run the full pipeline once: scrape, summarize, notify
    Run,
    /// Scrape all active sources
    Scrape,
    /// Summarize pending articles
    Summarize {
        /// Requeue articles whose summarization failed before
        #[arg(long)]
        retry_failed: bool,
    },
    /// Summarize one article again
    Reprocess {
        /// Article ID or a unique prefix of it
        id: String,
    },
    /// Send the digest for articles not yet notified
    Notify,
    /// Show system status
    Status {
        /// Also test database, AI provider and notification channels
        #[arg(long)]
        check: bool,
    },
    /// Delete old scrape log entries
    Cleanup,
    /// Background scheduler running the pipeline periodically
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// Add a blog or feed
    Add {
        /// Unique display name
        #[arg(short = 'n', long)]
        name: String,
        /// Site URL (or feed URL with --rss)
        #[arg(short = 'u', long)]
        url: String,
        /// Treat the source as an RSS/Atom feed
        #[arg(long)]
        rss: bool,
        /// Feed endpoint when it differs from the site URL (implies --rss)
        #[arg(long)]
        feed_url: Option<String>,
    },
    /// Change the name, URL or kind of a source
    Edit {
        /// Current name of the source
        name: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(short = 'u', long)]
        url: Option<String>,
        /// Treat the source as an RSS/Atom feed
        #[arg(long, conflicts_with = "no_rss")]
        rss: bool,
        /// Scrape the source as an HTML page (clears the feed URL)
        #[arg(long, conflicts_with = "feed_url")]
        no_rss: bool,
        /// Feed endpoint (implies --rss); an empty value clears it
        #[arg(long)]
        feed_url: Option<String>,
    },
    /// Remove a source and its articles
    Remove { name: String },
    /// Resume scraping a source
    Enable { name: String },
    /// Stop scraping a source without deleting it
    Disable { name: String },
    /// List all sources
    List,
    /// Import feeds from an OPML file
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum RecipientAction {
    /// Add an email address or WhatsApp number
    Add {
        /// email or whatsapp
        channel: String,
        address: String,
    },
    /// Remove a recipient
    Remove { channel: String, address: String },
    /// List recipients
    List,
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the background daemon
    Start,
    /// Stop the background daemon once its current run has finished
    Stop {
        /// Seconds to wait for a run in progress to finish
        #[arg(long, default_value_t = 600)]
        timeout: u64,
        /// Kill the daemon if it is still running after the timeout
        #[arg(long)]
        force: bool,
    },
    /// Check daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return commands::init::run(force);
    }

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Database::new(&config).await?;

    if config.general.seed_default_sources {
        SourceRepository::new(&db).seed_defaults().await?;
    }

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Source { action } => match action {
            SourceAction::Add {
                name,
                url,
                rss,
                feed_url,
            } => commands::source::add(&db, &name, &url, rss, feed_url).await,
            SourceAction::Edit {
                name,
                new_name,
                url,
                rss,
                no_rss,
                feed_url,
            } => {
                let edit = commands::source::SourceEdit {
                    name: new_name,
                    url,
                    is_rss: match (rss, no_rss) {
                        (true, _) => Some(true),
                        (_, true) => Some(false),
                        _ => None,
                    },
                    feed_url,
                };
                commands::source::edit(&db, &name, edit).await
            }
            SourceAction::Remove { name } => commands::source::remove(&db, &name).await,
            SourceAction::Enable { name } => commands::source::set_active(&db, &name, true).await,
            SourceAction::Disable { name } => commands::source::set_active(&db, &name, false).await,
            SourceAction::List => commands::source::list(&db).await,
            SourceAction::Import { path } => commands::source::import(&db, &path).await,
        },
        Commands::Recipient { action } => match action {
            RecipientAction::Add { channel, address } => {
                commands::recipient::add(&db, &channel, &address).await
            }
            RecipientAction::Remove { channel, address } => {
                commands::recipient::remove(&db, &channel, &address).await
            }
            RecipientAction::List => commands::recipient::list(&db).await,
        },
        Commands::Articles {
            source,
            status,
            search,
            limit,
        } => {
            commands::articles::list(&db, source.as_deref(), status.as_deref(), search, limit).await
        }
        Commands::Show { id } => commands::articles::show(&db, &id).await,
        Commands::Stats => commands::stats::run(&db).await,
        Commands::Run => commands::pipeline::run(db, config).await,
        Commands::Scrape => commands::pipeline::scrape(db, config).await,
        Commands::Summarize { retry_failed } => {
            commands::pipeline::summarize(db, config, retry_failed).await
        }
        Commands::Reprocess { id } => commands::pipeline::reprocess(db, config, &id).await,
        Commands::Notify => commands::pipeline::notify(db, config).await,
        Commands::Status { check } => commands::status::run(db, config, check).await,
        Commands::Cleanup => commands::cleanup::run(&db, &config).await,
        Commands::Daemon { action } => match action {
            DaemonAction::Start => commands::daemon::start(db, config).await,
            DaemonAction::Stop { timeout, force } => commands::daemon::stop(timeout, force).await,
            DaemonAction::Status => commands::daemon::status().await,
        },
    }
}
