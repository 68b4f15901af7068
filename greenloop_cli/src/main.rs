mod dashboard;
mod render;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use greenloop_sdk::config::{default_config_path, GreenloopConfig};
use greenloop_sdk::feed::{HttpFeedSource, LiveFeed};
use greenloop_sdk::ledger::{EvidenceLedger, EvidenceStore};
use greenloop_sdk::mock_chain::MockLedgerService;
use greenloop_sdk::notify::{ChannelNotifier, Notification};
use greenloop_sdk::record::{EvidenceKind, Metadata};
use greenloop_sdk::storage::FileStorage;
use greenloop_sdk::surface::Inspector;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "greenloop")]
#[command(about = "GreenLoop Yield - evidence ledger and live proof feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (created with defaults if missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory holding the evidence ledger
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the dashboard server URL serving the live feed
    #[arg(long, global = true)]
    feed_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a piece of evidence
    Add {
        /// transaction, file, topic-message or token
        kind: String,

        /// Transaction hash, file id, topic id or token id
        evidence_id: String,

        /// Short human readable title
        label: String,

        /// Flow that produced the evidence
        #[arg(short, long)]
        source: Option<String>,

        /// Extra metadata as key=value (repeatable)
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },

    /// List recorded evidence, newest first
    List {
        #[arg(short, long)]
        kind: Option<String>,

        #[arg(short, long)]
        source: Option<String>,

        /// Case-insensitive match on label or id
        #[arg(long)]
        search: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Print the matching records as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the flows that have recorded evidence
    Sources,

    /// Remove all recorded evidence
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Fetch and show the live proof feed
    Feed,

    /// Run a demo flow against the mock ledger service
    Simulate {
        #[command(subcommand)]
        flow: Flow,
    },

    /// Interactive dashboard: toasts, inspector and live feed
    Dashboard,

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum Flow {
    /// Upload a proof file
    Upload {
        file: PathBuf,

        #[arg(short, long)]
        label: Option<String>,

        #[arg(long)]
        lot: Option<String>,
    },

    /// Publish a message on a topic
    Message { topic_id: String, message: String },

    /// Mint a claim badge token
    Token { name: String, symbol: String },

    /// Transfer tokens to an account
    Transfer {
        token_id: String,
        to: String,
        amount: u64,
    },
}

/// Everything a command needs
pub struct App {
    pub config: GreenloopConfig,
    pub store: EvidenceStore,
    pub notifier: Arc<ChannelNotifier>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(default_config_path);
        let mut config = GreenloopConfig::load_or_create(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
            .with_env_overrides()?;
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(url) = &cli.feed_url {
            config.feed_base_url = url.clone();
        }
        config.validate()?;
        log::debug!(
            "Using config {} (ledger in {})",
            config_path.display(),
            config.data_dir.display()
        );

        let (notifier, notifications) = ChannelNotifier::new();
        let notifier = Arc::new(notifier);
        let storage = Arc::new(FileStorage::new(config.data_dir.clone()));
        let ledger = EvidenceLedger::open(storage, config.ledger_bound)
            .with_resolver(config.resolver()?)
            .with_notifier(notifier.clone());

        Ok(Self {
            config,
            store: EvidenceStore::new(ledger),
            notifier,
            notifications,
        })
    }

    fn feed_source(&self) -> Result<HttpFeedSource> {
        Ok(HttpFeedSource::new(
            &self.config.feed_base_url,
            &self.config.feed_path,
            self.config.request_timeout(),
        )?)
    }

    /// Print queued notifications as toasts
    fn flush_notifications(&mut self) {
        while let Ok(n) = self.notifications.try_recv() {
            render::print_notification(&n);
        }
        render::print_persistence(&self.store.persistence_status());
    }
}

/// `key=value`; values that parse as JSON scalars keep their type
fn parse_meta(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata must be key=value, got '{}'", pair))?;
        let value = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(v) if !v.is_object() && !v.is_array() => v,
            _ => serde_json::Value::String(value.to_string()),
        };
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(metadata)
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut app = App::open(&cli)?;

    match cli.command {
        Commands::Add {
            kind,
            evidence_id,
            label,
            source,
            meta,
        } => {
            let kind = EvidenceKind::parse(&kind);
            if !kind.is_known() {
                println!("{}", format!("Unknown kind '{}', recording anyway", kind).yellow());
            }
            let metadata = parse_meta(&meta)?;
            let record = app.store.add_evidence(
                kind,
                evidence_id,
                label,
                Some(metadata),
                source.as_deref(),
            );
            app.flush_notifications();
            render::print_record(&record);
        }

        Commands::List {
            kind,
            source,
            search,
            page,
            page_size,
            json,
        } => {
            let mut inspector = Inspector::new();
            inspector.set_kind_filter(kind.as_deref().map(EvidenceKind::parse));
            inspector.set_source_filter(source);
            if let Some(q) = search {
                inspector.set_search(q);
            }

            let records = app.store.records();
            if json {
                println!("{}", serde_json::to_string_pretty(&inspector.visible(&records))?);
            } else {
                println!("\n{}", "Evidence Ledger".cyan().bold());
                println!("{}", "═".repeat(60).cyan());
                render::print_page(&inspector.page(&records, page, page_size));
            }
        }

        Commands::Sources => {
            let sources = app.store.sources();
            if sources.is_empty() {
                println!("{}", "No evidence recorded".yellow());
            }
            for source in sources {
                let count = app.store.evidence_by_source(&source).len();
                println!("{:<24} {}", source.bright_white(), count);
            }
        }

        Commands::Clear { yes } => {
            if app.store.is_empty() {
                println!("{}", "Nothing to clear".yellow());
                return Ok(());
            }
            let prompt = format!("Remove all {} evidence records?", app.store.len());
            if yes || confirm(&prompt)? {
                app.store.clear_evidence();
                app.flush_notifications();
            }
        }

        Commands::Feed => {
            println!("{}", "Fetching live feed...".cyan());
            let source = app.feed_source()?;
            let feed = LiveFeed::new().with_notifier(app.notifier.clone());
            match feed.refresh(&source).await {
                Ok(_) => {
                    app.flush_notifications();
                    render::print_feed(&feed.entries());
                }
                Err(e) => {
                    println!("{}", format!("Failed to fetch live feed: {}", e).red());
                    println!("{}", format!("Trying to connect to: {}", source.url()).yellow());
                }
            }
        }

        Commands::Simulate { flow } => {
            let service = MockLedgerService::new();
            let record = match flow {
                Flow::Upload { file, label, lot } => {
                    let contents = std::fs::read(&file)
                        .with_context(|| format!("reading {}", file.display()))?;
                    let label = label.unwrap_or_else(|| {
                        file.file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_else(|| "Proof upload".to_string())
                    });
                    let (receipt, record) = service.record_file_upload(
                        &app.store,
                        &contents,
                        &label,
                        "Proof Upload",
                        lot.as_deref(),
                    );
                    println!("{}: {}", "File ID".bright_white(), receipt.file_id.cyan());
                    record
                }
                Flow::Message { topic_id, message } => {
                    let (receipt, record) = service.record_topic_message(
                        &app.store,
                        &topic_id,
                        &message,
                        "Topic message",
                        "Proof Upload",
                    );
                    println!("{}: {}", "Sequence".bright_white(), receipt.sequence_number);
                    record
                }
                Flow::Token { name, symbol } => {
                    let (receipt, record) =
                        service.record_token_creation(&app.store, &name, &symbol, "ClaimsHelper");
                    println!("{}: {}", "Token ID".bright_white(), receipt.token_id.cyan());
                    record
                }
                Flow::Transfer { token_id, to, amount } => {
                    let (_, record) = service.record_token_transfer(
                        &app.store,
                        &token_id,
                        &to,
                        amount,
                        "ClaimsHelper",
                    );
                    record
                }
            };
            app.flush_notifications();
            render::print_record(&record);
        }

        Commands::Dashboard => {
            dashboard::run(app).await?;
        }

        Commands::Config => {
            println!("\n{}", "Configuration".cyan().bold());
            println!("{}", "═".repeat(50).cyan());
            println!("{}", serde_json::to_string_pretty(&app.config)?);
            println!("\n{}: {} records max", "Ledger".bright_white(), app.store.bound());
            println!("{}: {}", "Explorer".bright_white(), app.store.resolver().base_url());
        }
    }

    Ok(())
}
