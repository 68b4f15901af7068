// Interactive dashboard: reads commands from stdin, re-renders toasts on
// every ledger change and keeps the live feed polling in the background.

use crate::render;
use crate::App;
use anyhow::Result;
use colored::Colorize;
use greenloop_sdk::feed::{FeedSource, LiveFeed, LiveFeedPoller, PollerHandle};
use greenloop_sdk::mock_chain::MockLedgerService;
use greenloop_sdk::notify::NotificationLevel;
use greenloop_sdk::record::EvidenceKind;
use greenloop_sdk::surface::{Inspector, MemoryClipboard, ToastCenter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;

const PAGE_SIZE: usize = 10;

const HELP: &str = "\
Commands:
  add <kind> <id> <label...>       record evidence
  upload <label...>                simulate a proof file upload
  message <topic> <text...>        simulate an HCS message
  token <name> <symbol>            simulate minting a claim badge
  transfer <token> <to> <amount>   simulate a token transfer
  toggle                           expand / collapse the inspector
  list [page]                      show the inspector page
  search <text>                    filter by label or id (empty clears)
  kind <kind|all>                  filter by kind
  source <source|all>              filter by source
  clear                            remove all evidence
  toasts                           show visible toasts
  dismiss|open|copy <toast>        toast actions
  feed                             show the live feed
  refresh                          refresh the live feed now
  quit";

struct Dashboard {
    app: App,
    feed: LiveFeed,
    poller: PollerHandle,
    toasts: ToastCenter,
    inspector: Inspector,
    clipboard: MemoryClipboard,
    service: MockLedgerService,
}

pub async fn run(app: App) -> Result<()> {
    let source: Arc<dyn FeedSource> = Arc::new(app.feed_source()?);
    let feed = LiveFeed::new().with_notifier(app.notifier.clone());
    let poller = LiveFeedPoller::spawn(source, feed.clone(), app.config.poll_interval());

    let mut toasts = ToastCenter::new(app.config.toast_duration());
    toasts.prime(&app.store.records());

    let mut dash = Dashboard {
        app,
        feed,
        poller,
        toasts,
        inspector: Inspector::new(),
        clipboard: MemoryClipboard::new(),
        service: MockLedgerService::new(),
    };

    println!("{}", "GreenLoop Yield dashboard".green().bold());
    println!(
        "{}",
        format!(
            "{} evidence records, feed from {}{} every {}s. Type 'help' for commands.",
            dash.app.store.len(),
            dash.app.config.feed_base_url,
            dash.app.config.feed_path,
            dash.app.config.poll_interval_secs
        )
        .bright_black()
    );

    let mut revisions = dash.app.store.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut expiry = interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !dash.handle(line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                dash.on_store_change();
            }
            Some(note) = dash.app.notifications.recv() => {
                // Evidence toasts are rendered by the toast center
                if note.level != NotificationLevel::Evidence {
                    render::print_notification(&note);
                }
            }
            _ = expiry.tick() => {
                dash.toasts.expire(Instant::now());
            }
        }
    }

    dash.poller.shutdown();
    Ok(())
}

impl Dashboard {
    fn on_store_change(&mut self) {
        let records = self.app.store.records();
        if let Some(id) = self.toasts.observe(&records) {
            if let Some(toast) = self.toasts.get(id) {
                render::print_toast(toast);
            }
        }
        render::print_persistence(&self.app.store.persistence_status());
        if self.inspector.is_expanded() {
            render::print_page(&self.inspector.page(&records, 1, PAGE_SIZE));
        }
    }

    /// Returns false when the user asked to quit
    async fn handle(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();
        let args: Vec<&str> = rest.split_whitespace().collect();
        let store = &self.app.store;

        match cmd {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "quit" | "exit" | "q" => return false,

            "add" if args.len() >= 3 => {
                let label = args[2..].join(" ");
                let kind = EvidenceKind::parse(args[0]);
                store.add_evidence(kind, args[1], label, None, Some("Dashboard"));
            }
            "upload" if !rest.is_empty() => {
                let body = format!("{{\"label\":\"{}\"}}", rest);
                self.service
                    .record_file_upload(store, body.as_bytes(), rest, "Proof Upload", None);
            }
            "message" if args.len() >= 2 => {
                let text = args[1..].join(" ");
                self.service
                    .record_topic_message(store, args[0], &text, "Topic message", "Proof Upload");
            }
            "token" if args.len() == 2 => {
                self.service
                    .record_token_creation(store, args[0], args[1], "ClaimsHelper");
            }
            "transfer" if args.len() == 3 => match args[2].parse::<u64>() {
                Ok(amount) => {
                    self.service
                        .record_token_transfer(store, args[0], args[1], amount, "ClaimsHelper");
                }
                Err(_) => println!("{}", "Amount must be a whole number".red()),
            },

            "toggle" => {
                let state = self.inspector.toggle();
                println!("{}", format!("Inspector {:?}", state).bright_black());
                if self.inspector.is_expanded() {
                    render::print_page(&self.inspector.page(&store.records(), 1, PAGE_SIZE));
                }
            }
            "list" => {
                let page = args.first().and_then(|p| p.parse().ok()).unwrap_or(1);
                render::print_page(&self.inspector.page(&store.records(), page, PAGE_SIZE));
            }
            "search" => {
                self.inspector.set_search(rest);
                render::print_page(&self.inspector.page(&store.records(), 1, PAGE_SIZE));
            }
            "kind" if args.len() == 1 => {
                let kind = (args[0] != "all").then(|| EvidenceKind::parse(args[0]));
                self.inspector.set_kind_filter(kind);
                render::print_page(&self.inspector.page(&store.records(), 1, PAGE_SIZE));
            }
            "source" if !rest.is_empty() => {
                let source = (rest != "all").then(|| rest.to_string());
                self.inspector.set_source_filter(source);
                render::print_page(&self.inspector.page(&store.records(), 1, PAGE_SIZE));
            }
            "clear" => {
                if !self.inspector.clear(store) {
                    println!("{}", "Nothing to clear".yellow());
                }
            }

            "toasts" => {
                if self.toasts.active().is_empty() {
                    println!("{}", "No toasts".bright_black());
                }
                for toast in self.toasts.active() {
                    render::print_toast(toast);
                }
            }
            "dismiss" | "open" | "copy" if args.len() == 1 => {
                let Ok(id) = args[0].trim_start_matches('#').parse::<u64>() else {
                    println!("{}", "Toast id must be a number".red());
                    return true;
                };
                match cmd {
                    "dismiss" => {
                        if !self.toasts.dismiss(id) {
                            println!("{}", format!("No toast #{}", id).yellow());
                        }
                    }
                    "open" => match self.toasts.open_explorer(id) {
                        Some(url) => println!("{}", url.blue()),
                        None => println!("{}", format!("No toast #{}", id).yellow()),
                    },
                    _ => {
                        if self.toasts.copy_id(id, &self.clipboard) {
                            if let Some(copied) = self.clipboard.contents() {
                                println!("{}", format!("Copied {}", copied).green());
                            }
                        }
                    }
                }
            }

            "feed" => {
                if self.feed.is_loading() {
                    println!("{}", "Live feed loading...".bright_black());
                }
                render::print_feed(&self.feed.entries());
                if let Some(at) = self.feed.last_updated() {
                    println!("{}", format!("Updated {}", at.to_rfc3339()).bright_black());
                }
            }
            "refresh" => {
                if let Err(e) = self.poller.refresh().await {
                    println!("{}", format!("Refresh failed: {}", e).red());
                }
            }

            _ => println!("{}", format!("Unknown command '{}'. Type 'help'.", line).yellow()),
        }
        true
    }
}
