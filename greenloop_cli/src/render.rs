use colored::Colorize;
use greenloop_sdk::feed::LiveFeedEntry;
use greenloop_sdk::ledger::{Page, PersistenceStatus};
use greenloop_sdk::notify::{Notification, NotificationLevel};
use greenloop_sdk::record::EvidenceRecord;
use greenloop_sdk::surface::Toast;

/// Shorten long ids for table output
pub fn short(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

pub fn print_record(record: &EvidenceRecord) {
    println!(
        "\n{} {} {}",
        format!("[{}]", record.kind().icon()).cyan().bold(),
        record.label().bright_white(),
        format!("({})", record.source()).bright_black()
    );
    println!("  {}: {}", "Evidence ID".bright_white(), record.evidence_id().green());
    println!("  {}: {}", "Time".bright_white(), record.timestamp().to_rfc3339());
    println!("  {}: {}", "Explorer".bright_white(), record.hashscan_url().blue());
    if !record.metadata().is_empty() {
        let meta: Vec<String> = record
            .metadata()
            .iter()
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{}={}", k, s),
                None => format!("{}={}", k, v),
            })
            .collect();
        println!("  {}: {}", "Metadata".bright_white(), meta.join(", ").bright_black());
    }
}

pub fn print_page(page: &Page<EvidenceRecord>) {
    if page.items.is_empty() {
        println!("{}", "No evidence recorded".yellow());
        return;
    }
    for record in &page.items {
        print_record(record);
    }
    println!(
        "\n{}",
        format!(
            "Page {}/{} ({} records)",
            page.page,
            page.total_pages.max(1),
            page.total
        )
        .bright_black()
    );
}

pub fn print_toast(toast: &Toast) {
    println!("{}", "┌".bright_black());
    println!(
        "{} {} {}",
        "│".bright_black(),
        toast.title().green().bold(),
        format!("#{}", toast.id).bright_black()
    );
    println!("{} {}", "│".bright_black(), toast.record.label());
    println!(
        "{} {} {}",
        "│".bright_black(),
        "open explorer:".bright_black(),
        toast.record.hashscan_url().blue()
    );
    println!(
        "{} {} {}",
        "│".bright_black(),
        "copy id:".bright_black(),
        toast.record.evidence_id()
    );
    println!("{}", "└".bright_black());
}

pub fn print_notification(n: &Notification) {
    let title = match n.level {
        NotificationLevel::Evidence => n.title.green().bold(),
        NotificationLevel::Info => n.title.cyan(),
        NotificationLevel::Success => n.title.green(),
        NotificationLevel::Warning => n.title.yellow().bold(),
    };
    println!("{} {}", title, n.description);
    if let Some(link) = &n.link {
        println!("  {}", link.blue());
    }
}

pub fn print_feed_entry(entry: &LiveFeedEntry) {
    let dash = || "-".to_string();
    println!(
        "{:<8} {:<12} {:<14} {:>6}  {}",
        entry.entry_type.clone().unwrap_or_else(dash),
        entry.lot_id.clone().unwrap_or_else(dash),
        entry.topic_id.clone().unwrap_or_else(dash),
        entry
            .sequence_number
            .map(|s| s.to_string())
            .unwrap_or_else(dash),
        entry
            .consensus_timestamp
            .clone()
            .or_else(|| entry.timestamp.clone())
            .unwrap_or_else(dash)
            .bright_black()
    );
    if let Some(raw) = &entry.raw_message {
        println!("         {}", short(raw, 60).bright_black());
    }
}

pub fn print_feed(entries: &[LiveFeedEntry]) {
    if entries.is_empty() {
        println!("{}", "Live feed is empty".yellow());
        return;
    }
    println!(
        "{:<8} {:<12} {:<14} {:>6}  {}",
        "Type", "Lot", "Topic", "Seq", "Consensus"
    );
    println!("{}", "-".repeat(70).bright_black());
    for entry in entries {
        print_feed_entry(entry);
    }
}

/// Visible warning when the ledger file no longer matches memory
pub fn print_persistence(status: &PersistenceStatus) {
    if let PersistenceStatus::Diverged { error } = status {
        println!(
            "{}",
            format!("Warning: evidence not saved to disk ({}); kept in memory only", error)
                .yellow()
                .bold()
        );
    }
}
