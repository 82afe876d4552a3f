#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for scanning IMAP mailboxes for suspicious MIME transfer
//! encodings

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use encscan::{CriteriaInput, Folder, ImapClient, ImapConfig, MatchRecord, ScanOptions};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "encscan-cli")]
#[command(
    about = "Scan IMAP mailboxes for suspicious MIME transfer encodings"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a folder for encoding anomalies
    Scan {
        /// Regular expression tested against each part's transfer
        /// encoding
        #[arg(long)]
        pattern: String,

        /// Folder to scan
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Search criteria as JSON: a token array like
        /// '["UNSEEN","FROM","x@y.com"]' or a predicate object like
        /// '{"seen":false}'
        #[arg(long, default_value = "[\"ALL\"]")]
        criteria: String,

        /// Only consider messages since this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,

        /// Only consider messages before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        before: Option<NaiveDate>,

        /// Match case-sensitively
        #[arg(long)]
        case_sensitive: bool,

        /// Keep scanning after the first match
        #[arg(long)]
        scan_all: bool,

        /// Stop after this many matches (0 = unbounded)
        #[arg(long, default_value = "0")]
        max_results: usize,

        /// Log progress every N scanned candidates (0 = disabled)
        #[arg(long, default_value = "0")]
        progress_every: usize,

        /// Attach raw headers to each match
        #[arg(long)]
        include_headers: bool,

        /// Attach the base64-encoded raw message to each match
        #[arg(long)]
        include_raw: bool,

        /// Output field name for the raw message attachment
        #[arg(long, default_value = "raw")]
        raw_field: String,
    },

    /// List available IMAP folders
    Folders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = ImapConfig::from_env()?;
    let client = ImapClient::new(config);

    match &args.command {
        Command::Scan {
            pattern,
            folder,
            criteria,
            since,
            before,
            case_sensitive,
            scan_all,
            max_results,
            progress_every,
            include_headers,
            include_raw,
            raw_field,
        } => {
            let mut options = ScanOptions::new(pattern.as_str());
            options.case_sensitive = *case_sensitive;
            options.stop_after_first = !scan_all;
            options.max_results = *max_results;
            options.progress_interval = *progress_every;
            options.include_raw_headers = *include_headers;
            options.include_raw_message = *include_raw;
            options.raw_field = raw_field.clone();

            cmd_scan(
                &client, &args, folder, criteria, *since, *before, options,
            )
            .await?;
        }
        Command::Folders => {
            cmd_folders(&client, &args).await?;
        }
    }

    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{s}': {e}"))
}

/// Merge `--since`/`--before` into the criteria, in IMAP date form
/// (e.g. `5-Jan-2024`). IMAP semantics: SINCE >= date, BEFORE < date.
fn apply_date_range(
    criteria: &mut CriteriaInput,
    since: Option<NaiveDate>,
    before: Option<NaiveDate>,
) {
    let imap_date = |d: NaiveDate| d.format("%-d-%b-%Y").to_string();
    match criteria {
        CriteriaInput::Tokens(tokens) => {
            if let Some(d) = since {
                tokens.push(json!("SINCE"));
                tokens.push(json!(imap_date(d)));
            }
            if let Some(d) = before {
                tokens.push(json!("BEFORE"));
                tokens.push(json!(imap_date(d)));
            }
        }
        CriteriaInput::Predicate(predicate) => {
            if let Some(d) = since {
                predicate.since = Some(imap_date(d));
            }
            if let Some(d) = before {
                predicate.before = Some(imap_date(d));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_scan(
    client: &ImapClient,
    args: &Args,
    folder: &str,
    criteria: &str,
    since: Option<NaiveDate>,
    before: Option<NaiveDate>,
    options: ScanOptions,
) -> anyhow::Result<()> {
    let mut criteria = CriteriaInput::from_json(criteria)?;
    apply_date_range(&mut criteria, since, before);
    let folder = Folder::from(folder);

    let summary = client.scan(&folder, &criteria, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_table(&summary.matches);
        println!(
            "{} match(es), scanned {} of {} candidate(s)",
            summary.matched, summary.scanned, summary.total_candidates
        );
    }

    Ok(())
}

async fn cmd_folders(
    client: &ImapClient,
    args: &Args,
) -> anyhow::Result<()> {
    let folders = client.list_folders().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        for folder in &folders {
            println!("{folder}");
        }
    }

    Ok(())
}

fn print_summary_table(matches: &[MatchRecord]) {
    if matches.is_empty() {
        println!("No anomalies found.");
        return;
    }

    let header = format!(
        "{:<8} {:<30} {:<40} {}",
        "UID", "From", "Subject", "Anomalies"
    );
    println!("{header}");
    println!("{}", "-".repeat(110));

    for record in matches {
        println!(
            "{:<8} {:<30} {:<40} {}",
            record.uid,
            truncate(record.from.as_deref().unwrap_or("-"), 28),
            truncate(record.subject.as_deref().unwrap_or("-"), 38),
            record.anomalies.join("; "),
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String =
            s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
