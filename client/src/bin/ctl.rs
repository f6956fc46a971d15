use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use openai_balance::config::settings::Settings;
use openai_balance::page::local_today;
use openai_balance::{Page, Storage, UsageClient};
use openai_balance_protocol::row::parse_date;
use openai_balance_protocol::{DateRange, Row};

#[derive(Parser, Debug)]
#[command(name = "balancectl", version, about = "Check OpenAI billing usage through the balance relay")]
struct Cli {
    /// Relay base URL (overrides settings.yaml)
    #[arg(long, env = "OPENAI_BALANCE_RELAY_URL")]
    relay_url: Option<String>,

    /// Path of the row store (overrides settings.yaml)
    #[arg(long, env = "OPENAI_BALANCE_STORAGE")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch usage for a key and add it to the table
    Fetch {
        key: String,
        /// First billing day, YYYY-MM-DD
        #[arg(long, value_parser = date_arg, requires = "end_date")]
        start_date: Option<NaiveDate>,
        /// Day after the last billing day, YYYY-MM-DD
        #[arg(long, value_parser = date_arg, requires = "start_date")]
        end_date: Option<NaiveDate>,
        /// Shared query or URL carrying startDate and endDate
        #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
        query: Option<String>,
    },
    /// Show saved rows
    #[command(alias = "ls")]
    List,
    /// Re-fetch a saved row using the default date range
    Refresh {
        /// Row number as shown by `list`
        row: usize,
    },
    /// Rename a saved row; no name resets it to "Key"
    Rename { row: usize, name: Option<String> },
    /// Print the shareable query for the default date range
    Query,
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("expected YYYY-MM-DD, got '{}'", s))
}

/// Row numbers on the command line start at 1.
fn row_index(row: usize) -> Result<usize> {
    match row.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("row numbers start at 1"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = Settings::load();
    let relay_url = cli.relay_url.clone().unwrap_or_else(|| settings.relay_url.clone());
    let storage_path = cli
        .storage
        .clone()
        .or_else(|| settings.storage_path())
        .context("could not determine storage path")?;

    let storage = Storage::open(&storage_path)
        .with_context(|| format!("open storage at {}", storage_path.display()))?;
    let share_query = match &cli.command {
        Command::Fetch { query, .. } => query.as_deref(),
        _ => None,
    };
    let mut page = Page::load(storage, share_query).context("load saved rows")?;
    let client = UsageClient::new(&relay_url);

    match cli.command {
        Command::Fetch {
            key,
            start_date,
            end_date,
            ..
        } => {
            if let (Some(start), Some(end)) = (start_date, end_date) {
                page.set_range(DateRange::new(start, end));
            }
            page.submit(&client, &key).await?;
            print_summary(&page);
            print_table(page.rows());
        }
        Command::List => print_table(page.rows()),
        Command::Refresh { row } => {
            page.refresh(&client, row_index(row)?).await?;
            print_table(page.rows());
        }
        Command::Rename { row, name } => {
            if !page.rename(row_index(row)?, name.as_deref().unwrap_or(""))? {
                bail!("no row {}", row);
            }
            print_table(page.rows());
        }
        Command::Query => {
            println!("{}", DateRange::default_for(local_today()).to_share_query());
        }
    }

    if let Some(err) = page.error() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(page: &Page) {
    let range = page.display_range(local_today());
    println!("Billing from {} to {}", range.start_str(), range.end_str());
    println!("Total usage: ${}", page.total_usage());
    if let Some(query) = page.share_query() {
        println!("Share: ?{}", query);
    }
    println!();
}

fn print_table(rows: &[Row]) {
    if rows.is_empty() {
        println!("No saved keys");
        return;
    }

    let name_w = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    let key_w = rows.iter().map(|r| r.key.len()).max().unwrap_or(0).max(3);

    println!("{:>3}  {:<name_w$}  {:<key_w$}  Usage", "#", "Name", "Key");
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:>3}  {:<name_w$}  {:<key_w$}  {}",
            i + 1,
            row.name,
            row.key,
            row.usage
        );
    }
}
