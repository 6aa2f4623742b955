mod db;
mod export;
mod fetch;
mod listing;
mod parser;
mod report;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "wound_trials", about = "Clinical-trial eligibility criteria pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Inclusion,
    Exclusion,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the search-result listing CSV into the trial queue
    Init {
        /// Path to the listing file
        #[arg(short, long, default_value = "SearchResults.csv")]
        file: PathBuf,
    },
    /// Fetch unvisited detail pages and extract eligibility fields
    Scrape {
        /// Max pages to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Minimum gap between consecutive requests, in milliseconds
        #[arg(long, default_value = "500")]
        delay_ms: u64,
        /// Per-request timeout, in seconds
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Merge listings with extracts and clean/classify/tokenize criteria
    Process {
        /// Max trials to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one pipeline
    Run {
        /// Max pages to scrape+process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Minimum gap between consecutive requests, in milliseconds
        #[arg(long, default_value = "500")]
        delay_ms: u64,
        /// Per-request timeout, in seconds
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Write trials_data.csv and cleaned_trials_data.csv
    Export {
        /// Output directory
        #[arg(short, long, default_value = "data")]
        out: PathBuf,
    },
    /// Most distinctive criteria tokens per status group (tf × idf)
    Terms {
        /// Which criteria side to analyze
        #[arg(long, value_enum, default_value = "inclusion")]
        side: Side,
        /// Tokens to show per group
        #[arg(short = 'n', long, default_value = "15")]
        top: usize,
    },
    /// Processed trials overview table
    Overview {
        /// Filter by status (e.g. "Recruiting", "Completed")
        #[arg(short, long)]
        status: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = listing::load(&file)?;
            let inserted = db::insert_listings(&conn, &rows)?;
            println!("Inserted {} new trial listings ({} in file)", inserted, rows.len());
            Ok(())
        }
        Commands::Scrape { limit, delay_ms, timeout_secs } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited listings. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} detail pages (streaming to DB)...", pages.len());
            let cfg = fetch::FetchConfig {
                min_gap: Duration::from_millis(delay_ms),
                timeout: Duration::from_secs(timeout_secs),
            };
            let stats = fetch::fetch_pages_streaming(&conn, pages, cfg).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let records = db::fetch_unprocessed(&conn, limit)?;
            if records.is_empty() {
                println!("No unprocessed trials. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} trials...", records.len());
            let counts = process_records(&conn, &records)?;
            counts.print();
            report_dropped(&conn)?;
            Ok(())
        }
        Commands::Run { limit, delay_ms, timeout_secs } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited listings. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} detail pages...", pages.len());
            let cfg = fetch::FetchConfig {
                min_gap: Duration::from_millis(delay_ms),
                timeout: Duration::from_secs(timeout_secs),
            };
            let stats = fetch::fetch_pages_streaming(&conn, pages, cfg).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let t_process = Instant::now();
            let records = db::fetch_unprocessed(&conn, None)?;
            if records.is_empty() {
                println!("Nothing to process.");
                return Ok(());
            }
            println!("Processing {} trials...", records.len());
            let counts = process_records(&conn, &records)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            report_dropped(&conn)?;
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let (rows, columns) = export::write_datasets(&conn, &out)?;
            println!("Wrote {} trials ({} cleaned columns) to {}", rows, columns, out.display());
            Ok(())
        }
        Commands::Terms { side, top } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let column = match side {
                Side::Inclusion => "inclusion_bag",
                Side::Exclusion => "exclusion_bag",
            };
            let raw = db::fetch_status_bags(&conn, column)?;
            if raw.is_empty() {
                println!("No processed trials. Run 'process' first.");
                return Ok(());
            }
            let bags: Vec<(String, Vec<String>)> = raw
                .into_iter()
                .map(|(status, json)| {
                    let bag = serde_json::from_str(&json).unwrap_or_default();
                    (status, bag)
                })
                .collect();
            for group in report::distinctive_terms(&bags, top) {
                println!(
                    "\n{} ({} trials, {} tokens)",
                    group.status, group.trials, group.tokens
                );
                println!("{}", "-".repeat(44));
                for (token, score) in &group.top {
                    println!("  {:<32} {:>8.2}", truncate(token, 32), score);
                }
            }
            Ok(())
        }
        Commands::Overview { status, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, status.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No processed trials found.");
                return Ok(());
            }

            println!(
                "{:>5} | {:<40} | {:<22} | {:>6} | {:>6} | {}",
                "Rank", "Title", "Status", "#Incl", "#Excl", "Topics"
            );
            println!("{}", "-".repeat(110));
            for r in &rows {
                println!(
                    "{:>5} | {:<40} | {:<22} | {:>6} | {:>6} | {}",
                    r.rank,
                    truncate(&r.title, 40),
                    truncate(&r.status, 22),
                    r.inclusion_count,
                    r.exclusion_count,
                    truncate(&r.topics.join(", "), 40),
                );
            }
            println!("\n{} trials", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Listings:        {}", s.listings);
            println!("Visited:         {}", s.visited);
            println!("Unvisited:       {}", s.unvisited);
            println!("Extracted:       {}", s.extracted);
            println!("Fetch errors:    {}", s.fetch_errors);
            println!("Empty criteria:  {}", s.empty_criteria);
            println!("Processed:       {}", s.processed);
            println!("Dropped by join: {}", s.dropped_by_join);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    trials: usize,
    statements: usize,
    people_matches: usize,
    tokens: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} trials: {} criterion statements, {} people-criteria matches, {} tokens.",
            self.trials, self.statements, self.people_matches, self.tokens,
        );
    }
}

fn process_records(
    conn: &rusqlite::Connection,
    records: &[db::MergedRecord],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        trials: 0,
        statements: 0,
        people_matches: 0,
        tokens: 0,
    };

    for chunk in records.chunks(500) {
        let rows: Vec<_> = chunk.par_iter().map(parser::process_record).collect();

        for row in &rows {
            counts.statements += row.inclusion_cleaned.len() + row.exclusion_cleaned.len();
            counts.people_matches += row.inclusion_people.len() + row.exclusion_people.len();
            counts.tokens += row.inclusion_bag.len() + row.exclusion_bag.len();
        }
        counts.trials += rows.len();

        db::save_trials(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn report_dropped(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    let dropped = db::count_dropped_listings(conn)?;
    if dropped > 0 {
        info!("{} listings have no extract and were dropped by the join", dropped);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
