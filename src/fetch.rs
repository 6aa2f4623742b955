use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::ExtractRow;
use crate::parser::eligibility;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = "wound_trials/0.1 (research batch; contact via repository)";

pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Minimum gap between consecutive request starts (rate-limit courtesy).
    pub min_gap: Duration,
    /// Per-request timeout; timeout counts as a missing-data outcome.
    pub timeout: Duration,
}

/// Fetch detail pages sequentially, saving each extract to DB as it arrives.
/// A failed fetch still produces a defaulted row so the batch never halts.
pub async fn fetch_pages_streaming(
    conn: &Connection,
    pages: Vec<(i64, String)>,
    cfg: FetchConfig,
) -> Result<FetchStats> {
    let client = reqwest::Client::builder()
        .timeout(cfg.timeout)
        .user_agent(USER_AGENT)
        .build()?;
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Prepare statements once, reuse for each row
    let mut insert_stmt = conn.prepare(
        "INSERT OR REPLACE INTO extracts
         (rank, url, eligible_ages, eligible_sexes, healthy_volunteers,
          inclusion_raw, exclusion_raw, http_status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut update_stmt = conn.prepare(
        "UPDATE listings SET visited = 1, visited_at = datetime('now') WHERE rank = ?1",
    )?;

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut last_request: Option<Instant> = None;

    for (rank, url) in pages {
        if let Some(started) = last_request {
            let since = started.elapsed();
            if since < cfg.min_gap {
                tokio::time::sleep(cfg.min_gap - since).await;
            }
        }
        last_request = Some(Instant::now());

        let row = fetch_with_retry(&client, rank, &url).await;
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }

        save_one(&mut insert_stmt, &mut update_stmt, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

/// Save a single extract to DB using pre-prepared statements.
fn save_one(
    insert: &mut rusqlite::Statement,
    update: &mut rusqlite::Statement,
    row: &ExtractRow,
) -> Result<()> {
    insert.execute(rusqlite::params![
        row.rank,
        row.url,
        row.eligible_ages,
        row.eligible_sexes,
        row.healthy_volunteers,
        row.inclusion_raw,
        row.exclusion_raw,
        row.http_status,
        row.error,
        row.latency_ms,
    ])?;
    update.execute(rusqlite::params![row.rank])?;
    Ok(())
}

async fn fetch_with_retry(client: &reqwest::Client, rank: i64, url: &str) -> ExtractRow {
    for attempt in 0..=MAX_RETRIES {
        let row = fetch_one(client, rank, url).await;

        let should_retry = matches!(row.http_status, Some(429 | 500 | 502 | 503));
        if !should_retry || attempt == MAX_RETRIES {
            if let Some(e) = &row.error {
                warn!("Fetch failed for {}: {}", url, e);
            }
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Retryable status {:?} on {} (attempt {}/{}), backing off {:.1}s",
            row.http_status,
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch_one(client, rank, url).await
}

async fn fetch_one(client: &reqwest::Client, rank: i64, url: &str) -> ExtractRow {
    let start = Instant::now();
    let response = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis() as i64;

    match response {
        Ok(resp) => {
            let status = resp.status();
            if !status.is_success() {
                let mut row = ExtractRow::failed(
                    rank,
                    url.to_string(),
                    format!("HTTP {}", status.as_u16()),
                    Some(elapsed),
                );
                row.http_status = Some(status.as_u16() as i32);
                return row;
            }
            match resp.text().await {
                Ok(body) => {
                    let fields = eligibility::extract_fields(&body);
                    ExtractRow {
                        rank,
                        url: url.to_string(),
                        eligible_ages: fields.eligible_ages,
                        eligible_sexes: fields.eligible_sexes,
                        healthy_volunteers: fields.healthy_volunteers,
                        inclusion_raw: fields.inclusion_raw,
                        exclusion_raw: fields.exclusion_raw,
                        http_status: Some(status.as_u16() as i32),
                        error: None,
                        latency_ms: Some(elapsed),
                    }
                }
                Err(e) => ExtractRow::failed(
                    rank,
                    url.to_string(),
                    format!("Body read failed: {}", e),
                    Some(elapsed),
                ),
            }
        }
        Err(e) => ExtractRow::failed(rank, url.to_string(), e.to_string(), Some(elapsed)),
    }
}
