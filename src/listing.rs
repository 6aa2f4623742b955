use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::db::ListingRow;

const REQUIRED_HEADERS: &[&str] = &[
    "Rank", "Title", "Status", "Study Results", "Conditions", "Interventions", "Locations", "URL",
];

#[derive(Debug, Deserialize)]
struct CsvListing {
    #[serde(rename = "Rank")]
    rank: i64,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Study Results")]
    study_results: String,
    #[serde(rename = "Conditions")]
    conditions: String,
    #[serde(rename = "Interventions")]
    interventions: String,
    #[serde(rename = "Locations")]
    locations: String,
    #[serde(rename = "URL")]
    url: String,
}

/// Load the search-result listing CSV. An unreadable or malformed file is
/// fatal; rows with an empty URL are skipped with a count.
pub fn load(path: &Path) -> Result<Vec<ListingRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open listing file {}", path.display()))?;

    let headers = reader.headers().context("Listing file has no header row")?;
    for required in REQUIRED_HEADERS {
        if !headers.iter().any(|h| h == *required) {
            bail!("Listing file is missing required column '{}'", required);
        }
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.deserialize() {
        let row: CsvListing = record.context("Malformed listing row")?;
        if row.url.trim().is_empty() {
            skipped += 1;
            continue;
        }
        rows.push(ListingRow {
            rank: row.rank,
            title: row.title,
            status: row.status,
            study_results: row.study_results,
            conditions: row.conditions,
            interventions: row.interventions,
            locations: row.locations,
            url: row.url.trim().to_string(),
        });
    }

    info!(
        "Loaded {} listing rows from {} ({} skipped without URL)",
        rows.len(),
        path.display(),
        skipped
    );
    Ok(rows)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    // Minimal temp-file helper so tests need no fixture directory.
    struct TempCsv {
        path: PathBuf,
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn write_csv(content: &str) -> TempCsv {
        let path = std::env::temp_dir().join(format!(
            "wound_trials_listing_{}_{}.csv",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, content).unwrap();
        TempCsv { path }
    }

    const HEADER: &str = "Rank,Title,Status,Study Results,Conditions,Interventions,Locations,URL";

    #[test]
    fn loads_well_formed_rows() {
        let csv = format!(
            "{}\n1,Wound Study,Recruiting,No Results Available,Wounds,Device: Dressing,\"Boston, MA\",https://example.org/ct2/show/NCT01\n",
            HEADER
        );
        let f = write_csv(&csv);
        let rows = load(&f.path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].locations, "Boston, MA");
        assert_eq!(rows[0].url, "https://example.org/ct2/show/NCT01");
    }

    #[test]
    fn missing_column_is_fatal() {
        let f = write_csv("Rank,Title,URL\n1,Study,https://example.org\n");
        let err = load(&f.path).unwrap_err();
        assert!(err.to_string().contains("missing required column"));
    }

    #[test]
    fn rows_without_url_are_skipped() {
        let csv = format!(
            "{}\n1,A,Completed,Has Results,Wounds,,,https://example.org/a\n2,B,Completed,Has Results,Wounds,,,\n",
            HEADER
        );
        let f = write_csv(&csv);
        let rows = load(&f.path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "A");
    }

    #[test]
    fn unreadable_file_is_fatal() {
        assert!(load(Path::new("/nonexistent/SearchResults.csv")).is_err());
    }
}
