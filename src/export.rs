use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::db;

const MERGED_HEADERS: &[&str] = &[
    "Rank",
    "Title",
    "Status",
    "Study Results",
    "Conditions",
    "Interventions",
    "Locations",
    "URL",
    "EligibleAges",
    "EligibleSexes",
    "AcceptsHealthyVolunteers",
    "InclusionCriteria",
    "ExclusionCriteria",
];

const DERIVED_HEADERS: &[&str] = &[
    "CleanedInclusionCriteria",
    "CleanedExclusionCriteria",
    "# Inclusion Criteria",
    "# Exclusion Criteria",
    "Inclusion People Criteria",
    "Exclusion People Criteria",
    "Inclusion People Topic Criteria",
    "Exclusion People Topic Criteria",
    "bagInclusion",
    "bagExclusion",
    "numWordsInclusion",
    "numWordsExclusion",
];

/// Write `trials_data.csv` (the 13 merged columns) and
/// `cleaned_trials_data.csv` (merged + derived columns, sequence cells as
/// JSON arrays) into `out_dir`, one row per trial ordered by rank.
pub fn write_datasets(conn: &Connection, out_dir: &Path) -> Result<(usize, usize)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create output directory {}", out_dir.display()))?;
    let rows = db::fetch_export_rows(conn)?;

    let merged_path = out_dir.join("trials_data.csv");
    let mut merged = csv::Writer::from_path(&merged_path)
        .with_context(|| format!("Cannot write {}", merged_path.display()))?;
    merged.write_record(MERGED_HEADERS)?;
    for row in &rows {
        merged.write_record(&row.merged)?;
    }
    merged.flush()?;

    let cleaned_path = out_dir.join("cleaned_trials_data.csv");
    let mut cleaned = csv::Writer::from_path(&cleaned_path)
        .with_context(|| format!("Cannot write {}", cleaned_path.display()))?;
    let headers: Vec<&str> = MERGED_HEADERS.iter().chain(DERIVED_HEADERS).copied().collect();
    cleaned.write_record(&headers)?;
    for row in &rows {
        let record: Vec<&str> = row
            .merged
            .iter()
            .chain(row.derived.iter())
            .map(String::as_str)
            .collect();
        cleaned.write_record(&record)?;
    }
    cleaned.flush()?;

    info!(
        "Exported {} trials to {} and {}",
        rows.len(),
        merged_path.display(),
        cleaned_path.display()
    );
    Ok((rows.len(), MERGED_HEADERS.len() + DERIVED_HEADERS.len()))
}
