use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/trials.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            rank          INTEGER PRIMARY KEY,
            title         TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT '',
            study_results TEXT NOT NULL DEFAULT '',
            conditions    TEXT NOT NULL DEFAULT '',
            interventions TEXT NOT NULL DEFAULT '',
            locations     TEXT NOT NULL DEFAULT '',
            url           TEXT UNIQUE NOT NULL,
            visited       BOOLEAN NOT NULL DEFAULT 0,
            visited_at    TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_listings_visited ON listings(visited);

        CREATE TABLE IF NOT EXISTS extracts (
            id                 INTEGER PRIMARY KEY,
            rank               INTEGER NOT NULL REFERENCES listings(rank),
            url                TEXT NOT NULL,
            eligible_ages      TEXT NOT NULL DEFAULT '',
            eligible_sexes     TEXT NOT NULL DEFAULT '',
            healthy_volunteers TEXT NOT NULL DEFAULT '',
            inclusion_raw      TEXT NOT NULL DEFAULT '',
            exclusion_raw      TEXT NOT NULL DEFAULT '',
            http_status        INTEGER,
            error              TEXT,
            latency_ms         INTEGER,
            fetched_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_extracts_url ON extracts(url);

        -- Merged + cleaned dataset, one row per joined trial.
        -- Sequence-valued columns hold JSON arrays.
        CREATE TABLE IF NOT EXISTS trials (
            rank               INTEGER PRIMARY KEY REFERENCES listings(rank),
            title              TEXT NOT NULL,
            status             TEXT NOT NULL,
            study_results      TEXT NOT NULL,
            conditions         TEXT NOT NULL,
            interventions      TEXT NOT NULL,
            locations          TEXT NOT NULL,
            url                TEXT UNIQUE NOT NULL,
            eligible_ages      TEXT NOT NULL,
            eligible_sexes     TEXT NOT NULL,
            healthy_volunteers TEXT NOT NULL,
            inclusion_raw      TEXT NOT NULL,
            exclusion_raw      TEXT NOT NULL,
            inclusion_cleaned  TEXT NOT NULL,
            exclusion_cleaned  TEXT NOT NULL,
            inclusion_count    INTEGER NOT NULL DEFAULT 0,
            exclusion_count    INTEGER NOT NULL DEFAULT 0,
            inclusion_people   TEXT NOT NULL,
            exclusion_people   TEXT NOT NULL,
            inclusion_topics   TEXT NOT NULL,
            exclusion_topics   TEXT NOT NULL,
            inclusion_bag      TEXT NOT NULL,
            exclusion_bag      TEXT NOT NULL,
            inclusion_words    INTEGER NOT NULL DEFAULT 0,
            exclusion_words    INTEGER NOT NULL DEFAULT 0,
            processed_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_trials_status ON trials(status);
        ",
    )?;
    Ok(())
}

// ── Listing ──

#[derive(Debug, Clone)]
pub struct ListingRow {
    pub rank: i64,
    pub title: String,
    pub status: String,
    pub study_results: String,
    pub conditions: String,
    pub interventions: String,
    pub locations: String,
    pub url: String,
}

pub fn insert_listings(conn: &Connection, rows: &[ListingRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO listings
             (rank, title, status, study_results, conditions, interventions, locations, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.rank, r.title, r.status, r.study_results,
                r.conditions, r.interventions, r.locations, r.url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT rank, url FROM listings WHERE visited = 0 ORDER BY rank LIMIT {}",
            n
        ),
        None => "SELECT rank, url FROM listings WHERE visited = 0 ORDER BY rank".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Extraction ──

#[derive(Debug, Clone)]
pub struct ExtractRow {
    pub rank: i64,
    pub url: String,
    pub eligible_ages: String,
    pub eligible_sexes: String,
    pub healthy_volunteers: String,
    pub inclusion_raw: String,
    pub exclusion_raw: String,
    pub http_status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

impl ExtractRow {
    /// Defaulted row for a failed fetch: all fields empty, error recorded.
    pub fn failed(rank: i64, url: String, error: String, latency_ms: Option<i64>) -> Self {
        ExtractRow {
            rank,
            url,
            eligible_ages: String::new(),
            eligible_sexes: String::new(),
            healthy_volunteers: String::new(),
            inclusion_raw: String::new(),
            exclusion_raw: String::new(),
            http_status: None,
            error: Some(error),
            latency_ms,
        }
    }
}

// ── Merge + processing ──

/// One listing row joined with its extract on URL (inner-join semantics).
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub rank: i64,
    pub title: String,
    pub status: String,
    pub study_results: String,
    pub conditions: String,
    pub interventions: String,
    pub locations: String,
    pub url: String,
    pub eligible_ages: String,
    pub eligible_sexes: String,
    pub healthy_volunteers: String,
    pub inclusion_raw: String,
    pub exclusion_raw: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<MergedRecord>> {
    let sql = format!(
        "SELECT l.rank, l.title, l.status, l.study_results, l.conditions,
                l.interventions, l.locations, l.url,
                e.eligible_ages, e.eligible_sexes, e.healthy_volunteers,
                e.inclusion_raw, e.exclusion_raw
         FROM listings l
         JOIN extracts e ON e.url = l.url
         LEFT JOIN trials t ON t.rank = l.rank
         WHERE t.rank IS NULL
         ORDER BY l.rank{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MergedRecord {
                rank: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
                study_results: row.get(3)?,
                conditions: row.get(4)?,
                interventions: row.get(5)?,
                locations: row.get(6)?,
                url: row.get(7)?,
                eligible_ages: row.get(8)?,
                eligible_sexes: row.get(9)?,
                healthy_volunteers: row.get(10)?,
                inclusion_raw: row.get(11)?,
                exclusion_raw: row.get(12)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Listings that would vanish from the inner join (no extract for their URL).
pub fn count_dropped_listings(conn: &Connection) -> Result<usize> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM listings l
         LEFT JOIN extracts e ON e.url = l.url
         WHERE e.id IS NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(n)
}

#[derive(Debug, Clone)]
pub struct TrialRow {
    pub record: MergedRecord,
    pub inclusion_cleaned: Vec<String>,
    pub exclusion_cleaned: Vec<String>,
    pub inclusion_people: Vec<String>,
    pub exclusion_people: Vec<String>,
    pub inclusion_topics: Vec<String>,
    pub exclusion_topics: Vec<String>,
    pub inclusion_bag: Vec<String>,
    pub exclusion_bag: Vec<String>,
}

pub fn save_trials(conn: &Connection, rows: &[TrialRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO trials
             (rank, title, status, study_results, conditions, interventions, locations, url,
              eligible_ages, eligible_sexes, healthy_volunteers, inclusion_raw, exclusion_raw,
              inclusion_cleaned, exclusion_cleaned, inclusion_count, exclusion_count,
              inclusion_people, exclusion_people, inclusion_topics, exclusion_topics,
              inclusion_bag, exclusion_bag, inclusion_words, exclusion_words)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,
                     ?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)",
        )?;
        for t in rows {
            let r = &t.record;
            stmt.execute(rusqlite::params![
                r.rank, r.title, r.status, r.study_results, r.conditions,
                r.interventions, r.locations, r.url,
                r.eligible_ages, r.eligible_sexes, r.healthy_volunteers,
                r.inclusion_raw, r.exclusion_raw,
                serde_json::to_string(&t.inclusion_cleaned)?,
                serde_json::to_string(&t.exclusion_cleaned)?,
                t.inclusion_cleaned.len(),
                t.exclusion_cleaned.len(),
                serde_json::to_string(&t.inclusion_people)?,
                serde_json::to_string(&t.exclusion_people)?,
                serde_json::to_string(&t.inclusion_topics)?,
                serde_json::to_string(&t.exclusion_topics)?,
                serde_json::to_string(&t.inclusion_bag)?,
                serde_json::to_string(&t.exclusion_bag)?,
                t.inclusion_bag.len(),
                t.exclusion_bag.len(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Export ──

/// A trials row as stored, sequence columns still JSON-encoded.
pub struct ExportRow {
    pub merged: [String; 13],
    pub derived: [String; 12],
}

pub fn fetch_export_rows(conn: &Connection) -> Result<Vec<ExportRow>> {
    let mut stmt = conn.prepare(
        "SELECT rank, title, status, study_results, conditions, interventions, locations, url,
                eligible_ages, eligible_sexes, healthy_volunteers, inclusion_raw, exclusion_raw,
                inclusion_cleaned, exclusion_cleaned, inclusion_count, exclusion_count,
                inclusion_people, exclusion_people, inclusion_topics, exclusion_topics,
                inclusion_bag, exclusion_bag, inclusion_words, exclusion_words
         FROM trials ORDER BY rank",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let rank: i64 = row.get(0)?;
            let incl_count: i64 = row.get(15)?;
            let excl_count: i64 = row.get(16)?;
            let incl_words: i64 = row.get(23)?;
            let excl_words: i64 = row.get(24)?;
            Ok(ExportRow {
                merged: [
                    rank.to_string(),
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                    row.get(12)?,
                ],
                derived: [
                    row.get(13)?,
                    row.get(14)?,
                    incl_count.to_string(),
                    excl_count.to_string(),
                    row.get(17)?,
                    row.get(18)?,
                    row.get(19)?,
                    row.get(20)?,
                    row.get(21)?,
                    row.get(22)?,
                    incl_words.to_string(),
                    excl_words.to_string(),
                ],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Reporting ──

/// (status, bag JSON) pairs for one criteria side, ordered by rank.
pub fn fetch_status_bags(conn: &Connection, column: &str) -> Result<Vec<(String, String)>> {
    // column is one of the two bag column names, never user input
    let sql = format!("SELECT status, {} FROM trials ORDER BY rank", column);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct OverviewRow {
    pub rank: i64,
    pub title: String,
    pub status: String,
    pub inclusion_count: i64,
    pub exclusion_count: i64,
    pub topics: Vec<String>,
}

pub fn fetch_overview(
    conn: &Connection,
    status: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let sql = format!(
        "SELECT rank, title, status, inclusion_count, exclusion_count,
                inclusion_topics, exclusion_topics
         FROM trials{}
         ORDER BY rank LIMIT {}",
        match status {
            Some(_) => " WHERE status = ?1",
            None => "",
        },
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<OverviewRow> {
        let incl_topics: String = row.get(5)?;
        let excl_topics: String = row.get(6)?;
        // Each label once, first-occurrence order (labels repeat per match)
        let mut topics: Vec<String> = Vec::new();
        for label in serde_json::from_str::<Vec<String>>(&incl_topics)
            .unwrap_or_default()
            .into_iter()
            .chain(serde_json::from_str::<Vec<String>>(&excl_topics).unwrap_or_default())
        {
            if !topics.contains(&label) {
                topics.push(label);
            }
        }
        Ok(OverviewRow {
            rank: row.get(0)?,
            title: row.get(1)?,
            status: row.get(2)?,
            inclusion_count: row.get(3)?,
            exclusion_count: row.get(4)?,
            topics,
        })
    }
    let rows = match status {
        Some(s) => stmt
            .query_map(rusqlite::params![s], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub listings: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub extracted: usize,
    pub fetch_errors: usize,
    pub empty_criteria: usize,
    pub processed: usize,
    pub dropped_by_join: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let listings: usize = conn.query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM listings WHERE visited = 1", [], |r| r.get(0))?;
    let extracted: usize = conn.query_row("SELECT COUNT(*) FROM extracts", [], |r| r.get(0))?;
    let fetch_errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM extracts WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let empty_criteria: usize = conn.query_row(
        "SELECT COUNT(*) FROM extracts WHERE inclusion_raw = '' AND error IS NULL",
        [],
        |r| r.get(0),
    )?;
    let processed: usize = conn.query_row("SELECT COUNT(*) FROM trials", [], |r| r.get(0))?;
    let dropped_by_join = count_dropped_listings(conn)?;
    Ok(Stats {
        listings,
        visited,
        unvisited: listings - visited,
        extracted,
        fetch_errors,
        empty_criteria,
        processed,
        dropped_by_join,
    })
}

// ── Tests ──
