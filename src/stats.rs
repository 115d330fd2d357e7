use fxhash::FxHashMap;
use log::debug;
use postgres::{Client, NoTls};
use serde::{Deserialize, Serialize};

use crate::error::{ContextualResult, InnerError};
use crate::pg_types::risk::RiskLevel;
use crate::rules::CheckResult;

/// Row-count and size statistics for one table, as supplied by a stats file
/// or fetched from `pg_stat_user_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    #[serde(default)]
    pub schema_name: String,
    pub table_name: String,
    #[serde(default)]
    pub row_count: i64,
    #[serde(default)]
    pub total_bytes: i64,
}

/// Stats files may be a bare array or wrapped in `{"tables": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsFile {
    Bare(Vec<TableStats>),
    Wrapped { tables: Vec<TableStats> },
}

/// Table stats indexed two ways: unqualified lowercase name and
/// `schema.name` lowercase. The unqualified entry wins on lookup.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    by_name: FxHashMap<String, TableStats>,
    by_qualified: FxHashMap<String, TableStats>,
}

impl StatsSnapshot {
    pub fn from_stats(stats: Vec<TableStats>) -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_qualified = FxHashMap::default();
        for entry in stats {
            let qualified = format!(
                "{}.{}",
                entry.schema_name.to_lowercase(),
                entry.table_name.to_lowercase()
            );
            by_qualified.insert(qualified, entry.clone());
            by_name.insert(entry.table_name.to_lowercase(), entry);
        }
        StatsSnapshot {
            by_name,
            by_qualified,
        }
    }

    pub fn load_file(path: &str) -> crate::Result<Self> {
        let body =
            std::fs::read_to_string(path).with_context(format!("reading stats file: {path}"))?;
        let parsed: StatsFile = serde_json::from_str(&body)
            .map_err(|e| InnerError::BadStatsFile(format!("{path}: {e}")))?;
        let stats = match parsed {
            StatsFile::Bare(stats) => stats,
            StatsFile::Wrapped { tables } => tables,
        };
        Ok(Self::from_stats(stats))
    }

    pub fn lookup(&self, table: &str) -> Option<&TableStats> {
        let key = table.to_lowercase();
        self.by_name.get(&key).or_else(|| self.by_qualified.get(&key))
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_qualified.is_empty()
    }
}

/// The row-count step function: below 10k rows the base risk stands; each
/// decade past that bumps one level, and 10M+ rows pin the finding at
/// CRITICAL. Bumps saturate, so the function is monotonic in row count.
pub fn adjust_risk(base: RiskLevel, row_count: i64) -> RiskLevel {
    if row_count >= 10_000_000 {
        RiskLevel::Critical
    } else if row_count >= 1_000_000 {
        base.bump(2)
    } else if row_count >= 10_000 {
        base.bump(1)
    } else {
        base
    }
}

/// Apply the stats snapshot to a batch of findings, storing the adjusted
/// risk next to the base risk. Findings without a matching table (or any
/// table at all) keep their base risk.
pub fn apply(results: &mut [CheckResult], stats: &StatsSnapshot) {
    for result in results.iter_mut() {
        let Some(table) = result.table.as_deref() else {
            continue;
        };
        if let Some(found) = stats.lookup(table) {
            let adjusted = adjust_risk(result.base_risk, found.row_count);
            debug!(
                "risk for {} on {table}: {} -> {adjusted} ({} rows)",
                result.rule_id, result.base_risk, found.row_count
            );
            result.adjusted_risk = Some(adjusted);
        }
    }
}

/// Query `pg_stat_user_tables` once, read-only, identifying as pgfence.
/// This is the only database interaction in the crate and it happens
/// before any statement is analyzed.
pub fn fetch_from_db(url: &str) -> crate::Result<StatsSnapshot> {
    let mut client =
        Client::connect(url, NoTls).with_context("connecting for table statistics")?;
    client.batch_execute(
        "SET default_transaction_read_only = on; SET application_name = 'pgfence';",
    )?;
    let rows = client.query(
        "SELECT schemaname::text, relname::text, n_live_tup::bigint, \
         pg_total_relation_size(relid)::bigint \
         FROM pg_stat_user_tables",
        &[],
    )?;
    let stats = rows
        .iter()
        .map(|row| TableStats {
            schema_name: row.get(0),
            table_name: row.get(1),
            row_count: row.get(2),
            total_bytes: row.get(3),
        })
        .collect();
    client.close().ok();
    Ok(StatsSnapshot::from_stats(stats))
}
