use fxhash::FxHashSet;

use crate::parser::ParsedStatement;
use crate::rules::CheckResult;

/// Tracks tables created earlier in the batch so findings against them can
/// be suppressed: a brand-new table has no data and no concurrent readers.
///
/// Accumulation follows the caller's file order; a file sees tables created
/// in all earlier files plus those created earlier in its own body.
#[derive(Debug, Default)]
pub struct CreatedTables {
    tables: FxHashSet<String>,
}

impl CreatedTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record tables this statement creates. Call after filtering the
    /// statement's own findings, so `CREATE TABLE` does not hide findings
    /// on its own columns' rules that opted out.
    pub fn record(&mut self, statement: &ParsedStatement) {
        for table in statement.summary.created_tables() {
            self.tables.insert(table);
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(&table.to_lowercase())
    }

    /// Drop findings that target a table created earlier in this batch,
    /// unless the rule opted in via `applies_to_new_tables`.
    pub fn filter(&self, results: Vec<CheckResult>) -> Vec<CheckResult> {
        results
            .into_iter()
            .filter(|result| {
                result.applies_to_new_tables
                    || result
                        .table
                        .as_deref()
                        .map(|table| !self.contains(table))
                        .unwrap_or(true)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::parser::parse_sql;
    use crate::rules::run_rules;
    use pretty_assertions::assert_eq;

    #[test]
    fn suppresses_findings_on_new_tables() {
        let config = AnalyzerConfig::default();
        let statements = parse_sql(
            "CREATE TABLE widgets (id bigint);\n\
             ALTER TABLE widgets ADD COLUMN name text NOT NULL;",
        )
        .unwrap();
        let mut created = CreatedTables::new();
        created.record(&statements[0]);
        let results = created.filter(run_rules(&statements[1], &config));
        assert!(
            !results
                .iter()
                .any(|r| r.rule_id == "add-column-not-null-no-default"),
            "lock findings on a table created in the same batch are noise"
        );
    }

    #[test]
    fn opted_in_rules_survive() {
        let config = AnalyzerConfig::default();
        let statements = parse_sql(
            "CREATE TABLE widgets (id bigint);\n\
             ALTER TABLE widgets ADD COLUMN n int;",
        )
        .unwrap();
        let mut created = CreatedTables::new();
        created.record(&statements[0]);
        let results = created.filter(run_rules(&statements[1], &config));
        assert!(results.iter().any(|r| r.rule_id == "prefer-bigint-over-int"));
    }

    #[test]
    fn unrelated_tables_are_untouched() {
        let config = AnalyzerConfig::default();
        let statements = parse_sql(
            "CREATE TABLE widgets (id bigint);\n\
             ALTER TABLE gadgets ADD COLUMN name text NOT NULL;",
        )
        .unwrap();
        let mut created = CreatedTables::new();
        created.record(&statements[0]);
        let results = created.filter(run_rules(&statements[1], &config));
        assert!(results
            .iter()
            .any(|r| r.rule_id == "add-column-not-null-no-default"));
    }

    #[test]
    fn case_folded_matching() {
        let statements = parse_sql(r#"CREATE TABLE "Widgets" (id bigint);"#).unwrap();
        let mut created = CreatedTables::new();
        created.record(&statements[0]);
        assert!(created.contains("widgets"));
        assert!(created.contains("WIDGETS"));
    }

    #[test]
    fn findings_without_a_table_are_kept() {
        let results = vec![];
        let created = CreatedTables::new();
        assert_eq!(created.filter(results).len(), 0);
    }
}
