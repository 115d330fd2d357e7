use log::debug;

use crate::config::AnalyzerConfig;
use crate::extract::{Extraction, ExtractionWarning};
use crate::parser::parse_sql;
use crate::pg_types::risk::RiskLevel;
use crate::plugins::PluginRegistry;
use crate::policy::{check_file, PolicyViolation};
use crate::rules::{run_rules, select, CheckResult};
use crate::stats::{self, StatsSnapshot};
use crate::visibility::CreatedTables;

/// One migration file handed to the analyzer: its path and the extractor's
/// output.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub path: String,
    pub extraction: Extraction,
}

/// Everything the analyzer produced for one file.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub path: String,
    pub statement_count: usize,
    pub checks: Vec<CheckResult>,
    pub violations: Vec<PolicyViolation>,
    pub warnings: Vec<ExtractionWarning>,
    /// Maximum effective risk across all checks; SAFE when there are none.
    pub max_risk: RiskLevel,
}

impl AnalysisResult {
    pub fn has_error_violation(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == crate::policy::Severity::Error)
    }
}

/// The analysis pipeline: parse, run rules, walk policies, filter for
/// visibility, adjust for table size, aggregate.
///
/// Files are processed strictly in the order supplied; each file observes
/// the tables created by earlier files in the batch.
pub struct Analyzer<'a> {
    config: &'a AnalyzerConfig,
    stats: Option<&'a StatsSnapshot>,
    plugins: &'a PluginRegistry,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        config: &'a AnalyzerConfig,
        stats: Option<&'a StatsSnapshot>,
        plugins: &'a PluginRegistry,
    ) -> Self {
        Analyzer {
            config,
            stats,
            plugins,
        }
    }

    pub fn analyze_batch(&self, files: &[FileInput]) -> crate::Result<Vec<AnalysisResult>> {
        let mut created = CreatedTables::new();
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.analyze_file(file, &mut created)?);
        }
        Ok(results)
    }

    fn analyze_file(
        &self,
        file: &FileInput,
        created: &mut CreatedTables,
    ) -> crate::Result<AnalysisResult> {
        debug!("analyzing {}", file.path);
        let statements = parse_sql(&file.extraction.sql)?;
        let mut checks: Vec<CheckResult> = Vec::new();
        for statement in &statements {
            let mut results = run_rules(statement, self.config);
            let plugin_results = select(
                self.plugins.run(statement, self.config),
                statement,
                self.config,
            );
            results.extend(plugin_results);
            // The statement's own created tables become visible only to
            // later statements.
            checks.extend(created.filter(results));
            created.record(statement);
        }
        if let Some(stats) = self.stats {
            stats::apply(&mut checks, stats);
        }
        let violations = check_file(&statements, self.config, file.extraction.auto_commit);
        let max_risk = checks
            .iter()
            .map(|check| check.effective_risk())
            .max()
            .unwrap_or(RiskLevel::Safe);
        Ok(AnalysisResult {
            path: file.path.clone(),
            statement_count: statements.len(),
            checks,
            violations,
            warnings: file.extraction.warnings.clone(),
            max_risk,
        })
    }
}

/// The CI gate: exit non-zero iff any file's effective risk exceeds the
/// ceiling, or any error-severity policy violation exists.
pub fn ci_gate_fails(results: &[AnalysisResult], max_allowed: RiskLevel) -> bool {
    results
        .iter()
        .any(|result| result.max_risk > max_allowed || result.has_error_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sql_input(path: &str, sql: &str) -> FileInput {
        FileInput {
            path: path.to_string(),
            extraction: Extraction {
                sql: sql.to_string(),
                warnings: vec![],
                auto_commit: false,
            },
        }
    }

    fn analyze(files: &[FileInput]) -> Vec<AnalysisResult> {
        let config = AnalyzerConfig::default();
        let plugins = PluginRegistry::new();
        Analyzer::new(&config, None, &plugins)
            .analyze_batch(files)
            .unwrap()
    }

    #[test]
    fn aggregates_max_effective_risk() {
        let results = analyze(&[sql_input(
            "m1.sql",
            "CREATE INDEX idx ON users (email);\nDROP TABLE old_data;",
        )]);
        assert_eq!(results[0].max_risk, RiskLevel::Critical);
        assert_eq!(results[0].statement_count, 2);
    }

    #[test]
    fn empty_file_is_safe() {
        let results = analyze(&[sql_input("empty.sql", "")]);
        assert_eq!(results[0].max_risk, RiskLevel::Safe);
        assert_eq!(results[0].statement_count, 0);
        assert!(results[0].checks.is_empty());
    }

    #[test]
    fn parse_error_is_fatal() {
        let config = AnalyzerConfig::default();
        let plugins = PluginRegistry::new();
        let result = Analyzer::new(&config, None, &plugins)
            .analyze_batch(&[sql_input("bad.sql", "ALTER TABEL x;")]);
        assert!(result.is_err());
    }

    #[test]
    fn visibility_crosses_files_in_batch_order() {
        let results = analyze(&[
            sql_input("001.sql", "CREATE TABLE widgets (id bigint);"),
            sql_input(
                "002.sql",
                "ALTER TABLE widgets ADD COLUMN name text NOT NULL;",
            ),
        ]);
        assert!(
            !results[1]
                .checks
                .iter()
                .any(|c| c.rule_id == "add-column-not-null-no-default"),
            "second file must see the table created by the first"
        );
    }

    #[test]
    fn visibility_does_not_flow_backwards() {
        let results = analyze(&[
            sql_input(
                "001.sql",
                "ALTER TABLE widgets ADD COLUMN name text NOT NULL;",
            ),
            sql_input("002.sql", "CREATE TABLE widgets (id bigint);"),
        ]);
        assert!(results[0]
            .checks
            .iter()
            .any(|c| c.rule_id == "add-column-not-null-no-default"));
    }

    #[test]
    fn stats_adjust_effective_risk() {
        let config = AnalyzerConfig::default();
        let plugins = PluginRegistry::new();
        let stats = StatsSnapshot::from_stats(vec![crate::stats::TableStats {
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            row_count: 12_000_000,
            total_bytes: 1 << 30,
        }]);
        let results = Analyzer::new(&config, Some(&stats), &plugins)
            .analyze_batch(&[sql_input(
                "m.sql",
                "ALTER TABLE users ALTER COLUMN email TYPE text;",
            )])
            .unwrap();
        let check = results[0]
            .checks
            .iter()
            .find(|c| c.rule_id == "alter-column-type")
            .unwrap();
        assert_eq!(check.base_risk, RiskLevel::Low);
        assert_eq!(check.adjusted_risk, Some(RiskLevel::Critical));
        assert_eq!(results[0].max_risk, RiskLevel::Critical);
    }

    #[test]
    fn ci_gate_trips_on_risk_or_error_violation() {
        let gated = analyze(&[sql_input("m.sql", "SET lock_timeout = '2s'; DROP TABLE a;")]);
        assert!(ci_gate_fails(&gated, RiskLevel::High));
        // CRITICAL ceiling tolerates the risk, but an error violation still gates
        let with_error = analyze(&[sql_input("m.sql", "DROP TABLE a;")]);
        assert!(with_error[0].has_error_violation());
        assert!(ci_gate_fails(&with_error, RiskLevel::Critical));

        let clean = analyze(&[sql_input(
            "m.sql",
            "SET lock_timeout = '2s'; SELECT 1;",
        )]);
        assert!(!ci_gate_fails(&clean, RiskLevel::Safe));
    }

    #[test]
    fn analyzing_twice_yields_identical_results() {
        let files = [sql_input(
            "m.sql",
            "SET lock_timeout = '2s';\nALTER TABLE users ADD COLUMN status varchar(20) NOT NULL;",
        )];
        let first = analyze(&files);
        let second = analyze(&files);
        assert_eq!(first[0].checks, second[0].checks);
        assert_eq!(first[0].violations, second[0].violations);
        assert_eq!(first[0].max_risk, second[0].max_risk);
    }
}
