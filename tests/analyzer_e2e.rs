use pretty_assertions::assert_eq;

use pgfence::analyzer::{ci_gate_fails, AnalysisResult, Analyzer, FileInput};
use pgfence::config::AnalyzerConfig;
use pgfence::extract::{extract_source, Extraction, SourceFormat};
use pgfence::pg_types::lock_modes::LockMode;
use pgfence::pg_types::risk::RiskLevel;
use pgfence::plugins::PluginRegistry;
use pgfence::policy::Severity;
use pgfence::stats::{StatsSnapshot, TableStats};

fn sql_file(path: &str, sql: &str) -> FileInput {
    FileInput {
        path: path.to_string(),
        extraction: Extraction {
            sql: sql.to_string(),
            warnings: vec![],
            auto_commit: false,
        },
    }
}

fn analyze_with(files: &[FileInput], config: &AnalyzerConfig) -> Vec<AnalysisResult> {
    let plugins = PluginRegistry::new();
    Analyzer::new(config, None, &plugins)
        .analyze_batch(files)
        .unwrap()
}

fn analyze(sql: &str) -> AnalysisResult {
    analyze_with(&[sql_file("m.sql", sql)], &AnalyzerConfig::default()).remove(0)
}

#[test]
fn seed_1_add_not_null_column_without_default() {
    let result = analyze("ALTER TABLE users ADD COLUMN status varchar(20) NOT NULL;");
    let finding = result
        .checks
        .iter()
        .find(|c| c.rule_id == "add-column-not-null-no-default")
        .expect("finding must be present");
    assert_eq!(finding.lock, Some(LockMode::AccessExclusive));
    assert_eq!(finding.base_risk, RiskLevel::High);
    assert_eq!(finding.table.as_deref(), Some("users"));
    assert!(finding.safe_rewrite.as_ref().unwrap().steps.len() >= 5);
}

#[test]
fn seed_2_create_index_without_concurrently() {
    let result = analyze("CREATE INDEX idx ON users(email);");
    let finding = result
        .checks
        .iter()
        .find(|c| c.rule_id == "create-index-not-concurrent")
        .expect("finding must be present");
    assert_eq!(finding.lock, Some(LockMode::Share));
    assert_eq!(finding.base_risk, RiskLevel::Medium);
}

#[test]
fn seed_3_not_valid_validate_in_same_transaction() {
    let result = analyze(
        "BEGIN; ALTER TABLE t ADD CONSTRAINT c CHECK (x>0) NOT VALID; \
         ALTER TABLE t VALIDATE CONSTRAINT c; COMMIT;",
    );
    let violation = result
        .violations
        .iter()
        .find(|v| v.rule_id == "not-valid-validate-same-tx")
        .expect("violation must be present");
    assert_eq!(violation.severity, Severity::Error);
}

#[test]
fn seed_4_wide_lock_window_names_both_tables() {
    let result = analyze(
        "SET lock_timeout='2s';\n\
         BEGIN;\n\
         ALTER TABLE users ALTER COLUMN email TYPE text;\n\
         ALTER TABLE orders ALTER COLUMN status TYPE text;\n\
         COMMIT;",
    );
    let violation = result
        .violations
        .iter()
        .find(|v| v.rule_id == "wide-lock-window")
        .expect("violation must be present");
    assert_eq!(violation.severity, Severity::Warning);
    assert!(violation.message.contains("users"));
    assert!(violation.message.contains("orders"));
}

#[test]
fn seed_5_constant_default_depends_on_min_pg_version() {
    let sql = "ALTER TABLE appointments ADD COLUMN priority int DEFAULT 0;";
    let recent = analyze_with(&[sql_file("m.sql", sql)], &AnalyzerConfig::default()).remove(0);
    let finding = recent
        .checks
        .iter()
        .find(|c| c.rule_id == "add-column-constant-default")
        .expect("pg11 finding");
    assert_eq!(finding.base_risk, RiskLevel::Low);

    let config = AnalyzerConfig {
        min_pg_version: 10,
        ..Default::default()
    };
    let old = analyze_with(&[sql_file("m.sql", sql)], &config).remove(0);
    let finding = old
        .checks
        .iter()
        .find(|c| c.rule_id == "add-column-default-pre-pg11")
        .expect("pg10 finding");
    assert_eq!(finding.base_risk, RiskLevel::High);
}

#[test]
fn seed_6_inline_suppression_spares_other_rules() {
    let result = analyze("-- pgfence-ignore: drop-table\nDROP TABLE old_data;");
    assert!(result.checks.iter().all(|c| c.rule_id != "drop-table"));
    assert!(result
        .checks
        .iter()
        .any(|c| c.rule_id == "prefer-robust-drop-table"));
}

#[test]
fn bare_suppression_silences_the_statement_entirely() {
    let result = analyze("-- pgfence-ignore\nDROP TABLE old_data;\nTRUNCATE other;");
    assert!(result
        .checks
        .iter()
        .all(|c| c.statement != "DROP TABLE old_data"));
    assert!(result.checks.iter().any(|c| c.rule_id == "truncate"));
}

#[test]
fn cross_file_visibility_follows_batch_order() {
    let files = [
        sql_file("001_create.sql", "CREATE TABLE widgets (id bigint);"),
        sql_file(
            "002_alter.sql",
            "ALTER TABLE widgets ADD COLUMN name text NOT NULL;",
        ),
    ];
    let results = analyze_with(&files, &AnalyzerConfig::default());
    assert!(results[1]
        .checks
        .iter()
        .all(|c| c.rule_id != "add-column-not-null-no-default"));
}

#[test]
fn risk_adjustment_uses_row_counts() {
    let stats = StatsSnapshot::from_stats(vec![TableStats {
        schema_name: "public".to_string(),
        table_name: "users".to_string(),
        row_count: 12_000_000,
        total_bytes: 536_870_912,
    }]);
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, Some(&stats), &plugins)
        .analyze_batch(&[sql_file(
            "m.sql",
            "ALTER TABLE users ALTER COLUMN email TYPE text;",
        )])
        .unwrap();
    let finding = results[0]
        .checks
        .iter()
        .find(|c| c.rule_id == "alter-column-type")
        .unwrap();
    assert_eq!(finding.base_risk, RiskLevel::Low);
    assert_eq!(finding.adjusted_risk, Some(RiskLevel::Critical));
    assert_eq!(results[0].max_risk, RiskLevel::Critical);
}

#[test]
fn ci_gate_matches_spec_condition() {
    // risk above the ceiling
    let risky = analyze_with(
        &[sql_file("m.sql", "SET lock_timeout='2s'; DROP TABLE a;")],
        &AnalyzerConfig::default(),
    );
    assert!(ci_gate_fails(&risky, RiskLevel::High));
    assert!(!risky[0].has_error_violation() || ci_gate_fails(&risky, RiskLevel::Critical));

    // clean migration passes even at a strict ceiling
    let clean = analyze_with(
        &[sql_file("m.sql", "SET lock_timeout='2s'; SELECT 1;")],
        &AnalyzerConfig::default(),
    );
    assert!(!ci_gate_fails(&clean, RiskLevel::Safe));

    // an error-severity violation gates regardless of risk
    let violated = analyze_with(
        &[sql_file("m.sql", "SELECT 1;")],
        &AnalyzerConfig::default(),
    );
    assert!(violated[0].has_error_violation());
    assert!(ci_gate_fails(&violated, RiskLevel::Critical));
}

#[test]
fn typeorm_extraction_feeds_the_pipeline() {
    let source = r#"
export class AddStatus1700000000000 implements MigrationInterface {
    public async up(queryRunner: QueryRunner): Promise<void> {
        await queryRunner.query(`ALTER TABLE users ADD COLUMN status varchar(20) NOT NULL`);
        await queryRunner.query(buildDynamicSql());
    }
}
"#;
    let extraction = extract_source(SourceFormat::TypeOrm, "m.ts", source);
    assert_eq!(extraction.warnings.len(), 1);
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, None, &plugins)
        .analyze_batch(&[FileInput {
            path: "m.ts".to_string(),
            extraction,
        }])
        .unwrap();
    assert!(results[0]
        .checks
        .iter()
        .any(|c| c.rule_id == "add-column-not-null-no-default"));
    assert_eq!(results[0].warnings.len(), 1);
    assert_eq!(results[0].statement_count, 1);
}

#[test]
fn knex_builder_output_is_analyzable() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.alterTable('users', (t) => {
    t.string('status').notNullable();
  });
};
"#;
    let extraction = extract_source(SourceFormat::Knex, "m.js", source);
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, None, &plugins)
        .analyze_batch(&[FileInput {
            path: "m.js".to_string(),
            extraction,
        }])
        .unwrap();
    assert!(results[0]
        .checks
        .iter()
        .any(|c| c.rule_id == "add-column-not-null-no-default"));
}

#[test]
fn volatile_builder_default_is_flagged_non_constant() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.alterTable('users', (t) => {
    t.timestamp('created_at').defaultTo(knex.fn.now());
  });
};
"#;
    let extraction = extract_source(SourceFormat::Knex, "m.js", source);
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, None, &plugins)
        .analyze_batch(&[FileInput {
            path: "m.js".to_string(),
            extraction,
        }])
        .unwrap();
    assert!(results[0]
        .checks
        .iter()
        .any(|c| c.rule_id == "add-column-non-constant-default"));
}

#[test]
fn autocommit_hint_flows_from_typeorm_to_policy() {
    let source = r#"
export class M implements MigrationInterface {
    transaction = false;
    async up(queryRunner: QueryRunner) {
        await queryRunner.query('DROP TABLE a');
        await queryRunner.query('DROP TABLE b');
    }
}
"#;
    let extraction = extract_source(SourceFormat::TypeOrm, "m.ts", source);
    assert!(extraction.auto_commit);
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, None, &plugins)
        .analyze_batch(&[FileInput {
            path: "m.ts".to_string(),
            extraction,
        }])
        .unwrap();
    assert!(results[0]
        .violations
        .iter()
        .all(|v| v.rule_id != "statement-after-access-exclusive"));
}

#[test]
fn analysis_is_deterministic() {
    let sql = "SET lock_timeout='2s';\n\
               CREATE TABLE a (id bigint);\n\
               ALTER TABLE b ADD COLUMN x json;\n\
               DROP TABLE c;";
    let first = analyze(sql);
    let second = analyze(sql);
    assert_eq!(first.checks, second.checks);
    assert_eq!(first.violations, second.violations);
    assert_eq!(first.max_risk, second.max_risk);
}

#[test]
fn coverage_accounting_adds_up() {
    let extraction = Extraction {
        sql: "SELECT 1; SELECT 2; SELECT 3;".to_string(),
        warnings: vec![pgfence::extract::ExtractionWarning {
            path: "m.ts".to_string(),
            line: 4,
            column: 9,
            message: "Dynamic SQL".to_string(),
        }],
        auto_commit: false,
    };
    let config = AnalyzerConfig::default();
    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, None, &plugins)
        .analyze_batch(&[FileInput {
            path: "m.ts".to_string(),
            extraction,
        }])
        .unwrap();
    let coverage = pgfence::output::coverage(&results);
    assert_eq!(coverage.total_statements, 3);
    assert_eq!(coverage.dynamic_statements, 1);
    assert_eq!(coverage.coverage_percent, 67);
}

#[test]
fn extract_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0001_add.sql");
    std::fs::write(&path, "\u{feff}ALTER TABLE users ADD COLUMN b bigint;").unwrap();
    let extraction = pgfence::extract_file(None, path.to_str().unwrap()).unwrap();
    assert_eq!(extraction.sql, "ALTER TABLE users ADD COLUMN b bigint;");
}

#[test]
fn missing_file_is_an_error() {
    assert!(pgfence::extract_file(None, "/nonexistent/m.sql").is_err());
}
