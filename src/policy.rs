use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use crate::config::AnalyzerConfig;
use crate::parser::{preview, ParsedStatement};
use crate::pg_types::lock_modes::LockMode;
use crate::policy::timeouts::parse_timeout;
use crate::policy::tx_state::TransactionState;
use crate::rules::ast::{AlterTableAction, DropKind, StatementSummary, TxOp};

/// Transaction state machine driving the per-file walk.
pub mod tx_state;

/// The PostgreSQL duration grammar for timeout values.
pub mod timeouts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Output unit of the policy engine: a migration-wide violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub suggested_fix: String,
}

pub const MISSING_LOCK_TIMEOUT: &str = "missing-lock-timeout";
pub const MISSING_STATEMENT_TIMEOUT: &str = "missing-statement-timeout";
pub const MISSING_APPLICATION_NAME: &str = "missing-application-name";
pub const MISSING_IDLE_TIMEOUT: &str = "missing-idle-in-transaction-session-timeout";
pub const LOCK_TIMEOUT_TOO_LONG: &str = "lock-timeout-too-long";
pub const STATEMENT_TIMEOUT_TOO_LONG: &str = "statement-timeout-too-long";
pub const LOCK_TIMEOUT_AFTER_DANGEROUS: &str = "lock-timeout-after-dangerous-statement";
pub const STATEMENT_AFTER_ACCESS_EXCLUSIVE: &str = "statement-after-access-exclusive";
pub const WIDE_LOCK_WINDOW: &str = "wide-lock-window";
pub const NOT_VALID_VALIDATE_SAME_TX: &str = "not-valid-validate-same-tx";
pub const CONCURRENT_IN_TRANSACTION: &str = "concurrent-in-transaction";
pub const UPDATE_IN_MIGRATION: &str = "update-in-migration";

/// Every policy rule ID, for reporter registration.
pub const POLICY_RULE_IDS: &[&str] = &[
    MISSING_LOCK_TIMEOUT,
    MISSING_STATEMENT_TIMEOUT,
    MISSING_APPLICATION_NAME,
    MISSING_IDLE_TIMEOUT,
    LOCK_TIMEOUT_TOO_LONG,
    STATEMENT_TIMEOUT_TOO_LONG,
    LOCK_TIMEOUT_AFTER_DANGEROUS,
    STATEMENT_AFTER_ACCESS_EXCLUSIVE,
    WIDE_LOCK_WINDOW,
    NOT_VALID_VALIDATE_SAME_TX,
    CONCURRENT_IN_TRANSACTION,
    UPDATE_IN_MIGRATION,
];

fn violation(rule_id: &str, severity: Severity, message: String, fix: &str) -> PolicyViolation {
    PolicyViolation {
        rule_id: rule_id.to_string(),
        severity,
        message,
        suggested_fix: fix.to_string(),
    }
}

/// True for the statements the policy engine counts as holding
/// ACCESS EXCLUSIVE for the rest of the transaction. ADD COLUMN, VALIDATE
/// CONSTRAINT, trigger toggles and concurrent detach are deliberately out.
fn is_access_exclusive_statement(summary: &StatementSummary) -> bool {
    match summary {
        StatementSummary::AlterTable { actions, .. } => actions.iter().any(|action| {
            matches!(
                action,
                AlterTableAction::DropColumn { .. }
                    | AlterTableAction::AlterColumnType { .. }
                    | AlterTableAction::SetNotNull { .. }
                    | AlterTableAction::AddConstraint {
                        skip_validation: false,
                        ..
                    }
                    | AlterTableAction::DropConstraint { .. }
                    | AlterTableAction::AttachPartition { .. }
                    | AlterTableAction::DetachPartition {
                        concurrent: false,
                        ..
                    }
            )
        }),
        StatementSummary::Drop { kind, .. } => matches!(
            kind,
            DropKind::Table | DropKind::Index | DropKind::Trigger
        ),
        StatementSummary::Truncate { .. } => true,
        StatementSummary::Rename { .. } => true,
        StatementSummary::CreateTrigger { .. } => true,
        StatementSummary::Reindex {
            concurrent: false, ..
        } => true,
        StatementSummary::RefreshMatView {
            concurrent: false, ..
        } => true,
        _ => false,
    }
}

/// The table locks a statement acquires, for the transaction lock map.
/// Only the statements with a known target table record anything.
fn acquired_locks(summary: &StatementSummary) -> Vec<(String, LockMode)> {
    match summary {
        StatementSummary::AlterTable { name, actions, .. } => {
            let mode = actions
                .iter()
                .filter_map(|action| match action {
                    AlterTableAction::AddColumn { .. }
                    | AlterTableAction::DropColumn { .. }
                    | AlterTableAction::AlterColumnType { .. }
                    | AlterTableAction::SetNotNull { .. }
                    | AlterTableAction::DropConstraint { .. }
                    | AlterTableAction::AttachPartition { .. } => Some(LockMode::AccessExclusive),
                    AlterTableAction::AddConstraint {
                        skip_validation, ..
                    } => Some(if *skip_validation {
                        LockMode::ShareRowExclusive
                    } else {
                        LockMode::AccessExclusive
                    }),
                    AlterTableAction::DetachPartition { concurrent, .. } => Some(if *concurrent {
                        LockMode::ShareUpdateExclusive
                    } else {
                        LockMode::AccessExclusive
                    }),
                    AlterTableAction::ValidateConstraint { .. } => {
                        Some(LockMode::ShareUpdateExclusive)
                    }
                    AlterTableAction::EnableTrigger { .. }
                    | AlterTableAction::DisableTrigger { .. } => {
                        Some(LockMode::ShareRowExclusive)
                    }
                    AlterTableAction::Unrecognized => None,
                })
                .max();
            mode.map(|mode| vec![(name.to_lowercase(), mode)])
                .unwrap_or_default()
        }
        StatementSummary::CreateIndex {
            table,
            concurrently,
            ..
        } => {
            let mode = if *concurrently {
                LockMode::ShareUpdateExclusive
            } else {
                LockMode::Share
            };
            vec![(table.to_lowercase(), mode)]
        }
        StatementSummary::Drop {
            kind: DropKind::Table,
            names,
            ..
        } => names
            .iter()
            .map(|n| (n.to_lowercase(), LockMode::AccessExclusive))
            .collect(),
        StatementSummary::Drop {
            kind: DropKind::Trigger,
            table: Some(table),
            ..
        } => vec![(table.to_lowercase(), LockMode::AccessExclusive)],
        StatementSummary::Truncate { tables, .. } => tables
            .iter()
            .map(|t| (t.to_lowercase(), LockMode::AccessExclusive))
            .collect(),
        StatementSummary::Rename { table, .. } if !table.is_empty() => {
            vec![(table.to_lowercase(), LockMode::AccessExclusive)]
        }
        StatementSummary::VacuumFull { table: Some(table) } => {
            vec![(table.to_lowercase(), LockMode::AccessExclusive)]
        }
        StatementSummary::Reindex {
            target, concurrent, ..
        } if !target.is_empty() => {
            let mode = if *concurrent {
                LockMode::ShareUpdateExclusive
            } else {
                LockMode::AccessExclusive
            };
            vec![(target.to_lowercase(), mode)]
        }
        StatementSummary::RefreshMatView {
            name, concurrent, ..
        } => {
            let mode = if *concurrent {
                LockMode::ShareUpdateExclusive
            } else {
                LockMode::AccessExclusive
            };
            vec![(name.to_lowercase(), mode)]
        }
        StatementSummary::CreateTrigger { table, .. } => {
            vec![(table.to_lowercase(), LockMode::AccessExclusive)]
        }
        StatementSummary::Delete { table, .. } | StatementSummary::Update { table, .. } => {
            vec![(table.to_lowercase(), LockMode::RowExclusive)]
        }
        _ => vec![],
    }
}

/// Walk one file's statement list and emit migration-wide violations.
///
/// `auto_commit` comes from the extractor: when true, the host migration
/// framework has disabled its wrapping transaction, so locks do not
/// accumulate across statements outside explicit BEGIN/COMMIT.
pub fn check_file(
    statements: &[ParsedStatement],
    config: &AnalyzerConfig,
    auto_commit: bool,
) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    let mut tx = TransactionState::new();
    let mut lock_timeout_ix: Option<usize> = None;
    let mut statement_timeout_ix: Option<usize> = None;
    let mut application_name_set = false;
    let mut idle_timeout_set = false;
    let mut first_dangerous: Option<(usize, String)> = None;
    // Preview of the first ACCESS EXCLUSIVE statement in the current
    // transaction scope, for the compounding warning.
    let mut first_ae_in_scope: Option<String> = None;
    let mut not_valid_constraints: HashSet<(String, String)> = HashSet::new();

    for (ix, statement) in statements.iter().enumerate() {
        tx.statement_seen();
        let stmt_preview = preview(&statement.sql, config.preview_width);
        match &statement.summary {
            StatementSummary::SetVariable {
                name,
                value,
                is_set_value: true,
            } => {
                match name.as_str() {
                    "lock_timeout" => {
                        lock_timeout_ix.get_or_insert(ix);
                        if let Some(value) = value {
                            if let Ok(timeout) = parse_timeout(value) {
                                if timeout.exceeds(config.max_lock_timeout_ms) {
                                    violations.push(violation(
                                        LOCK_TIMEOUT_TOO_LONG,
                                        Severity::Warning,
                                        format!(
                                            "lock_timeout set laxer than the {} ms ceiling: `{}`",
                                            config.max_lock_timeout_ms, stmt_preview
                                        ),
                                        "Use a short lock_timeout (e.g. '2s') and retry the \
                                         migration on timeout",
                                    ));
                                }
                            }
                        }
                    }
                    "statement_timeout" => {
                        statement_timeout_ix.get_or_insert(ix);
                        if let Some(value) = value {
                            if let Ok(timeout) = parse_timeout(value) {
                                if timeout.exceeds(config.max_statement_timeout_ms) {
                                    violations.push(violation(
                                        STATEMENT_TIMEOUT_TOO_LONG,
                                        Severity::Warning,
                                        format!(
                                            "statement_timeout set laxer than the {} ms \
                                             ceiling: `{}`",
                                            config.max_statement_timeout_ms, stmt_preview
                                        ),
                                        "Bound migration statements so a runaway backfill \
                                         cannot hold locks for hours",
                                    ));
                                }
                            }
                        }
                    }
                    "application_name" => application_name_set = true,
                    "idle_in_transaction_session_timeout" => idle_timeout_set = true,
                    _ => {}
                }
                continue;
            }
            StatementSummary::Transaction(op) => {
                match op {
                    TxOp::Begin => tx.begin(),
                    TxOp::Commit => tx.commit(),
                    TxOp::Rollback => tx.rollback(),
                    TxOp::Savepoint(name) => tx.savepoint(name),
                    TxOp::Release(name) => tx.release(name),
                    TxOp::RollbackTo(name) => tx.rollback_to(name),
                }
                if !tx.active() {
                    first_ae_in_scope = None;
                    not_valid_constraints.clear();
                }
                continue;
            }
            StatementSummary::Update { .. } => {
                violations.push(violation(
                    UPDATE_IN_MIGRATION,
                    Severity::Warning,
                    format!("UPDATE in a migration: `{stmt_preview}`"),
                    "Backfills belong in batched jobs outside schema migrations, where they \
                     can be throttled and resumed",
                ));
            }
            StatementSummary::CreateIndex {
                concurrently: true, ..
            } if tx.active() => {
                violations.push(violation(
                    CONCURRENT_IN_TRANSACTION,
                    Severity::Error,
                    format!(
                        "CREATE INDEX CONCURRENTLY cannot run inside a transaction: \
                         `{stmt_preview}`"
                    ),
                    "Move the statement out of the BEGIN/COMMIT block; most migration \
                     runners have a no-transaction mode for this",
                ));
            }
            _ => {}
        }

        // Track NOT VALID constraints and their validation inside one
        // explicit transaction. With autocommit between the two steps the
        // pattern is exactly right, so nothing is tracked outside.
        if let StatementSummary::AlterTable { name, actions, .. } = &statement.summary {
            let table = name.to_lowercase();
            for action in actions {
                match action {
                    AlterTableAction::AddConstraint {
                        name: constraint,
                        skip_validation: true,
                        ..
                    } if tx.active() => {
                        not_valid_constraints.insert((table.clone(), constraint.to_lowercase()));
                    }
                    AlterTableAction::ValidateConstraint { name: constraint } => {
                        if not_valid_constraints
                            .contains(&(table.clone(), constraint.to_lowercase()))
                        {
                            violations.push(violation(
                                NOT_VALID_VALIDATE_SAME_TX,
                                Severity::Error,
                                format!(
                                    "Constraint `{constraint}` on `{table}` is added NOT VALID \
                                     and validated in the same transaction; the lock is held \
                                     through the validation, defeating the two-step pattern"
                                ),
                                "Commit between ADD CONSTRAINT ... NOT VALID and VALIDATE \
                                 CONSTRAINT",
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }

        let in_scope = tx.active() || !auto_commit;
        let is_ae = is_access_exclusive_statement(&statement.summary);

        if is_ae {
            if first_dangerous.is_none() {
                first_dangerous = Some((ix, stmt_preview.clone()));
            }
            if in_scope && !auto_commit {
                if let Some(first) = &first_ae_in_scope {
                    violations.push(violation(
                        STATEMENT_AFTER_ACCESS_EXCLUSIVE,
                        Severity::Warning,
                        format!(
                            "`{stmt_preview}` runs while the transaction still holds \
                             ACCESS EXCLUSIVE from `{first}`; everything blocked by that \
                             lock now also waits for this statement"
                        ),
                        "Split the transaction so the ACCESS EXCLUSIVE lock is released \
                         before more work runs",
                    ));
                }
            }
        }

        if in_scope {
            for (table, mode) in acquired_locks(&statement.summary) {
                debug!("recording {mode:?} on {table} for `{stmt_preview}`");
                let recorded = tx.record_lock(&table, mode);
                if recorded.wide_lock_window && is_ae {
                    let previous = recorded.previous_table.unwrap_or_default();
                    violations.push(violation(
                        WIDE_LOCK_WINDOW,
                        Severity::Warning,
                        format!(
                            "Transaction holds ACCESS EXCLUSIVE on `{previous}` and `{table}` \
                             at once; a single blocked query on either table now stalls both"
                        ),
                        "Lock one table per transaction; split the migration into separate \
                         files or commit between the statements",
                    ));
                }
            }
            if is_ae && first_ae_in_scope.is_none() {
                first_ae_in_scope = Some(stmt_preview.clone());
            }
        }
    }

    if config.require_lock_timeout && lock_timeout_ix.is_none() {
        violations.push(violation(
            MISSING_LOCK_TIMEOUT,
            Severity::Error,
            "No `SET lock_timeout` before DDL; a single blocked statement can queue every \
             other query behind it indefinitely"
                .to_string(),
            "Add `SET lock_timeout = '2s';` at the top of the migration",
        ));
    }
    if let (Some(lock_ix), Some((dangerous_ix, dangerous_preview))) =
        (lock_timeout_ix, &first_dangerous)
    {
        if lock_ix > 0 && *dangerous_ix < lock_ix {
            violations.push(violation(
                LOCK_TIMEOUT_AFTER_DANGEROUS,
                Severity::Error,
                format!(
                    "lock_timeout is set only after `{dangerous_preview}` already acquired \
                     ACCESS EXCLUSIVE"
                ),
                "Move `SET lock_timeout` above the first lock-taking statement",
            ));
        }
    }
    if config.require_statement_timeout && statement_timeout_ix.is_none() {
        violations.push(violation(
            MISSING_STATEMENT_TIMEOUT,
            Severity::Warning,
            "No `SET statement_timeout`; a slow table scan inside the migration can hold \
             its locks for hours"
                .to_string(),
            "Add `SET statement_timeout = '10min';` at the top of the migration",
        ));
    }
    if !application_name_set {
        violations.push(violation(
            MISSING_APPLICATION_NAME,
            Severity::Warning,
            "No `SET application_name`; blocked-query forensics cannot attribute the \
             migration's locks"
                .to_string(),
            "Add `SET application_name = 'migration:<ticket>';`",
        ));
    }
    if !idle_timeout_set {
        violations.push(violation(
            MISSING_IDLE_TIMEOUT,
            Severity::Warning,
            "No `SET idle_in_transaction_session_timeout`; a stalled migration session \
             keeps its locks while idle"
                .to_string(),
            "Add `SET idle_in_transaction_session_timeout = '1min';`",
        ));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;
    use pretty_assertions::assert_eq;

    fn run(sql: &str) -> Vec<PolicyViolation> {
        run_with(sql, &AnalyzerConfig::default(), false)
    }

    fn run_with(sql: &str, config: &AnalyzerConfig, auto_commit: bool) -> Vec<PolicyViolation> {
        let statements = parse_sql(sql).unwrap();
        check_file(&statements, config, auto_commit)
    }

    fn ids(violations: &[PolicyViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.rule_id.as_str()).collect()
    }

    fn by_id<'a>(violations: &'a [PolicyViolation], id: &str) -> &'a PolicyViolation {
        violations
            .iter()
            .find(|v| v.rule_id == id)
            .unwrap_or_else(|| panic!("no {id} in {:?}", ids(violations)))
    }

    #[test]
    fn missing_timeouts_and_session_settings() {
        let violations = run("ALTER TABLE t ADD COLUMN c int;");
        assert_eq!(by_id(&violations, MISSING_LOCK_TIMEOUT).severity, Severity::Error);
        assert_eq!(
            by_id(&violations, MISSING_STATEMENT_TIMEOUT).severity,
            Severity::Warning
        );
        assert!(violations.iter().any(|v| v.rule_id == MISSING_APPLICATION_NAME));
        assert!(violations.iter().any(|v| v.rule_id == MISSING_IDLE_TIMEOUT));
    }

    #[test]
    fn timeouts_present_and_reasonable() {
        let violations = run(
            "SET lock_timeout = '2s';\n\
             SET statement_timeout = '5min';\n\
             SET application_name = 'migration:123';\n\
             SET idle_in_transaction_session_timeout = '1min';\n\
             ALTER TABLE t ADD COLUMN c int;",
        );
        assert_eq!(violations, vec![]);
    }

    #[test]
    fn lock_timeout_too_long() {
        let violations = run("SET lock_timeout = '1h'; SELECT 1;");
        let found = by_id(&violations, LOCK_TIMEOUT_TOO_LONG);
        assert_eq!(found.severity, Severity::Warning);
    }

    #[test]
    fn lock_timeout_zero_is_unlimited_and_too_long() {
        let violations = run("SET lock_timeout = 0; SELECT 1;");
        assert!(violations.iter().any(|v| v.rule_id == LOCK_TIMEOUT_TOO_LONG));
    }

    #[test]
    fn statement_timeout_too_long() {
        let violations = run("SET statement_timeout = '2h'; SELECT 1;");
        assert!(violations
            .iter()
            .any(|v| v.rule_id == STATEMENT_TIMEOUT_TOO_LONG));
    }

    #[test]
    fn lock_timeout_after_dangerous_statement() {
        let violations = run("DROP TABLE old; SET lock_timeout = '2s';");
        assert_eq!(
            by_id(&violations, LOCK_TIMEOUT_AFTER_DANGEROUS).severity,
            Severity::Error
        );
        // Setting it first is fine.
        let ok = run("SET lock_timeout = '2s'; DROP TABLE old;");
        assert!(!ok.iter().any(|v| v.rule_id == LOCK_TIMEOUT_AFTER_DANGEROUS));
    }

    #[test]
    fn not_valid_validate_same_transaction() {
        let violations = run(
            "BEGIN;\n\
             ALTER TABLE t ADD CONSTRAINT c CHECK (x > 0) NOT VALID;\n\
             ALTER TABLE t VALIDATE CONSTRAINT c;\n\
             COMMIT;",
        );
        let found = by_id(&violations, NOT_VALID_VALIDATE_SAME_TX);
        assert_eq!(found.severity, Severity::Error);
    }

    #[test]
    fn not_valid_validate_across_transactions_is_fine() {
        let violations = run(
            "BEGIN;\n\
             ALTER TABLE t ADD CONSTRAINT c CHECK (x > 0) NOT VALID;\n\
             COMMIT;\n\
             BEGIN;\n\
             ALTER TABLE t VALIDATE CONSTRAINT c;\n\
             COMMIT;",
        );
        assert!(!violations.iter().any(|v| v.rule_id == NOT_VALID_VALIDATE_SAME_TX));
    }

    #[test]
    fn not_valid_validate_outside_transaction_is_fine() {
        let violations = run(
            "ALTER TABLE t ADD CONSTRAINT c CHECK (x > 0) NOT VALID;\n\
             ALTER TABLE t VALIDATE CONSTRAINT c;",
        );
        assert!(!violations.iter().any(|v| v.rule_id == NOT_VALID_VALIDATE_SAME_TX));
    }

    #[test]
    fn concurrent_index_inside_transaction() {
        let violations = run("BEGIN; CREATE INDEX CONCURRENTLY idx ON t (c); COMMIT;");
        assert_eq!(
            by_id(&violations, CONCURRENT_IN_TRANSACTION).severity,
            Severity::Error
        );
        let ok = run("CREATE INDEX CONCURRENTLY idx ON t (c);");
        assert!(!ok.iter().any(|v| v.rule_id == CONCURRENT_IN_TRANSACTION));
    }

    #[test]
    fn update_in_migration_warns() {
        let violations = run("UPDATE users SET active = true WHERE id = 1;");
        assert_eq!(
            by_id(&violations, UPDATE_IN_MIGRATION).severity,
            Severity::Warning
        );
    }

    #[test]
    fn wide_lock_window_across_two_tables() {
        let violations = run(
            "SET lock_timeout = '2s';\n\
             BEGIN;\n\
             ALTER TABLE users ALTER COLUMN email TYPE text;\n\
             ALTER TABLE orders ALTER COLUMN status TYPE text;\n\
             COMMIT;",
        );
        let found = by_id(&violations, WIDE_LOCK_WINDOW);
        assert_eq!(found.severity, Severity::Warning);
        assert!(found.message.contains("users") && found.message.contains("orders"));
    }

    #[test]
    fn no_wide_lock_window_for_same_table() {
        let violations = run(
            "BEGIN;\n\
             ALTER TABLE users ALTER COLUMN email TYPE text;\n\
             ALTER TABLE users ALTER COLUMN name TYPE text;\n\
             COMMIT;",
        );
        assert!(!violations.iter().any(|v| v.rule_id == WIDE_LOCK_WINDOW));
    }

    #[test]
    fn no_wide_lock_window_across_transactions() {
        let violations = run(
            "BEGIN; ALTER TABLE users ALTER COLUMN email TYPE text; COMMIT;\n\
             BEGIN; ALTER TABLE orders ALTER COLUMN status TYPE text; COMMIT;",
        );
        assert!(!violations.iter().any(|v| v.rule_id == WIDE_LOCK_WINDOW));
    }

    #[test]
    fn compounding_warning_in_explicit_transaction() {
        let violations = run(
            "BEGIN;\n\
             DROP TABLE a;\n\
             DROP TABLE b;\n\
             COMMIT;",
        );
        assert!(violations
            .iter()
            .any(|v| v.rule_id == STATEMENT_AFTER_ACCESS_EXCLUSIVE));
    }

    #[test]
    fn compounding_warning_in_implicit_runner_transaction() {
        // No explicit BEGIN, but the runner wraps the file (auto_commit false).
        let violations = run("DROP TABLE a;\nDROP TABLE b;");
        assert!(violations
            .iter()
            .any(|v| v.rule_id == STATEMENT_AFTER_ACCESS_EXCLUSIVE));
    }

    #[test]
    fn autocommit_suppresses_compounding() {
        let violations = run_with(
            "DROP TABLE a;\nDROP TABLE b;",
            &AnalyzerConfig::default(),
            true,
        );
        assert!(!violations
            .iter()
            .any(|v| v.rule_id == STATEMENT_AFTER_ACCESS_EXCLUSIVE));
        assert!(!violations.iter().any(|v| v.rule_id == WIDE_LOCK_WINDOW));
    }

    #[test]
    fn rollback_to_savepoint_narrows_the_window() {
        let violations = run(
            "BEGIN;\n\
             SAVEPOINT sp;\n\
             ALTER TABLE users ALTER COLUMN email TYPE text;\n\
             ROLLBACK TO SAVEPOINT sp;\n\
             ALTER TABLE orders ALTER COLUMN status TYPE text;\n\
             COMMIT;",
        );
        // users lock was rolled back, so no two-table window exists.
        assert!(!violations.iter().any(|v| v.rule_id == WIDE_LOCK_WINDOW));
    }

    #[test]
    fn disabled_requirements_are_not_reported() {
        let config = AnalyzerConfig {
            require_lock_timeout: false,
            require_statement_timeout: false,
            ..Default::default()
        };
        let violations = run_with("SELECT 1;", &config, false);
        assert!(!violations.iter().any(|v| v.rule_id == MISSING_LOCK_TIMEOUT));
        assert!(!violations
            .iter()
            .any(|v| v.rule_id == MISSING_STATEMENT_TIMEOUT));
    }

    #[test]
    fn only_set_value_kind_counts_for_timeouts() {
        // RESET is a VariableSetStmt, but not VAR_SET_VALUE.
        let violations = run("RESET lock_timeout; SELECT 1;");
        assert!(violations.iter().any(|v| v.rule_id == MISSING_LOCK_TIMEOUT));
    }
}
