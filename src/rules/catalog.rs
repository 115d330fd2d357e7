use itertools::Itertools;
use pg_query::protobuf::ConstrType;

use crate::pg_types::lock_modes::LockMode;
use crate::pg_types::risk::RiskLevel;
use crate::rule_data;
use crate::rules::ast::{
    AlterTableAction, ColDefSummary, DefaultExpr, DropKind, RenameKind, StatementSummary,
};
use crate::rules::{Findings, Rule, SafeRewrite};

fn display_name(schema: &str, name: &str) -> String {
    if schema.is_empty() {
        name.to_string()
    } else {
        format!("{schema}.{name}")
    }
}

fn fold(name: &str) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

fn rewrite<S: Into<String>>(description: S, steps: Vec<String>) -> Option<SafeRewrite> {
    Some(SafeRewrite {
        description: description.into(),
        steps,
    })
}

/// Walk a statement's column definitions: ADD COLUMN actions and, for the
/// type-preference rules, CREATE TABLE column lists.
fn each_added_column<'a>(
    summary: &'a StatementSummary,
) -> Box<dyn Iterator<Item = (&'a str, &'a str, &'a ColDefSummary)> + 'a> {
    match summary {
        StatementSummary::AlterTable {
            schema,
            name,
            actions,
        } => Box::new(actions.iter().filter_map(move |action| match action {
            AlterTableAction::AddColumn { column } => Some((schema.as_str(), name.as_str(), column)),
            _ => None,
        })),
        _ => Box::new(std::iter::empty()),
    }
}

fn each_column_definition<'a>(
    summary: &'a StatementSummary,
) -> Box<dyn Iterator<Item = (&'a str, &'a str, &'a ColDefSummary)> + 'a> {
    match summary {
        StatementSummary::CreateTable {
            schema,
            name,
            columns,
            ..
        } => Box::new(
            columns
                .iter()
                .map(move |column| (schema.as_str(), name.as_str(), column)),
        ),
        _ => each_added_column(summary),
    }
}

// --- ADD COLUMN family ---------------------------------------------------

fn not_null_backfill_steps(table: &str, column: &str, type_name: &str) -> Vec<String> {
    let check = format!("{}_{column}_not_null", table.replace('.', "_"));
    vec![
        format!("ALTER TABLE {table} ADD COLUMN {column} {type_name};"),
        format!(
            "UPDATE {table} SET {column} = /* backfill value */ WHERE {column} IS NULL; \
             -- run in batches"
        ),
        format!("ALTER TABLE {table} ADD CONSTRAINT {check} CHECK ({column} IS NOT NULL) NOT VALID;"),
        format!("ALTER TABLE {table} VALIDATE CONSTRAINT {check};"),
        format!("ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;"),
        format!("ALTER TABLE {table} DROP CONSTRAINT {check};"),
    ]
}

fn add_column_not_null_no_default(findings: &mut Findings) {
    for (schema, name, column) in each_added_column(&findings.statement().summary.clone()) {
        if column.not_null && column.default.is_none() && !column.stored_generated {
            let table = display_name(schema, name);
            let message = format!(
                "Adding NOT NULL column `{}` to `{table}` without a DEFAULT forces every \
                 existing row to violate the constraint; the statement fails on any non-empty \
                 table, and retrying under ACCESS EXCLUSIVE blocks all access",
                column.name
            );
            let steps = not_null_backfill_steps(&table, &column.name, &column.type_name);
            findings.push(
                &rule_data::ADD_COLUMN_NOT_NULL_NO_DEFAULT,
                fold(name),
                Some(LockMode::AccessExclusive),
                RiskLevel::High,
                message,
                rewrite(
                    "Add the column nullable, backfill in batches, then promote to NOT NULL \
                     via a validated CHECK constraint",
                    steps,
                ),
            );
        }
    }
}

pub const ADD_COLUMN_NOT_NULL_NO_DEFAULT: Rule = Rule {
    meta: &rule_data::ADD_COLUMN_NOT_NULL_NO_DEFAULT,
    check: add_column_not_null_no_default,
};

fn add_column_with_default(findings: &mut Findings) {
    let min_pg = findings.config().min_pg_version;
    for (schema, name, column) in each_added_column(&findings.statement().summary.clone()) {
        let table = display_name(schema, name);
        match column.default {
            Some(DefaultExpr::Constant) if min_pg >= 11 => {
                findings.push(
                    &rule_data::ADD_COLUMN_CONSTANT_DEFAULT,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "Adding column `{}` with a constant DEFAULT to `{table}` is instant on \
                         PostgreSQL 11+: the default is stored in the catalog, no rewrite happens",
                        column.name
                    ),
                    None,
                );
            }
            Some(DefaultExpr::Constant) => {
                findings.push(
                    &rule_data::ADD_COLUMN_DEFAULT_PRE_PG11,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Adding column `{}` with a DEFAULT to `{table}` rewrites the whole table \
                         under ACCESS EXCLUSIVE on PostgreSQL older than 11",
                        column.name
                    ),
                    rewrite(
                        "Add the column without a default, set the default for new rows, \
                         backfill existing rows in batches",
                        vec![
                            format!(
                                "ALTER TABLE {table} ADD COLUMN {} {};",
                                column.name, column.type_name
                            ),
                            format!(
                                "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT /* value */;",
                                column.name
                            ),
                            format!(
                                "UPDATE {table} SET {} = /* value */ WHERE {} IS NULL; \
                                 -- run in batches",
                                column.name, column.name
                            ),
                        ],
                    ),
                );
            }
            Some(DefaultExpr::NonConstant) => {
                findings.push(
                    &rule_data::ADD_COLUMN_NON_CONSTANT_DEFAULT,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Adding column `{}` with a volatile DEFAULT to `{table}` rewrites the \
                         whole table under ACCESS EXCLUSIVE; only constant defaults are instant",
                        column.name
                    ),
                    rewrite(
                        "Add the column with no default, then set the default and backfill \
                         existing rows in batches",
                        vec![
                            format!(
                                "ALTER TABLE {table} ADD COLUMN {} {};",
                                column.name, column.type_name
                            ),
                            format!(
                                "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT /* expression */;",
                                column.name
                            ),
                            format!(
                                "UPDATE {table} SET {} = /* expression */ WHERE {} IS NULL; \
                                 -- run in batches",
                                column.name, column.name
                            ),
                        ],
                    ),
                );
            }
            None => {}
        }
    }
}

pub const ADD_COLUMN_WITH_DEFAULT: Rule = Rule {
    meta: &rule_data::ADD_COLUMN_CONSTANT_DEFAULT,
    check: add_column_with_default,
};

fn add_column_json(findings: &mut Findings) {
    for (schema, name, column) in each_added_column(&findings.statement().summary.clone()) {
        if column.type_name == "json" {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::ADD_COLUMN_JSON,
                fold(name),
                Some(LockMode::AccessExclusive),
                RiskLevel::Low,
                format!(
                    "Column `{}` on `{table}` uses `json`, which has no equality operator; \
                     `jsonb` supports the same use-cases and is more compact",
                    column.name
                ),
                None,
            );
        }
    }
}

pub const ADD_COLUMN_JSON: Rule = Rule {
    meta: &rule_data::ADD_COLUMN_JSON,
    check: add_column_json,
};

fn add_column_serial(findings: &mut Findings) {
    for (schema, name, column) in each_added_column(&findings.statement().summary.clone()) {
        if column.is_serial() {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::ADD_COLUMN_SERIAL,
                fold(name),
                Some(LockMode::AccessExclusive),
                RiskLevel::Medium,
                format!(
                    "Adding `{}` column `{}` to `{table}` backfills sequence values for every \
                     existing row under ACCESS EXCLUSIVE",
                    column.type_name, column.name
                ),
                None,
            );
        }
    }
}

pub const ADD_COLUMN_SERIAL: Rule = Rule {
    meta: &rule_data::ADD_COLUMN_SERIAL,
    check: add_column_serial,
};

fn add_column_stored_generated(findings: &mut Findings) {
    for (schema, name, column) in each_added_column(&findings.statement().summary.clone()) {
        if column.stored_generated {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::ADD_COLUMN_STORED_GENERATED,
                fold(name),
                Some(LockMode::AccessExclusive),
                RiskLevel::High,
                format!(
                    "Adding stored generated column `{}` to `{table}` computes the expression \
                     for every existing row, rewriting the table under ACCESS EXCLUSIVE",
                    column.name
                ),
                rewrite(
                    "Backfill a plain column instead and keep it current with application code \
                     or a trigger, or accept the rewrite in a maintenance window",
                    vec![
                        format!(
                            "ALTER TABLE {table} ADD COLUMN {} {};",
                            column.name, column.type_name
                        ),
                        format!(
                            "UPDATE {table} SET {} = /* expression */; -- run in batches",
                            column.name
                        ),
                        "-- keep the column current from application code or a trigger"
                            .to_string(),
                    ],
                ),
            );
        }
    }
}

pub const ADD_COLUMN_STORED_GENERATED: Rule = Rule {
    meta: &rule_data::ADD_COLUMN_STORED_GENERATED,
    check: add_column_stored_generated,
};

// --- Index creation and removal ------------------------------------------

fn create_index_not_concurrent(findings: &mut Findings) {
    if let StatementSummary::CreateIndex {
        schema,
        idxname,
        table,
        concurrently: false,
        ..
    } = &findings.statement().summary.clone()
    {
        let display = display_name(schema, table);
        findings.push(
            &rule_data::CREATE_INDEX_NOT_CONCURRENT,
            fold(table),
            Some(LockMode::Share),
            RiskLevel::Medium,
            format!(
                "Creating index `{idxname}` on `{display}` without CONCURRENTLY blocks writes \
                 for the whole build"
            ),
            rewrite(
                "Build the index concurrently; it takes longer but only blocks other DDL",
                vec![format!(
                    "CREATE INDEX CONCURRENTLY {idxname} ON {display} (...);"
                )],
            ),
        );
    }
}

pub const CREATE_INDEX_NOT_CONCURRENT: Rule = Rule {
    meta: &rule_data::CREATE_INDEX_NOT_CONCURRENT,
    check: create_index_not_concurrent,
};

fn drop_index_not_concurrent(findings: &mut Findings) {
    if let StatementSummary::Drop {
        kind: DropKind::Index,
        names,
        concurrent: false,
        ..
    } = &findings.statement().summary.clone()
    {
        for index in names {
            findings.push(
                &rule_data::DROP_INDEX_NOT_CONCURRENT,
                None,
                Some(LockMode::AccessExclusive),
                RiskLevel::Medium,
                format!(
                    "Dropping index `{index}` without CONCURRENTLY takes ACCESS EXCLUSIVE on \
                     its table for the duration"
                ),
                rewrite(
                    "Drop the index concurrently",
                    vec![format!("DROP INDEX CONCURRENTLY {index};")],
                ),
            );
        }
    }
}

pub const DROP_INDEX_NOT_CONCURRENT: Rule = Rule {
    meta: &rule_data::DROP_INDEX_NOT_CONCURRENT,
    check: drop_index_not_concurrent,
};

// --- Column alterations --------------------------------------------------

fn alter_column_type(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            if let AlterTableAction::AlterColumnType {
                column,
                type_name,
                type_mods,
            } = action
            {
                let widened = findings
                    .config()
                    .snapshot
                    .as_ref()
                    .and_then(|snap| snap.column(name, column))
                    .map(|existing| existing.udt_name.eq_ignore_ascii_case("varchar"))
                    .unwrap_or(false);
                let (risk, message, safe_rewrite) = match (type_name.as_str(), *type_mods) {
                    ("text", 0) | ("varchar", 0) => {
                        let mut message = format!(
                            "Changing `{column}` on `{table}` to `{type_name}` is \
                             binary-compatible when widening from varchar; no rewrite happens, \
                             but ACCESS EXCLUSIVE is still taken briefly"
                        );
                        if widened {
                            message.push_str(
                                " (schema snapshot confirms the column is varchar today)",
                            );
                        }
                        (
                            RiskLevel::Low,
                            message,
                            rewrite(
                                "Verify the change is a pure widening before relying on it \
                                 being metadata-only",
                                vec![
                                    format!(
                                        "-- check the current type: SELECT data_type, \
                                         character_maximum_length FROM information_schema.columns \
                                         WHERE table_name = '{name}' AND column_name = '{column}';"
                                    ),
                                    "-- widening varchar(n) -> text or varchar(m>n) skips the \
                                     table rewrite"
                                        .to_string(),
                                ],
                            ),
                        )
                    }
                    ("varchar", _) | ("numeric", _) if *type_mods > 0 => (
                        RiskLevel::Medium,
                        format!(
                            "Changing `{column}` on `{table}` to a parameterised \
                             `{type_name}` may rewrite the table if the new limit is narrower; \
                             narrowing also re-validates every row under ACCESS EXCLUSIVE"
                        ),
                        rewrite(
                            "Verify the new modifier only widens the column",
                            vec![
                                format!(
                                    "-- check the current length: SELECT character_maximum_length \
                                     FROM information_schema.columns WHERE table_name = '{name}' \
                                     AND column_name = '{column}';"
                                ),
                                "-- a larger limit is metadata-only; a smaller one rewrites"
                                    .to_string(),
                            ],
                        ),
                    ),
                    _ => (
                        RiskLevel::High,
                        format!(
                            "Changing `{column}` on `{table}` to `{type_name}` requires a full \
                             table rewrite under ACCESS EXCLUSIVE unless the types are \
                             binary-compatible"
                        ),
                        rewrite(
                            "Expand/contract: add a new column, backfill, swap",
                            vec![
                                format!("ALTER TABLE {table} ADD COLUMN {column}_new {type_name};"),
                                format!(
                                    "UPDATE {table} SET {column}_new = {column}::{type_name}; \
                                     -- run in batches"
                                ),
                                "-- switch application reads/writes to the new column".to_string(),
                                format!("ALTER TABLE {table} DROP COLUMN {column};"),
                                format!(
                                    "ALTER TABLE {table} RENAME COLUMN {column}_new TO {column};"
                                ),
                            ],
                        ),
                    ),
                };
                findings.push(
                    &rule_data::ALTER_COLUMN_TYPE,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    risk,
                    message,
                    safe_rewrite,
                );
            }
        }
    }
}

pub const ALTER_COLUMN_TYPE: Rule = Rule {
    meta: &rule_data::ALTER_COLUMN_TYPE,
    check: alter_column_type,
};

fn alter_column_set_not_null(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            if let AlterTableAction::SetNotNull { column } = action {
                findings.push(
                    &rule_data::ALTER_COLUMN_SET_NOT_NULL,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "SET NOT NULL on `{table}.{column}` scans the whole table under \
                         ACCESS EXCLUSIVE unless a validated CHECK constraint already proves it"
                    ),
                    rewrite(
                        "Prove the invariant with a NOT VALID check first, then SET NOT NULL \
                         is a catalog-only change",
                        vec![
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {name}_{column}_not_null \
                                 CHECK ({column} IS NOT NULL) NOT VALID;"
                            ),
                            format!(
                                "ALTER TABLE {table} VALIDATE CONSTRAINT {name}_{column}_not_null;"
                            ),
                            format!("ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;"),
                            format!(
                                "ALTER TABLE {table} DROP CONSTRAINT {name}_{column}_not_null;"
                            ),
                        ],
                    ),
                );
            }
        }
    }
}

pub const ALTER_COLUMN_SET_NOT_NULL: Rule = Rule {
    meta: &rule_data::ALTER_COLUMN_SET_NOT_NULL,
    check: alter_column_set_not_null,
};

// --- Constraints ---------------------------------------------------------

fn add_constraints(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            let AlterTableAction::AddConstraint {
                name: constraint,
                constraint_type,
                use_index,
                skip_validation,
            } = action
            else {
                continue;
            };
            let label = if constraint.is_empty() {
                "the constraint".to_string()
            } else {
                format!("`{constraint}`")
            };
            match constraint_type {
                ConstrType::ConstrForeign if !skip_validation => findings.push(
                    &rule_data::ADD_CONSTRAINT_FK_NO_NOT_VALID,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Adding foreign key {label} on `{table}` without NOT VALID checks every \
                         row while holding locks on both tables"
                    ),
                    rewrite(
                        "Add the constraint NOT VALID, then validate in a separate transaction",
                        vec![
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {constraint} FOREIGN KEY \
                                 (...) REFERENCES ... NOT VALID;"
                            ),
                            format!("ALTER TABLE {table} VALIDATE CONSTRAINT {constraint};"),
                        ],
                    ),
                ),
                ConstrType::ConstrCheck if !skip_validation => findings.push(
                    &rule_data::ADD_CONSTRAINT_CHECK_NO_NOT_VALID,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Medium,
                    format!(
                        "Adding check constraint {label} on `{table}` without NOT VALID scans \
                         every row under ACCESS EXCLUSIVE"
                    ),
                    rewrite(
                        "Add the constraint NOT VALID, then validate in a separate transaction",
                        vec![
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {constraint} CHECK (...) \
                                 NOT VALID;"
                            ),
                            format!("ALTER TABLE {table} VALIDATE CONSTRAINT {constraint};"),
                        ],
                    ),
                ),
                ConstrType::ConstrUnique if *use_index => findings.push(
                    &rule_data::ADD_CONSTRAINT_UNIQUE_USING_INDEX,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "Unique constraint {label} on `{table}` promotes an existing index; \
                         only a brief ACCESS EXCLUSIVE is taken"
                    ),
                    None,
                ),
                ConstrType::ConstrUnique => findings.push(
                    &rule_data::ADD_CONSTRAINT_UNIQUE,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Unique constraint {label} on `{table}` builds its index under \
                         ACCESS EXCLUSIVE, blocking reads and writes for the whole build"
                    ),
                    rewrite(
                        "Build a unique index concurrently, then attach it as the constraint",
                        vec![
                            format!(
                                "CREATE UNIQUE INDEX CONCURRENTLY {constraint}_idx ON {table} \
                                 (...);"
                            ),
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {constraint} UNIQUE USING \
                                 INDEX {constraint}_idx;"
                            ),
                        ],
                    ),
                ),
                ConstrType::ConstrPrimary if *use_index => findings.push(
                    &rule_data::ADD_PK_USING_INDEX,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::Low,
                    format!(
                        "Primary key {label} on `{table}` promotes an existing unique index; \
                         verify the key columns are already NOT NULL or postgres will scan to \
                         prove it"
                    ),
                    None,
                ),
                ConstrType::ConstrPrimary => findings.push(
                    &rule_data::ADD_PK_WITHOUT_USING_INDEX,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Primary key {label} on `{table}` builds its unique index under \
                         ACCESS EXCLUSIVE, blocking reads and writes for the whole build"
                    ),
                    rewrite(
                        "Build the unique index concurrently, then attach it as the primary key",
                        vec![
                            format!(
                                "CREATE UNIQUE INDEX CONCURRENTLY {constraint}_idx ON {table} \
                                 (...);"
                            ),
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {constraint} PRIMARY KEY \
                                 USING INDEX {constraint}_idx;"
                            ),
                        ],
                    ),
                ),
                ConstrType::ConstrExclusion => findings.push(
                    &rule_data::ADD_CONSTRAINT_EXCLUDE,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Exclusion constraint {label} on `{table}` builds its index under \
                         ACCESS EXCLUSIVE; there is no concurrent variant"
                    ),
                    rewrite(
                        "Exclusion constraints cannot be added concurrently; contain the damage",
                        vec![
                            "SET lock_timeout = '2s'; -- retry the migration on timeout"
                                .to_string(),
                            format!(
                                "ALTER TABLE {table} ADD CONSTRAINT {constraint} EXCLUDE \
                                 USING ... ; -- schedule during a low-traffic window"
                            ),
                        ],
                    ),
                ),
                _ => {}
            }
        }
    }
}

pub const ADD_CONSTRAINTS: Rule = Rule {
    meta: &rule_data::ADD_CONSTRAINT_FK_NO_NOT_VALID,
    check: add_constraints,
};

fn validate_constraint(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            if let AlterTableAction::ValidateConstraint { name: constraint } = action {
                findings.push(
                    &rule_data::VALIDATE_CONSTRAINT,
                    fold(name),
                    Some(LockMode::ShareUpdateExclusive),
                    RiskLevel::Low,
                    format!(
                        "VALIDATE CONSTRAINT `{constraint}` on `{table}` scans the table but \
                         only holds SHARE UPDATE EXCLUSIVE; reads and writes continue"
                    ),
                    None,
                );
            }
        }
    }
}

pub const VALIDATE_CONSTRAINT: Rule = Rule {
    meta: &rule_data::VALIDATE_CONSTRAINT,
    check: validate_constraint,
};

// --- Renames, drops, truncation ------------------------------------------

fn renames(findings: &mut Findings) {
    if let StatementSummary::Rename { kind, table } = &findings.statement().summary.clone() {
        match kind {
            RenameKind::Column => findings.push(
                &rule_data::RENAME_COLUMN,
                fold(table),
                Some(LockMode::AccessExclusive),
                RiskLevel::Low,
                format!(
                    "Renaming a column on `{table}` is catalog-only but breaks queries still \
                     using the old name the instant it commits"
                ),
                None,
            ),
            RenameKind::Table => findings.push(
                &rule_data::RENAME_TABLE,
                fold(table),
                Some(LockMode::AccessExclusive),
                RiskLevel::High,
                format!(
                    "Renaming `{table}` breaks every query still using the old name the \
                     instant it commits"
                ),
                rewrite(
                    "Expand/contract: keep the old name routable until all code is migrated",
                    vec![
                        format!("ALTER TABLE {table} RENAME TO {table}_new;"),
                        format!("CREATE VIEW {table} AS SELECT * FROM {table}_new;"),
                        "-- deploy application code that uses the new name".to_string(),
                        format!("DROP VIEW {table};"),
                    ],
                ),
            ),
            RenameKind::Other => {}
        }
    }
}

pub const RENAMES: Rule = Rule {
    meta: &rule_data::RENAME_TABLE,
    check: renames,
};

fn drop_table(findings: &mut Findings) {
    if let StatementSummary::Drop {
        kind: DropKind::Table,
        names,
        ..
    } = &findings.statement().summary.clone()
    {
        for table in names {
            findings.push(
                &rule_data::DROP_TABLE,
                fold(table),
                Some(LockMode::AccessExclusive),
                RiskLevel::Critical,
                format!("DROP TABLE `{table}` destroys data and cannot be undone by a re-deploy"),
                rewrite(
                    "Detach the table from the application first and keep the data \
                     recoverable until the release has soaked",
                    vec![
                        "-- confirm nothing reads the table: check pg_stat_user_tables.seq_scan \
                         / idx_scan deltas"
                            .to_string(),
                        format!("ALTER TABLE {table} RENAME TO {table}_deprecated;"),
                        "-- wait at least one release cycle".to_string(),
                        format!("DROP TABLE {table}_deprecated;"),
                    ],
                ),
            );
        }
    }
}

pub const DROP_TABLE: Rule = Rule {
    meta: &rule_data::DROP_TABLE,
    check: drop_table,
};

fn drop_column(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            if let AlterTableAction::DropColumn { column } = action {
                findings.push(
                    &rule_data::DROP_COLUMN,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "Dropping `{table}.{column}` breaks any reader still selecting it and \
                         cannot be rolled back without restoring data"
                    ),
                    rewrite(
                        "Contract in two releases: stop using the column first, drop it later",
                        vec![
                            "-- release 1: remove every read and write of the column from \
                             application code"
                                .to_string(),
                            "-- verify: grep the codebase and check pg_stat_statements for \
                             references"
                                .to_string(),
                            format!("ALTER TABLE {table} DROP COLUMN {column}; -- release 2"),
                        ],
                    ),
                );
            }
        }
    }
}

pub const DROP_COLUMN: Rule = Rule {
    meta: &rule_data::DROP_COLUMN,
    check: drop_column,
};

fn truncate(findings: &mut Findings) {
    if let StatementSummary::Truncate { tables, cascade } = &findings.statement().summary.clone() {
        let list = tables.iter().map(|t| format!("`{t}`")).join(", ");
        let first = tables.first().map(|t| t.to_lowercase());
        findings.push(
            &rule_data::TRUNCATE,
            first.clone(),
            Some(LockMode::AccessExclusive),
            RiskLevel::Critical,
            format!("TRUNCATE removes every row from {list} under ACCESS EXCLUSIVE"),
            rewrite(
                "Delete in batches, or swap in an empty table, so data stays recoverable \
                 and locks stay short",
                vec![
                    "DELETE FROM ... WHERE ... LIMIT 10000; -- repeat until empty".to_string(),
                    "-- or: CREATE TABLE ..._new (LIKE ... INCLUDING ALL); swap names; drop old"
                        .to_string(),
                ],
            ),
        );
        if *cascade {
            findings.push(
                &rule_data::TRUNCATE_CASCADE,
                first,
                Some(LockMode::AccessExclusive),
                RiskLevel::Critical,
                format!(
                    "TRUNCATE ... CASCADE also truncates every table with a foreign key onto \
                     {list}, an easy way to silently destroy unrelated data"
                ),
                rewrite(
                    "Truncate the dependent tables explicitly so the blast radius is visible",
                    vec![
                        "-- list dependents: SELECT conrelid::regclass FROM pg_constraint \
                         WHERE confrelid = '...'::regclass;"
                            .to_string(),
                        "TRUNCATE <each dependent table explicitly>;".to_string(),
                    ],
                ),
            );
        }
    }
}

pub const TRUNCATE: Rule = Rule {
    meta: &rule_data::TRUNCATE,
    check: truncate,
};

fn delete_without_where(findings: &mut Findings) {
    if let StatementSummary::Delete {
        table,
        has_where: false,
    } = &findings.statement().summary.clone()
    {
        findings.push(
            &rule_data::DELETE_WITHOUT_WHERE,
            fold(table),
            Some(LockMode::RowExclusive),
            RiskLevel::High,
            format!(
                "DELETE without WHERE removes every row from `{table}` and bloats the table \
                 with dead tuples in one long transaction"
            ),
            rewrite(
                "Delete in bounded batches, or TRUNCATE deliberately if all rows must go",
                vec![
                    format!(
                        "DELETE FROM {table} WHERE ctid IN (SELECT ctid FROM {table} LIMIT \
                         10000); -- repeat until zero rows"
                    ),
                    "VACUUM ANALYZE; -- reclaim dead tuples afterwards".to_string(),
                ],
            ),
        );
    }
}

pub const DELETE_WITHOUT_WHERE: Rule = Rule {
    meta: &rule_data::DELETE_WITHOUT_WHERE,
    check: delete_without_where,
};

fn vacuum_full(findings: &mut Findings) {
    if let StatementSummary::VacuumFull { table } = &findings.statement().summary.clone() {
        let display = table.clone().unwrap_or_else(|| "the database".to_string());
        findings.push(
            &rule_data::VACUUM_FULL,
            table.as_deref().and_then(fold),
            Some(LockMode::AccessExclusive),
            RiskLevel::High,
            format!(
                "VACUUM FULL rewrites `{display}` under ACCESS EXCLUSIVE; plain VACUUM \
                 reclaims space without blocking"
            ),
            rewrite(
                "Use a non-blocking alternative",
                vec![
                    format!("VACUUM ANALYZE {display}; -- reclaims space for reuse, no lock"),
                    "-- or use pg_repack to rebuild the table online".to_string(),
                ],
            ),
        );
    }
}

pub const VACUUM_FULL: Rule = Rule {
    meta: &rule_data::VACUUM_FULL,
    check: vacuum_full,
};

// --- Enum, reindex, matview, trigger, partition --------------------------

fn alter_enum_add_value(findings: &mut Findings) {
    if let StatementSummary::AlterEnum { name } = &findings.statement().summary.clone() {
        let (lock, risk, detail) = if findings.config().min_pg_version >= 12 {
            (
                LockMode::ShareUpdateExclusive,
                RiskLevel::Low,
                "On PostgreSQL 12+ this can run inside a transaction and only briefly locks \
                 the type",
            )
        } else {
            (
                LockMode::AccessExclusive,
                RiskLevel::Medium,
                "Before PostgreSQL 12 ALTER TYPE ... ADD VALUE cannot run inside a \
                 transaction block",
            )
        };
        findings.push(
            &rule_data::ALTER_ENUM_ADD_VALUE,
            None,
            Some(lock),
            risk,
            format!("Adding a value to enum `{name}`. {detail}"),
            None,
        );
    }
}

pub const ALTER_ENUM_ADD_VALUE: Rule = Rule {
    meta: &rule_data::ALTER_ENUM_ADD_VALUE,
    check: alter_enum_add_value,
};

fn reindex_non_concurrent(findings: &mut Findings) {
    if let StatementSummary::Reindex {
        kind,
        target,
        concurrent: false,
    } = &findings.statement().summary.clone()
    {
        let risk = if kind.is_wide() {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };
        let scope = if kind.is_wide() {
            "every index in scope"
        } else {
            "the index"
        };
        findings.push(
            &rule_data::REINDEX_NON_CONCURRENT,
            None,
            Some(LockMode::AccessExclusive),
            risk,
            format!(
                "REINDEX of `{target}` without CONCURRENTLY locks {scope} and its table \
                 against reads and writes for the whole rebuild"
            ),
            rewrite(
                "Rebuild concurrently",
                vec![format!("REINDEX (CONCURRENTLY) ... {target};")],
            ),
        );
    }
}

pub const REINDEX_NON_CONCURRENT: Rule = Rule {
    meta: &rule_data::REINDEX_NON_CONCURRENT,
    check: reindex_non_concurrent,
};

fn refresh_matview(findings: &mut Findings) {
    if let StatementSummary::RefreshMatView {
        name,
        concurrent,
        skip_data,
    } = &findings.statement().summary.clone()
    {
        if *concurrent {
            findings.push(
                &rule_data::REFRESH_MATVIEW_CONCURRENT,
                fold(name),
                Some(LockMode::ShareUpdateExclusive),
                RiskLevel::Low,
                format!(
                    "REFRESH MATERIALIZED VIEW CONCURRENTLY on `{name}` lets readers continue; \
                     it needs a unique index on the view"
                ),
                None,
            );
        } else {
            let risk = if *skip_data {
                RiskLevel::Medium
            } else {
                RiskLevel::High
            };
            findings.push(
                &rule_data::REFRESH_MATVIEW_BLOCKING,
                fold(name),
                Some(LockMode::AccessExclusive),
                risk,
                format!(
                    "REFRESH MATERIALIZED VIEW on `{name}` blocks all readers until the \
                     refresh completes"
                ),
                rewrite(
                    "Refresh concurrently; readers keep the old contents until the swap",
                    vec![
                        format!(
                            "CREATE UNIQUE INDEX CONCURRENTLY {name}_refresh_idx ON {name} \
                             (...); -- once"
                        ),
                        format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {name};"),
                    ],
                ),
            );
        }
    }
}

pub const REFRESH_MATVIEW: Rule = Rule {
    meta: &rule_data::REFRESH_MATVIEW_BLOCKING,
    check: refresh_matview,
};

fn create_trigger(findings: &mut Findings) {
    if let StatementSummary::CreateTrigger { name, table } = &findings.statement().summary.clone() {
        findings.push(
            &rule_data::CREATE_TRIGGER,
            fold(table),
            Some(LockMode::AccessExclusive),
            RiskLevel::Medium,
            format!(
                "Creating trigger `{name}` on `{table}` waits for every in-flight statement \
                 on the table and adds per-row overhead once live"
            ),
            None,
        );
    }
}

pub const CREATE_TRIGGER: Rule = Rule {
    meta: &rule_data::CREATE_TRIGGER,
    check: create_trigger,
};

fn drop_trigger(findings: &mut Findings) {
    if let StatementSummary::Drop {
        kind: DropKind::Trigger,
        names,
        table,
        ..
    } = &findings.statement().summary.clone()
    {
        let on = table.clone().unwrap_or_default();
        for name in names {
            findings.push(
                &rule_data::DROP_TRIGGER,
                table.as_deref().and_then(fold),
                Some(LockMode::AccessExclusive),
                RiskLevel::Medium,
                format!("Dropping trigger `{name}` on `{on}` takes ACCESS EXCLUSIVE on the table"),
                None,
            );
        }
    }
}

pub const DROP_TRIGGER: Rule = Rule {
    meta: &rule_data::DROP_TRIGGER,
    check: drop_trigger,
};

fn enable_disable_trigger(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            let (verb, trigger) = match action {
                AlterTableAction::EnableTrigger { name } => ("Enabling", name),
                AlterTableAction::DisableTrigger { name } => ("Disabling", name),
                _ => continue,
            };
            let label = if trigger.is_empty() {
                "all triggers".to_string()
            } else {
                format!("trigger `{trigger}`")
            };
            findings.push(
                &rule_data::ENABLE_DISABLE_TRIGGER,
                fold(name),
                Some(LockMode::ShareRowExclusive),
                RiskLevel::Low,
                format!(
                    "{verb} {label} on `{table}` takes SHARE ROW EXCLUSIVE, briefly blocking \
                     writes"
                ),
                None,
            );
        }
    }
}

pub const ENABLE_DISABLE_TRIGGER: Rule = Rule {
    meta: &rule_data::ENABLE_DISABLE_TRIGGER,
    check: enable_disable_trigger,
};

fn partitions(findings: &mut Findings) {
    if let StatementSummary::AlterTable {
        schema,
        name,
        actions,
    } = &findings.statement().summary.clone()
    {
        let table = display_name(schema, name);
        for action in actions {
            match action {
                AlterTableAction::AttachPartition { partition } => findings.push(
                    &rule_data::ATTACH_PARTITION,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "ATTACH PARTITION `{partition}` to `{table}` scans the partition for \
                         bound violations under ACCESS EXCLUSIVE on the parent"
                    ),
                    rewrite(
                        "Prove the bound with a check constraint first so the attach skips \
                         the scan",
                        vec![
                            format!(
                                "ALTER TABLE {partition} ADD CONSTRAINT {partition}_bound CHECK \
                                 (/* partition bound */) NOT VALID;"
                            ),
                            format!("ALTER TABLE {partition} VALIDATE CONSTRAINT {partition}_bound;"),
                            format!(
                                "ALTER TABLE {table} ATTACH PARTITION {partition} FOR VALUES ...;"
                            ),
                            format!("ALTER TABLE {partition} DROP CONSTRAINT {partition}_bound;"),
                        ],
                    ),
                ),
                AlterTableAction::DetachPartition {
                    partition,
                    concurrent: false,
                } => findings.push(
                    &rule_data::DETACH_PARTITION,
                    fold(name),
                    Some(LockMode::AccessExclusive),
                    RiskLevel::High,
                    format!(
                        "DETACH PARTITION `{partition}` from `{table}` takes ACCESS EXCLUSIVE \
                         on the parent, blocking all partitions"
                    ),
                    rewrite(
                        "Detach concurrently",
                        vec![format!(
                            "ALTER TABLE {table} DETACH PARTITION {partition} CONCURRENTLY; \
                             -- must run outside a transaction"
                        )],
                    ),
                ),
                AlterTableAction::DetachPartition {
                    partition,
                    concurrent: true,
                } => findings.push(
                    &rule_data::DETACH_PARTITION_CONCURRENT,
                    fold(name),
                    Some(LockMode::ShareUpdateExclusive),
                    RiskLevel::Low,
                    format!(
                        "DETACH PARTITION CONCURRENTLY `{partition}` from `{table}` only takes \
                         SHARE UPDATE EXCLUSIVE; it must run outside a transaction"
                    ),
                    None,
                ),
                _ => {}
            }
        }
    }
}

pub const PARTITIONS: Rule = Rule {
    meta: &rule_data::ATTACH_PARTITION,
    check: partitions,
};

// --- Type and idempotency preferences ------------------------------------

fn prefer_bigint_over_int(findings: &mut Findings) {
    for (schema, name, column) in each_column_definition(&findings.statement().summary.clone()) {
        if matches!(
            column.type_name.as_str(),
            "int4" | "int2" | "integer" | "smallint"
        ) {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::PREFER_BIGINT_OVER_INT,
                fold(name),
                None,
                RiskLevel::Low,
                format!(
                    "Column `{}` on `{table}` is 32-bit or smaller; identifiers and counters \
                     outgrow int and the later widening is a table rewrite",
                    column.name
                ),
                rewrite(
                    "Verify the value range before keeping a narrow integer",
                    vec![
                        "-- keep int only for values provably bounded below 2^31".to_string(),
                        format!(
                            "-- otherwise declare: {} bigint",
                            column.name
                        ),
                    ],
                ),
            );
        }
    }
}

pub const PREFER_BIGINT_OVER_INT: Rule = Rule {
    meta: &rule_data::PREFER_BIGINT_OVER_INT,
    check: prefer_bigint_over_int,
};

fn prefer_text_field(findings: &mut Findings) {
    for (schema, name, column) in each_column_definition(&findings.statement().summary.clone()) {
        if column.type_name == "varchar" && column.type_mods > 0 {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::PREFER_TEXT_FIELD,
                fold(name),
                None,
                RiskLevel::Low,
                format!(
                    "Column `{}` on `{table}` is varchar(n); postgres stores text identically \
                     and raising the limit later is DDL",
                    column.name
                ),
                rewrite(
                    "Verify the length limit is a real business rule before keeping it",
                    vec![
                        "-- enforce lengths with CHECK (char_length(col) <= n) if needed; \
                         widening a CHECK is NOT VALID + VALIDATE, no rewrite"
                            .to_string(),
                    ],
                ),
            );
        }
    }
}

pub const PREFER_TEXT_FIELD: Rule = Rule {
    meta: &rule_data::PREFER_TEXT_FIELD,
    check: prefer_text_field,
};

fn prefer_timestamptz(findings: &mut Findings) {
    for (schema, name, column) in each_column_definition(&findings.statement().summary.clone()) {
        if column.type_name == "timestamp" {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::PREFER_TIMESTAMPTZ,
                fold(name),
                None,
                RiskLevel::Low,
                format!(
                    "Column `{}` on `{table}` is timestamp without time zone; timestamptz \
                     stores an unambiguous instant at the same cost",
                    column.name
                ),
                None,
            );
        }
    }
}

pub const PREFER_TIMESTAMPTZ: Rule = Rule {
    meta: &rule_data::PREFER_TIMESTAMPTZ,
    check: prefer_timestamptz,
};

fn prefer_robust_ddl(findings: &mut Findings) {
    match &findings.statement().summary.clone() {
        StatementSummary::CreateTable {
            schema,
            name,
            if_not_exists: false,
            ..
        } => {
            let table = display_name(schema, name);
            findings.push(
                &rule_data::PREFER_ROBUST_CREATE_TABLE,
                fold(name),
                None,
                RiskLevel::Low,
                format!("CREATE TABLE `{table}` fails on re-run; add IF NOT EXISTS"),
                None,
            );
        }
        StatementSummary::CreateIndex {
            idxname,
            table,
            if_not_exists: false,
            ..
        } => {
            findings.push(
                &rule_data::PREFER_ROBUST_CREATE_INDEX,
                fold(table),
                None,
                RiskLevel::Low,
                format!("CREATE INDEX `{idxname}` fails on re-run; add IF NOT EXISTS"),
                None,
            );
        }
        StatementSummary::Drop {
            kind,
            names,
            if_exists: false,
            ..
        } => {
            let meta = match kind {
                DropKind::Table => &rule_data::PREFER_ROBUST_DROP_TABLE,
                DropKind::Index => &rule_data::PREFER_ROBUST_DROP_INDEX,
                _ => return,
            };
            let target = match kind {
                DropKind::Table => names.first().map(|n| n.to_lowercase()),
                _ => None,
            };
            let list = names.iter().map(|n| format!("`{n}`")).join(", ");
            findings.push(
                meta,
                target,
                None,
                RiskLevel::Low,
                format!("DROP of {list} fails on re-run; add IF EXISTS"),
                None,
            );
        }
        _ => {}
    }
}

pub const PREFER_ROBUST_DDL: Rule = Rule {
    meta: &rule_data::PREFER_ROBUST_CREATE_TABLE,
    check: prefer_robust_ddl,
};

const RULES: &[Rule] = &[
    ADD_COLUMN_NOT_NULL_NO_DEFAULT,
    ADD_COLUMN_WITH_DEFAULT,
    ADD_COLUMN_JSON,
    ADD_COLUMN_SERIAL,
    ADD_COLUMN_STORED_GENERATED,
    CREATE_INDEX_NOT_CONCURRENT,
    DROP_INDEX_NOT_CONCURRENT,
    ALTER_COLUMN_TYPE,
    ALTER_COLUMN_SET_NOT_NULL,
    ADD_CONSTRAINTS,
    VALIDATE_CONSTRAINT,
    RENAMES,
    DROP_TABLE,
    DROP_COLUMN,
    TRUNCATE,
    DELETE_WITHOUT_WHERE,
    VACUUM_FULL,
    ALTER_ENUM_ADD_VALUE,
    REINDEX_NON_CONCURRENT,
    REFRESH_MATVIEW,
    CREATE_TRIGGER,
    DROP_TRIGGER,
    ENABLE_DISABLE_TRIGGER,
    PARTITIONS,
    PREFER_BIGINT_OVER_INT,
    PREFER_TEXT_FIELD,
    PREFER_TIMESTAMPTZ,
    PREFER_ROBUST_DDL,
];

/// Every built-in rule. The analyzer runs all of them on every statement.
pub fn all_rules() -> impl Iterator<Item = &'static Rule> {
    RULES.iter()
}
