/// Static metadata for the built-in rule catalogue. Checks live in
/// `rules::catalog`; this module only identifies and describes them.
pub trait RuleId {
    fn id(&self) -> &str;
}

pub struct StaticRuleData {
    pub id: &'static str,
    pub name: &'static str,
    pub condition: &'static str,
    /// When true, the visibility filter keeps findings even for tables
    /// created earlier in the same batch.
    pub applies_to_new_tables: bool,
}

impl RuleId for StaticRuleData {
    fn id(&self) -> &str {
        self.id
    }
}

pub const ADD_COLUMN_NOT_NULL_NO_DEFAULT: StaticRuleData = StaticRuleData {
    id: "add-column-not-null-no-default",
    name: "Adding a NOT NULL column without a default",
    condition: "ALTER TABLE ... ADD COLUMN with a NOT NULL constraint and no DEFAULT",
    applies_to_new_tables: false,
};
pub const ADD_COLUMN_CONSTANT_DEFAULT: StaticRuleData = StaticRuleData {
    id: "add-column-constant-default",
    name: "Adding a column with a constant default",
    condition: "ALTER TABLE ... ADD COLUMN DEFAULT <literal> on PostgreSQL 11 or newer",
    applies_to_new_tables: false,
};
pub const ADD_COLUMN_NON_CONSTANT_DEFAULT: StaticRuleData = StaticRuleData {
    id: "add-column-non-constant-default",
    name: "Adding a column with a volatile default",
    condition: "ALTER TABLE ... ADD COLUMN DEFAULT <expression that is not a literal>",
    applies_to_new_tables: false,
};
pub const ADD_COLUMN_DEFAULT_PRE_PG11: StaticRuleData = StaticRuleData {
    id: "add-column-default-pre-pg11",
    name: "Adding a column with a default before PostgreSQL 11",
    condition: "ALTER TABLE ... ADD COLUMN DEFAULT on PostgreSQL older than 11",
    applies_to_new_tables: false,
};
pub const ADD_COLUMN_JSON: StaticRuleData = StaticRuleData {
    id: "add-column-json",
    name: "Adding a json column",
    condition: "A column of type json was added; json has no equality operator",
    applies_to_new_tables: true,
};
pub const ADD_COLUMN_SERIAL: StaticRuleData = StaticRuleData {
    id: "add-column-serial",
    name: "Adding a serial column",
    condition: "A column of a serial type was added to an existing table",
    applies_to_new_tables: true,
};
pub const ADD_COLUMN_STORED_GENERATED: StaticRuleData = StaticRuleData {
    id: "add-column-stored-generated",
    name: "Adding a GENERATED ... STORED column",
    condition: "A stored generated column was added, forcing a table rewrite",
    applies_to_new_tables: false,
};
pub const CREATE_INDEX_NOT_CONCURRENT: StaticRuleData = StaticRuleData {
    id: "create-index-not-concurrent",
    name: "Creating an index without CONCURRENTLY",
    condition: "CREATE INDEX without the CONCURRENTLY keyword",
    applies_to_new_tables: false,
};
pub const DROP_INDEX_NOT_CONCURRENT: StaticRuleData = StaticRuleData {
    id: "drop-index-not-concurrent",
    name: "Dropping an index without CONCURRENTLY",
    condition: "DROP INDEX without the CONCURRENTLY keyword",
    applies_to_new_tables: false,
};
pub const ALTER_COLUMN_TYPE: StaticRuleData = StaticRuleData {
    id: "alter-column-type",
    name: "Changing a column's type",
    condition: "ALTER TABLE ... ALTER COLUMN ... TYPE",
    applies_to_new_tables: false,
};
pub const ALTER_COLUMN_SET_NOT_NULL: StaticRuleData = StaticRuleData {
    id: "alter-column-set-not-null",
    name: "Setting a column NOT NULL",
    condition: "ALTER TABLE ... ALTER COLUMN ... SET NOT NULL scans the whole table",
    applies_to_new_tables: false,
};
pub const ADD_CONSTRAINT_FK_NO_NOT_VALID: StaticRuleData = StaticRuleData {
    id: "add-constraint-fk-no-not-valid",
    name: "Adding a foreign key without NOT VALID",
    condition: "ADD CONSTRAINT ... FOREIGN KEY without NOT VALID validates every row under lock",
    applies_to_new_tables: false,
};
pub const ADD_CONSTRAINT_CHECK_NO_NOT_VALID: StaticRuleData = StaticRuleData {
    id: "add-constraint-check-no-not-valid",
    name: "Adding a check constraint without NOT VALID",
    condition: "ADD CONSTRAINT ... CHECK without NOT VALID validates every row under lock",
    applies_to_new_tables: false,
};
pub const ADD_CONSTRAINT_UNIQUE_USING_INDEX: StaticRuleData = StaticRuleData {
    id: "add-constraint-unique-using-index",
    name: "Adding a unique constraint using an existing index",
    condition: "ADD CONSTRAINT ... UNIQUE USING INDEX",
    applies_to_new_tables: false,
};
pub const ADD_CONSTRAINT_UNIQUE: StaticRuleData = StaticRuleData {
    id: "add-constraint-unique",
    name: "Adding a unique constraint",
    condition: "ADD CONSTRAINT ... UNIQUE builds its index under ACCESS EXCLUSIVE",
    applies_to_new_tables: false,
};
pub const ADD_PK_USING_INDEX: StaticRuleData = StaticRuleData {
    id: "add-pk-using-index",
    name: "Adding a primary key using an existing index",
    condition: "ADD CONSTRAINT ... PRIMARY KEY USING INDEX",
    applies_to_new_tables: false,
};
pub const ADD_PK_WITHOUT_USING_INDEX: StaticRuleData = StaticRuleData {
    id: "add-pk-without-using-index",
    name: "Adding a primary key",
    condition: "ADD CONSTRAINT ... PRIMARY KEY builds its index under ACCESS EXCLUSIVE",
    applies_to_new_tables: false,
};
pub const ADD_CONSTRAINT_EXCLUDE: StaticRuleData = StaticRuleData {
    id: "add-constraint-exclude",
    name: "Adding an exclusion constraint",
    condition: "ADD CONSTRAINT ... EXCLUDE cannot be added without a long lock",
    applies_to_new_tables: false,
};
pub const VALIDATE_CONSTRAINT: StaticRuleData = StaticRuleData {
    id: "validate-constraint",
    name: "Validating a constraint",
    condition: "ALTER TABLE ... VALIDATE CONSTRAINT takes SHARE UPDATE EXCLUSIVE",
    applies_to_new_tables: false,
};
pub const RENAME_COLUMN: StaticRuleData = StaticRuleData {
    id: "rename-column",
    name: "Renaming a column",
    condition: "ALTER TABLE ... RENAME COLUMN breaks in-flight application queries",
    applies_to_new_tables: false,
};
pub const RENAME_TABLE: StaticRuleData = StaticRuleData {
    id: "rename-table",
    name: "Renaming a table",
    condition: "ALTER TABLE ... RENAME TO breaks every caller still using the old name",
    applies_to_new_tables: false,
};
pub const DROP_TABLE: StaticRuleData = StaticRuleData {
    id: "drop-table",
    name: "Dropping a table",
    condition: "DROP TABLE destroys data and cannot be rolled forward",
    applies_to_new_tables: false,
};
pub const DROP_COLUMN: StaticRuleData = StaticRuleData {
    id: "drop-column",
    name: "Dropping a column",
    condition: "ALTER TABLE ... DROP COLUMN breaks readers that still select it",
    applies_to_new_tables: false,
};
pub const TRUNCATE: StaticRuleData = StaticRuleData {
    id: "truncate",
    name: "Truncating a table",
    condition: "TRUNCATE removes all rows under ACCESS EXCLUSIVE",
    applies_to_new_tables: false,
};
pub const TRUNCATE_CASCADE: StaticRuleData = StaticRuleData {
    id: "truncate-cascade",
    name: "TRUNCATE ... CASCADE",
    condition: "CASCADE truncates every table with a foreign key onto the target",
    applies_to_new_tables: false,
};
pub const DELETE_WITHOUT_WHERE: StaticRuleData = StaticRuleData {
    id: "delete-without-where",
    name: "DELETE without WHERE",
    condition: "An unfiltered DELETE removes every row in the table",
    applies_to_new_tables: false,
};
pub const VACUUM_FULL: StaticRuleData = StaticRuleData {
    id: "vacuum-full",
    name: "VACUUM FULL",
    condition: "VACUUM FULL rewrites the table under ACCESS EXCLUSIVE",
    applies_to_new_tables: false,
};
pub const ALTER_ENUM_ADD_VALUE: StaticRuleData = StaticRuleData {
    id: "alter-enum-add-value",
    name: "Adding an enum value",
    condition: "ALTER TYPE ... ADD VALUE",
    applies_to_new_tables: false,
};
pub const REINDEX_NON_CONCURRENT: StaticRuleData = StaticRuleData {
    id: "reindex-non-concurrent",
    name: "REINDEX without CONCURRENTLY",
    condition: "REINDEX blocks reads and writes on the underlying table",
    applies_to_new_tables: false,
};
pub const REFRESH_MATVIEW_CONCURRENT: StaticRuleData = StaticRuleData {
    id: "refresh-matview-concurrent",
    name: "Refreshing a materialized view concurrently",
    condition: "REFRESH MATERIALIZED VIEW CONCURRENTLY",
    applies_to_new_tables: false,
};
pub const REFRESH_MATVIEW_BLOCKING: StaticRuleData = StaticRuleData {
    id: "refresh-matview-blocking",
    name: "Refreshing a materialized view",
    condition: "REFRESH MATERIALIZED VIEW without CONCURRENTLY blocks all readers",
    applies_to_new_tables: false,
};
pub const CREATE_TRIGGER: StaticRuleData = StaticRuleData {
    id: "create-trigger",
    name: "Creating a trigger",
    condition: "CREATE TRIGGER takes ACCESS EXCLUSIVE on the table",
    applies_to_new_tables: false,
};
pub const DROP_TRIGGER: StaticRuleData = StaticRuleData {
    id: "drop-trigger",
    name: "Dropping a trigger",
    condition: "DROP TRIGGER takes ACCESS EXCLUSIVE on the table",
    applies_to_new_tables: false,
};
pub const ENABLE_DISABLE_TRIGGER: StaticRuleData = StaticRuleData {
    id: "enable-disable-trigger",
    name: "Enabling or disabling a trigger",
    condition: "ALTER TABLE ... ENABLE/DISABLE TRIGGER",
    applies_to_new_tables: false,
};
pub const ATTACH_PARTITION: StaticRuleData = StaticRuleData {
    id: "attach-partition",
    name: "Attaching a partition",
    condition: "ALTER TABLE ... ATTACH PARTITION scans the partition under lock",
    applies_to_new_tables: false,
};
pub const DETACH_PARTITION: StaticRuleData = StaticRuleData {
    id: "detach-partition",
    name: "Detaching a partition",
    condition: "ALTER TABLE ... DETACH PARTITION without CONCURRENTLY",
    applies_to_new_tables: false,
};
pub const DETACH_PARTITION_CONCURRENT: StaticRuleData = StaticRuleData {
    id: "detach-partition-concurrent",
    name: "Detaching a partition concurrently",
    condition: "ALTER TABLE ... DETACH PARTITION CONCURRENTLY",
    applies_to_new_tables: false,
};
pub const PREFER_BIGINT_OVER_INT: StaticRuleData = StaticRuleData {
    id: "prefer-bigint-over-int",
    name: "Prefer bigint over int",
    condition: "A column was declared int or smallint; sequences outgrow 32 bits",
    applies_to_new_tables: true,
};
pub const PREFER_TEXT_FIELD: StaticRuleData = StaticRuleData {
    id: "prefer-text-field",
    name: "Prefer text over varchar(n)",
    condition: "A column was declared varchar(n); later widening requires DDL",
    applies_to_new_tables: true,
};
pub const PREFER_TIMESTAMPTZ: StaticRuleData = StaticRuleData {
    id: "prefer-timestamptz",
    name: "Prefer timestamptz over timestamp",
    condition: "A column was declared timestamp without time zone",
    applies_to_new_tables: true,
};
pub const PREFER_ROBUST_CREATE_TABLE: StaticRuleData = StaticRuleData {
    id: "prefer-robust-create-table",
    name: "CREATE TABLE without IF NOT EXISTS",
    condition: "Re-running the migration fails if the table already exists",
    applies_to_new_tables: true,
};
pub const PREFER_ROBUST_CREATE_INDEX: StaticRuleData = StaticRuleData {
    id: "prefer-robust-create-index",
    name: "CREATE INDEX without IF NOT EXISTS",
    condition: "Re-running the migration fails if the index already exists",
    applies_to_new_tables: true,
};
pub const PREFER_ROBUST_DROP_TABLE: StaticRuleData = StaticRuleData {
    id: "prefer-robust-drop-table",
    name: "DROP TABLE without IF EXISTS",
    condition: "Re-running the migration fails if the table is already gone",
    applies_to_new_tables: false,
};
pub const PREFER_ROBUST_DROP_INDEX: StaticRuleData = StaticRuleData {
    id: "prefer-robust-drop-index",
    name: "DROP INDEX without IF EXISTS",
    condition: "Re-running the migration fails if the index is already gone",
    applies_to_new_tables: false,
};

pub const ALL: &[&StaticRuleData] = &[
    &ADD_COLUMN_NOT_NULL_NO_DEFAULT,
    &ADD_COLUMN_CONSTANT_DEFAULT,
    &ADD_COLUMN_NON_CONSTANT_DEFAULT,
    &ADD_COLUMN_DEFAULT_PRE_PG11,
    &ADD_COLUMN_JSON,
    &ADD_COLUMN_SERIAL,
    &ADD_COLUMN_STORED_GENERATED,
    &CREATE_INDEX_NOT_CONCURRENT,
    &DROP_INDEX_NOT_CONCURRENT,
    &ALTER_COLUMN_TYPE,
    &ALTER_COLUMN_SET_NOT_NULL,
    &ADD_CONSTRAINT_FK_NO_NOT_VALID,
    &ADD_CONSTRAINT_CHECK_NO_NOT_VALID,
    &ADD_CONSTRAINT_UNIQUE_USING_INDEX,
    &ADD_CONSTRAINT_UNIQUE,
    &ADD_PK_USING_INDEX,
    &ADD_PK_WITHOUT_USING_INDEX,
    &ADD_CONSTRAINT_EXCLUDE,
    &VALIDATE_CONSTRAINT,
    &RENAME_COLUMN,
    &RENAME_TABLE,
    &DROP_TABLE,
    &DROP_COLUMN,
    &TRUNCATE,
    &TRUNCATE_CASCADE,
    &DELETE_WITHOUT_WHERE,
    &VACUUM_FULL,
    &ALTER_ENUM_ADD_VALUE,
    &REINDEX_NON_CONCURRENT,
    &REFRESH_MATVIEW_CONCURRENT,
    &REFRESH_MATVIEW_BLOCKING,
    &CREATE_TRIGGER,
    &DROP_TRIGGER,
    &ENABLE_DISABLE_TRIGGER,
    &ATTACH_PARTITION,
    &DETACH_PARTITION,
    &DETACH_PARTITION_CONCURRENT,
    &PREFER_BIGINT_OVER_INT,
    &PREFER_TEXT_FIELD,
    &PREFER_TIMESTAMPTZ,
    &PREFER_ROBUST_CREATE_TABLE,
    &PREFER_ROBUST_CREATE_INDEX,
    &PREFER_ROBUST_DROP_TABLE,
    &PREFER_ROBUST_DROP_INDEX,
];

pub fn data_by_id<S: AsRef<str>>(id: S) -> Option<&'static StaticRuleData> {
    ALL.iter().find(|rule| rule.id == id.as_ref()).copied()
}

#[cfg(test)]
mod tests {
    #[test]
    fn no_duplicated_id_or_name() {
        let mut ids = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for rule in super::ALL {
            assert!(ids.insert(rule.id), "duplicated id: {}", rule.id);
            assert!(names.insert(rule.name), "duplicated name: {}", rule.name);
        }
    }

    #[test]
    fn lookup_by_id() {
        assert!(super::data_by_id("drop-table").is_some());
        assert!(super::data_by_id("no-such-rule").is_none());
    }
}
