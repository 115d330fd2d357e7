use log::debug;

use crate::extract::js::{
    call_args, conditional_depths, find_calls, first_param_name, function_body_after, matching,
    tokenize, CallSite, Token, TokenKind,
};
use crate::extract::{
    conditional_sql_warning, dynamic_sql_warning, join_statements, Extraction, ExtractionWarning,
    VOLATILE_EXPR,
};

const TABLE_METHODS: &[&str] = &[
    "createTable",
    "createTableIfNotExists",
    "alterTable",
    "dropTable",
    "dropTableIfExists",
    "renameTable",
];

/// Lift SQL out of a Knex migration: raw calls are taken verbatim, schema
/// builder calls are transpiled to PostgreSQL DDL.
pub fn extract(path: &str, source: &str) -> Extraction {
    let tokens = tokenize(source);
    let mut warnings: Vec<ExtractionWarning> = Vec::new();

    let Some(up_ix) = find_up_function(&tokens) else {
        dynamic_sql_warning(
            &mut warnings,
            path,
            1,
            1,
            "No up() migration function found: nothing to analyze",
        );
        return Extraction {
            warnings,
            ..Default::default()
        };
    };
    let knex = first_param_name(&tokens, up_ix).unwrap_or_else(|| "knex".to_string());
    let Some(body) = function_body_after(&tokens, up_ix) else {
        dynamic_sql_warning(
            &mut warnings,
            path,
            tokens[up_ix].line,
            tokens[up_ix].col,
            "up() has no analyzable body",
        );
        return Extraction {
            warnings,
            ..Default::default()
        };
    };

    let depths = conditional_depths(&tokens);
    let mut statements: Vec<String> = Vec::new();

    for call in find_calls(&tokens, body.clone()) {
        let chain: Vec<&str> = call.chain.iter().map(|s| s.as_str()).collect();
        let conditional = depths[call.open_paren] > 0;
        match chain.as_slice() {
            [receiver, "raw"] if *receiver == knex || *receiver == "trx" => {
                lift_raw(
                    &tokens, &call, path, conditional, &mut statements, &mut warnings,
                );
            }
            [receiver, "schema", "raw"] if *receiver == knex => {
                lift_raw(
                    &tokens, &call, path, conditional, &mut statements, &mut warnings,
                );
            }
            [receiver, "schema", method] if *receiver == knex => {
                schema_call_chain(
                    &tokens,
                    &call,
                    method,
                    path,
                    conditional,
                    &mut statements,
                    &mut warnings,
                );
            }
            _ => {}
        }
    }

    Extraction {
        sql: join_statements(&statements),
        warnings,
        auto_commit: false,
    }
}

/// Process `knex.schema.<method>(...)` plus any chained `.method(...)` that
/// follows the call, e.g. `knex.schema.dropTable('a').dropTable('b')`.
#[allow(clippy::too_many_arguments)]
fn schema_call_chain(
    tokens: &[Token],
    call: &CallSite,
    first_method: &str,
    path: &str,
    conditional: bool,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let mut method = first_method.to_string();
    let mut open = call.open_paren;
    loop {
        schema_call(
            tokens, call, &method, open, path, conditional, statements, warnings,
        );
        let Some(close) = matching(tokens, open) else {
            return;
        };
        // chained builder call: `.method(`
        if tokens.get(close + 1).map(|t| t.is_punct('.')).unwrap_or(false)
            && tokens.get(close + 2).map(|t| t.kind == TokenKind::Ident).unwrap_or(false)
            && tokens.get(close + 3).map(|t| t.is_punct('(')).unwrap_or(false)
        {
            method = tokens[close + 2].text.clone();
            open = close + 3;
            if method == "then" || method == "catch" || method == "finally" {
                return;
            }
        } else {
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn schema_call(
    tokens: &[Token],
    call: &CallSite,
    method: &str,
    open: usize,
    path: &str,
    conditional: bool,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    if method == "raw" {
        let raw_call = CallSite {
            chain: call.chain.clone(),
            open_paren: open,
            line: call.line,
            col: call.col,
        };
        lift_raw(tokens, &raw_call, path, conditional, statements, warnings);
        return;
    }
    if !TABLE_METHODS.contains(&method) {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            format!("Unsupported knex schema builder method `{method}`: cannot statically analyze"),
        );
        return;
    }
    let Some((args, _)) = call_args(tokens, open) else {
        return;
    };
    let Some(table) = args.first().and_then(|arg| literal_in(tokens, arg.clone())) else {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            format!("Dynamic table name in knex.schema.{method}(): cannot statically analyze"),
        );
        return;
    };
    debug!("knex schema.{method} on {table} at {}:{}", call.line, call.col);

    let before = statements.len();
    match method {
        "createTable" | "createTableIfNotExists" => {
            let if_not_exists = method.ends_with("IfNotExists");
            if let Some(arg) = args.get(1) {
                create_table(
                    tokens, arg.clone(), &table, if_not_exists, path, call, statements, warnings,
                );
            }
        }
        "alterTable" => {
            if let Some(arg) = args.get(1) {
                alter_table(tokens, arg.clone(), &table, path, call, statements, warnings);
            }
        }
        "dropTable" => statements.push(format!("DROP TABLE {table}")),
        "dropTableIfExists" => statements.push(format!("DROP TABLE IF EXISTS {table}")),
        "renameTable" => {
            if let Some(new_name) = args.get(1).and_then(|arg| literal_in(tokens, arg.clone())) {
                statements.push(format!("ALTER TABLE {table} RENAME TO {new_name}"));
            } else {
                dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic table name in knex.schema.renameTable(): cannot statically analyze",
                );
            }
        }
        _ => unreachable!("filtered above"),
    }
    if conditional {
        for _ in before..statements.len() {
            conditional_sql_warning(warnings, path, call.line, call.col);
        }
    }
}

fn lift_raw(
    tokens: &[Token],
    call: &CallSite,
    path: &str,
    conditional: bool,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let literal = call_args(tokens, call.open_paren)
        .and_then(|(args, _)| args.first().cloned())
        .and_then(|arg| literal_in(tokens, arg));
    match literal {
        Some(sql) => {
            if conditional {
                conditional_sql_warning(warnings, path, call.line, call.col);
            }
            statements.push(sql);
        }
        None => dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            "Dynamic SQL: cannot statically analyze knex raw() argument",
        ),
    }
}

fn literal_in(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    match &tokens[range] {
        [only] => only.literal_value().map(|s| s.to_string()),
        _ => None,
    }
}

/// Transpile a `createTable(name, (t) => { ... })` callback into one
/// CREATE TABLE statement.
#[allow(clippy::too_many_arguments)]
fn create_table(
    tokens: &[Token],
    callback: std::ops::Range<usize>,
    table: &str,
    if_not_exists: bool,
    path: &str,
    call: &CallSite,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let Some(param) = first_param_name(tokens, callback.start) else {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            "createTable callback has no table builder parameter: cannot statically analyze",
        );
        return;
    };
    let Some(body) = function_body_after(tokens, callback.start) else {
        return;
    };
    let mut columns: Vec<String> = Vec::new();
    for builder in find_calls(tokens, body) {
        if builder.chain.first().map(|s| s.as_str()) != Some(param.as_str()) {
            continue;
        }
        let Some(method) = builder.chain.get(1) else {
            continue;
        };
        match column_definition(tokens, &builder, method) {
            ColumnOutcome::Column(def) => columns.push(def),
            ColumnOutcome::Unsupported => dynamic_sql_warning(
                warnings,
                path,
                builder.line,
                builder.col,
                format!("Unsupported knex column builder method `{method}`: cannot statically analyze"),
            ),
            ColumnOutcome::Skip => {}
        }
    }
    let keyword = if if_not_exists {
        "CREATE TABLE IF NOT EXISTS"
    } else {
        "CREATE TABLE"
    };
    statements.push(format!("{keyword} {table} ({})", columns.join(", ")));
}

/// Transpile an `alterTable(name, (t) => { ... })` callback into one ALTER
/// or RENAME statement per builder call.
#[allow(clippy::too_many_arguments)]
fn alter_table(
    tokens: &[Token],
    callback: std::ops::Range<usize>,
    table: &str,
    path: &str,
    call: &CallSite,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let Some(param) = first_param_name(tokens, callback.start) else {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            "alterTable callback has no table builder parameter: cannot statically analyze",
        );
        return;
    };
    let Some(body) = function_body_after(tokens, callback.start) else {
        return;
    };
    for builder in find_calls(tokens, body) {
        if builder.chain.first().map(|s| s.as_str()) != Some(param.as_str()) {
            continue;
        }
        let Some(method) = builder.chain.get(1) else {
            continue;
        };
        let Some((args, _)) = call_args(tokens, builder.open_paren) else {
            continue;
        };
        match method.as_str() {
            "dropColumn" | "dropColumns" => {
                for arg in &args {
                    if let Some(column) = literal_in(tokens, arg.clone()) {
                        statements.push(format!("ALTER TABLE {table} DROP COLUMN {column}"));
                    }
                }
            }
            "renameColumn" => {
                let from = args.first().and_then(|a| literal_in(tokens, a.clone()));
                let to = args.get(1).and_then(|a| literal_in(tokens, a.clone()));
                match (from, to) {
                    (Some(from), Some(to)) => statements
                        .push(format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}")),
                    _ => dynamic_sql_warning(
                        warnings,
                        path,
                        builder.line,
                        builder.col,
                        "Dynamic column name in renameColumn(): cannot statically analyze",
                    ),
                }
            }
            _ => match column_definition(tokens, &builder, method) {
                ColumnOutcome::Column(def) => {
                    statements.push(format!("ALTER TABLE {table} ADD COLUMN {def}"))
                }
                ColumnOutcome::Unsupported => dynamic_sql_warning(
                    warnings,
                    path,
                    builder.line,
                    builder.col,
                    format!(
                        "Unsupported knex column builder method `{method}`: cannot statically analyze"
                    ),
                ),
                ColumnOutcome::Skip => {}
            },
        }
    }
}

enum ColumnOutcome {
    Column(String),
    Unsupported,
    Skip,
}

/// Translate `t.<typeMethod>(col, ...)` plus its chained modifiers into a
/// column definition string.
fn column_definition(tokens: &[Token], builder: &CallSite, method: &str) -> ColumnOutcome {
    let Some((args, close)) = call_args(tokens, builder.open_paren) else {
        return ColumnOutcome::Skip;
    };
    let column = args.first().and_then(|a| literal_in(tokens, a.clone()));
    let Some(column) = column else {
        return ColumnOutcome::Unsupported;
    };
    let type_sql = match method {
        "string" => match args.get(1).and_then(|a| number_in(tokens, a.clone())) {
            Some(n) => format!("varchar({n})"),
            None => "varchar(255)".to_string(),
        },
        "text" => "text".to_string(),
        "integer" => "integer".to_string(),
        "bigInteger" => "bigint".to_string(),
        "smallint" => "smallint".to_string(),
        "boolean" => "boolean".to_string(),
        "date" => "date".to_string(),
        "datetime" | "timestamp" => "timestamp".to_string(),
        "time" => "time".to_string(),
        "float" => "real".to_string(),
        "double" => "double precision".to_string(),
        "decimal" => {
            let precision = args.get(1).and_then(|a| number_in(tokens, a.clone()));
            let scale = args.get(2).and_then(|a| number_in(tokens, a.clone()));
            match (precision, scale) {
                (Some(p), Some(s)) => format!("numeric({p},{s})"),
                (Some(p), None) => format!("numeric({p})"),
                _ => "numeric".to_string(),
            }
        }
        "increments" => "serial PRIMARY KEY".to_string(),
        "bigIncrements" => "bigserial PRIMARY KEY".to_string(),
        "uuid" => "uuid".to_string(),
        "json" => "json".to_string(),
        "jsonb" => "jsonb".to_string(),
        "binary" => "bytea".to_string(),
        "specificType" => match args.get(1).and_then(|a| literal_in(tokens, a.clone())) {
            Some(explicit) => explicit,
            None => return ColumnOutcome::Unsupported,
        },
        _ => return ColumnOutcome::Unsupported,
    };

    let mut def = format!("{column} {type_sql}");
    let mut references: Option<String> = None;
    let mut in_table: Option<String> = None;

    // walk chained modifiers: .notNullable().defaultTo(0)...
    let mut ix = close;
    while tokens.get(ix + 1).map(|t| t.is_punct('.')).unwrap_or(false)
        && tokens.get(ix + 2).map(|t| t.kind == TokenKind::Ident).unwrap_or(false)
        && tokens.get(ix + 3).map(|t| t.is_punct('(')).unwrap_or(false)
    {
        let modifier = tokens[ix + 2].text.as_str();
        let open = ix + 3;
        let Some((mod_args, mod_close)) = call_args(tokens, open) else {
            break;
        };
        match modifier {
            "notNullable" => def.push_str(" NOT NULL"),
            "nullable" => {}
            "primary" => def.push_str(" PRIMARY KEY"),
            "unique" => def.push_str(" UNIQUE"),
            "unsigned" | "index" | "comment" => {}
            "defaultTo" => {
                let value = mod_args
                    .first()
                    .map(|a| default_value(tokens, a.clone()))
                    .unwrap_or_else(|| VOLATILE_EXPR.to_string());
                def.push_str(&format!(" DEFAULT {value}"));
            }
            "references" => {
                references = mod_args.first().and_then(|a| literal_in(tokens, a.clone()));
            }
            "inTable" => {
                in_table = mod_args.first().and_then(|a| literal_in(tokens, a.clone()));
            }
            "onDelete" => {
                if let Some(action) = mod_args.first().and_then(|a| literal_in(tokens, a.clone())) {
                    def.push_str(&format!(" ON DELETE {action}"));
                }
            }
            "onUpdate" => {
                if let Some(action) = mod_args.first().and_then(|a| literal_in(tokens, a.clone())) {
                    def.push_str(&format!(" ON UPDATE {action}"));
                }
            }
            _ => {}
        }
        ix = mod_close;
    }

    if let Some(key) = references {
        // ON DELETE/ON UPDATE must follow REFERENCES, so splice it in before
        // any action clauses already appended.
        let reference_clause = match in_table {
            Some(table) => format!(" REFERENCES {table}({key})"),
            None => format!(" REFERENCES {key}"),
        };
        match def.find(" ON DELETE").or_else(|| def.find(" ON UPDATE")) {
            Some(pos) => def.insert_str(pos, &reference_clause),
            None => def.push_str(&reference_clause),
        }
    }

    ColumnOutcome::Column(def)
}

fn number_in(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    match &tokens[range] {
        [only] if only.kind == TokenKind::Number => Some(only.text.clone()),
        _ => None,
    }
}

/// Render a defaultTo argument: literals stay literal, anything else
/// becomes the volatile sentinel so the analyzer treats it as non-constant.
fn default_value(tokens: &[Token], range: std::ops::Range<usize>) -> String {
    match &tokens[range] {
        [only] => match &only.kind {
            TokenKind::Str => format!("'{}'", only.text.replace('\'', "''")),
            TokenKind::Number => only.text.clone(),
            TokenKind::Ident if only.text == "true" => "TRUE".to_string(),
            TokenKind::Ident if only.text == "false" => "FALSE".to_string(),
            TokenKind::Ident if only.text == "null" => "NULL".to_string(),
            _ => VOLATILE_EXPR.to_string(),
        },
        _ => VOLATILE_EXPR.to_string(),
    }
}

/// Locate `up` in any of the exported forms knex migrations use.
fn find_up_function(tokens: &[Token]) -> Option<usize> {
    (0..tokens.len()).find(|&ix| {
        if !tokens[ix].is_ident("up") {
            return false;
        }
        let follows_function = ix > 0 && tokens[ix - 1].is_ident("function");
        let const_binding = ix > 0
            && matches!(tokens[ix - 1].text.as_str(), "const" | "let" | "var")
            && tokens.get(ix + 1).map(|t| t.is_punct('=')).unwrap_or(false);
        let exports_member = ix > 1
            && tokens[ix - 1].is_punct('.')
            && tokens[ix - 2].is_ident("exports")
            && tokens.get(ix + 1).map(|t| t.is_punct('=')).unwrap_or(false);
        follows_function || const_binding || exports_member
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lifts_raw_sql() {
        let source = r#"
exports.up = function (knex) {
  return knex.raw('ALTER TABLE users ADD COLUMN status text');
};
"#;
        let extraction = extract("m.js", source);
        assert_eq!(extraction.sql, "ALTER TABLE users ADD COLUMN status text;");
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn lifts_schema_raw_and_trx_raw() {
        let source = r#"
export async function up(knex) {
  await knex.schema.raw('CREATE INDEX CONCURRENTLY i ON t (c)');
  await trx.raw(`DROP INDEX CONCURRENTLY i`);
}
"#;
        let extraction = extract("m.js", source);
        assert!(extraction.sql.contains("CREATE INDEX CONCURRENTLY"));
        assert!(extraction.sql.contains("DROP INDEX CONCURRENTLY"));
    }

    #[test]
    fn dynamic_raw_warns() {
        let source = r#"
exports.up = function (knex) {
  return knex.raw(`DROP TABLE ${process.env.T}`);
};
"#;
        let extraction = extract("m.js", source);
        assert_eq!(extraction.sql, "");
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("Dynamic SQL"));
    }

    #[test]
    fn transpiles_create_table() {
        let source = r#"
exports.up = function (knex) {
  return knex.schema.createTable('users', (table) => {
    table.bigIncrements('id');
    table.string('email').notNullable().unique();
    table.string('name', 100);
    table.jsonb('settings').defaultTo('{}');
    table.timestamp('created_at').defaultTo(knex.fn.now());
    table.integer('org_id').references('id').inTable('orgs').onDelete('CASCADE');
  });
};
"#;
        let extraction = extract("m.js", source);
        let sql = &extraction.sql;
        assert!(sql.starts_with("CREATE TABLE users ("));
        assert!(sql.contains("id bigserial PRIMARY KEY"));
        assert!(sql.contains("email varchar(255) NOT NULL UNIQUE"));
        assert!(sql.contains("name varchar(100)"));
        assert!(sql.contains("settings jsonb DEFAULT '{}'"));
        assert!(sql.contains(&format!("created_at timestamp DEFAULT {VOLATILE_EXPR}")));
        assert!(sql.contains("org_id integer REFERENCES orgs(id) ON DELETE CASCADE"));
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn transpiles_alter_table() {
        let source = r#"
exports.up = function (knex) {
  return knex.schema.alterTable('users', (t) => {
    t.string('status').notNullable();
    t.dropColumn('legacy');
    t.renameColumn('mail', 'email');
  });
};
"#;
        let extraction = extract("m.js", source);
        let statements: Vec<&str> = extraction.sql.lines().collect();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE users ADD COLUMN status varchar(255) NOT NULL;",
                "ALTER TABLE users DROP COLUMN legacy;",
                "ALTER TABLE users RENAME COLUMN mail TO email;",
            ]
        );
    }

    #[test]
    fn drop_and_rename_table_variants() {
        let source = r#"
exports.up = function (knex) {
  return knex.schema
    .dropTableIfExists('old_data')
    .renameTable('tmp', 'final');
};
"#;
        let extraction = extract("m.js", source);
        assert!(extraction.sql.contains("DROP TABLE IF EXISTS old_data;"));
        assert!(extraction.sql.contains("ALTER TABLE tmp RENAME TO final;"));
    }

    #[test]
    fn unsupported_builder_method_warns() {
        let source = r#"
exports.up = function (knex) {
  return knex.schema.withSchema('audit').createTable('t', () => {});
};
"#;
        let extraction = extract("m.js", source);
        assert!(extraction
            .warnings
            .iter()
            .any(|w| w.message.contains("withSchema")));
    }

    #[test]
    fn conditional_schema_call_warns_but_emits() {
        let source = r#"
export async function up(knex) {
  if (process.env.CLEANUP) {
    await knex.schema.dropTable('cache');
  }
}
"#;
        let extraction = extract("m.js", source);
        assert_eq!(extraction.sql, "DROP TABLE cache;");
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("Conditional SQL"));
    }

    #[test]
    fn specific_type_passes_through() {
        let source = r#"
exports.up = (knex) =>
  knex.schema.alterTable('events', (t) => {
    t.specificType('tags', 'text[]');
  });
"#;
        let extraction = extract("m.js", source);
        assert_eq!(extraction.sql, "ALTER TABLE events ADD COLUMN tags text[];");
    }

    #[test]
    fn missing_up_warns() {
        let extraction = extract("m.js", "exports.down = function (knex) {};");
        assert_eq!(extraction.sql, "");
        assert!(extraction.warnings[0].message.contains("No up()"));
    }

    #[test]
    fn module_exports_up_form() {
        let source = r#"
module.exports.up = async (knex) => {
  await knex.raw('SELECT 1');
};
"#;
        let extraction = extract("m.js", source);
        assert_eq!(extraction.sql, "SELECT 1;");
    }
}
