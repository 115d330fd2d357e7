use log::debug;

use crate::extract::js::{
    call_args, find_calls, first_param_name, function_body_after, matching, tokenize, CallSite,
    Token, TokenKind,
};
use crate::extract::{
    dynamic_sql_warning, join_statements, Extraction, ExtractionWarning, VOLATILE_EXPR,
};

const QI_METHODS: &[&str] = &[
    "createTable",
    "addColumn",
    "removeColumn",
    "renameColumn",
    "changeColumn",
    "addIndex",
    "removeIndex",
    "dropTable",
    "renameTable",
];

/// Lift SQL out of a Sequelize migration: raw `sequelize.query` calls are
/// taken verbatim, bare `queryInterface` calls are transpiled to DDL.
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
    let interface =
        first_param_name(&tokens, up_ix).unwrap_or_else(|| "queryInterface".to_string());
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

    let mut statements: Vec<String> = Vec::new();

    for call in find_calls(&tokens, body) {
        let chain: Vec<&str> = call.chain.iter().map(|s| s.as_str()).collect();
        match chain.as_slice() {
            [.., "sequelize", "query"] => {
                let literal = call_args(&tokens, call.open_paren)
                    .and_then(|(args, _)| args.first().cloned())
                    .and_then(|arg| literal_in(&tokens, arg));
                match literal {
                    Some(sql) => statements.push(sql),
                    None => dynamic_sql_warning(
                        &mut warnings,
                        path,
                        call.line,
                        call.col,
                        "Dynamic SQL: cannot statically analyze sequelize.query() argument",
                    ),
                }
            }
            [receiver, method] if *receiver == interface => {
                if QI_METHODS.contains(method) {
                    transpile(
                        &tokens, &call, method, path, &mut statements, &mut warnings,
                    );
                } else {
                    dynamic_sql_warning(
                        &mut warnings,
                        path,
                        call.line,
                        call.col,
                        format!(
                            "Unsupported queryInterface method `{method}`: cannot statically \
                             analyze"
                        ),
                    );
                }
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

fn transpile(
    tokens: &[Token],
    call: &CallSite,
    method: &str,
    path: &str,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let Some((args, _)) = call_args(tokens, call.open_paren) else {
        return;
    };
    let table = args.first().and_then(|arg| literal_in(tokens, arg.clone()));
    let Some(table) = table else {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            format!("Dynamic table name in queryInterface.{method}(): cannot statically analyze"),
        );
        return;
    };
    debug!("sequelize {method} on {table} at {}:{}", call.line, call.col);
    match method {
        "createTable" => {
            let Some(columns) = args.get(1).and_then(|arg| object_open(tokens, arg.clone()))
            else {
                dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic column definitions in createTable(): cannot statically analyze",
                );
                return;
            };
            let mut defs: Vec<String> = Vec::new();
            for (column, value) in object_entries(tokens, columns) {
                match column_sql(tokens, value) {
                    Some(def) => defs.push(format!("{column} {def}")),
                    None => dynamic_sql_warning(
                        warnings,
                        path,
                        call.line,
                        call.col,
                        format!(
                            "Dynamic definition for column `{column}`: cannot statically analyze"
                        ),
                    ),
                }
            }
            statements.push(format!("CREATE TABLE {table} ({})", defs.join(", ")));
        }
        "addColumn" => {
            let column = args.get(1).and_then(|arg| literal_in(tokens, arg.clone()));
            let def = args.get(2).and_then(|arg| column_sql(tokens, arg.clone()));
            match (column, def) {
                (Some(column), Some(def)) => {
                    statements.push(format!("ALTER TABLE {table} ADD COLUMN {column} {def}"))
                }
                _ => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic column in addColumn(): cannot statically analyze",
                ),
            }
        }
        "removeColumn" => {
            match args.get(1).and_then(|arg| literal_in(tokens, arg.clone())) {
                Some(column) => {
                    statements.push(format!("ALTER TABLE {table} DROP COLUMN {column}"))
                }
                None => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic column in removeColumn(): cannot statically analyze",
                ),
            }
        }
        "renameColumn" => {
            let from = args.get(1).and_then(|arg| literal_in(tokens, arg.clone()));
            let to = args.get(2).and_then(|arg| literal_in(tokens, arg.clone()));
            match (from, to) {
                (Some(from), Some(to)) => {
                    statements.push(format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}"))
                }
                _ => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic column in renameColumn(): cannot statically analyze",
                ),
            }
        }
        "changeColumn" => {
            let column = args.get(1).and_then(|arg| literal_in(tokens, arg.clone()));
            let def = args.get(2);
            match (column, def) {
                (Some(column), Some(def)) => {
                    match type_only(tokens, def.clone()) {
                        Some(type_sql) => statements.push(format!(
                            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {type_sql}"
                        )),
                        None => dynamic_sql_warning(
                            warnings,
                            path,
                            call.line,
                            call.col,
                            "Dynamic type in changeColumn(): cannot statically analyze",
                        ),
                    }
                    if let Some(allow_null) = allow_null_in(tokens, def.clone()) {
                        let clause = if allow_null {
                            "DROP NOT NULL"
                        } else {
                            "SET NOT NULL"
                        };
                        statements.push(format!(
                            "ALTER TABLE {table} ALTER COLUMN {column} {clause}"
                        ));
                    }
                }
                _ => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic column in changeColumn(): cannot statically analyze",
                ),
            }
        }
        "addIndex" => add_index(tokens, call, &table, &args, path, statements, warnings),
        "removeIndex" => {
            let target = args.get(1);
            let name = target.and_then(|arg| literal_in(tokens, arg.clone())).or_else(|| {
                target
                    .and_then(|arg| string_array(tokens, arg.clone()))
                    .map(|columns| format!("{table}_{}", columns.join("_")))
            });
            match name {
                Some(name) => statements.push(format!("DROP INDEX {name}")),
                None => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic index in removeIndex(): cannot statically analyze",
                ),
            }
        }
        "dropTable" => statements.push(format!("DROP TABLE {table}")),
        "renameTable" => {
            match args.get(1).and_then(|arg| literal_in(tokens, arg.clone())) {
                Some(new_name) => {
                    statements.push(format!("ALTER TABLE {table} RENAME TO {new_name}"))
                }
                None => dynamic_sql_warning(
                    warnings,
                    path,
                    call.line,
                    call.col,
                    "Dynamic table name in renameTable(): cannot statically analyze",
                ),
            }
        }
        _ => unreachable!("filtered by QI_METHODS"),
    }
}

fn add_index(
    tokens: &[Token],
    call: &CallSite,
    table: &str,
    args: &[std::ops::Range<usize>],
    path: &str,
    statements: &mut Vec<String>,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let mut columns: Option<Vec<String>> = None;
    let mut unique = false;
    let mut name: Option<String> = None;
    for arg in args.iter().skip(1) {
        if let Some(cols) = string_array(tokens, arg.clone()) {
            columns = Some(cols);
        } else if let Some(open) = object_open(tokens, arg.clone()) {
            for (key, value) in object_entries(tokens, open) {
                match key.as_str() {
                    "fields" => columns = string_array(tokens, value),
                    "unique" => {
                        unique = tokens[value]
                            .first()
                            .map(|t| t.is_ident("true"))
                            .unwrap_or(false)
                    }
                    "name" => name = literal_in(tokens, value),
                    _ => {}
                }
            }
        }
    }
    let Some(columns) = columns.filter(|c| !c.is_empty()) else {
        dynamic_sql_warning(
            warnings,
            path,
            call.line,
            call.col,
            "Dynamic index fields in addIndex(): cannot statically analyze",
        );
        return;
    };
    let name = name.unwrap_or_else(|| format!("{table}_{}", columns.join("_")));
    let keyword = if unique { "CREATE UNIQUE INDEX" } else { "CREATE INDEX" };
    statements.push(format!(
        "{keyword} {name} ON {table} ({})",
        columns.join(", ")
    ));
}

/// Render a column definition: a bare datatype reference or an options
/// object with `type`, `allowNull`, `defaultValue`, `primaryKey`, `unique`
/// and `references`.
fn column_sql(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    if let Some(open) = object_open(tokens, range.clone()) {
        let mut type_sql: Option<String> = None;
        let mut auto_increment = false;
        let mut clauses = String::new();
        let mut reference: Option<String> = None;
        for (key, value) in object_entries(tokens, open) {
            match key.as_str() {
                "type" => type_sql = datatype_sql(tokens, value),
                "allowNull" => {
                    if tokens[value].first().map(|t| t.is_ident("false")).unwrap_or(false) {
                        clauses.push_str(" NOT NULL");
                    }
                }
                "defaultValue" => {
                    let rendered = default_sql(tokens, value);
                    clauses.push_str(&format!(" DEFAULT {rendered}"));
                }
                "primaryKey" => {
                    if tokens[value].first().map(|t| t.is_ident("true")).unwrap_or(false) {
                        clauses.push_str(" PRIMARY KEY");
                    }
                }
                "unique" => {
                    if tokens[value].first().map(|t| t.is_ident("true")).unwrap_or(false) {
                        clauses.push_str(" UNIQUE");
                    }
                }
                "autoIncrement" => {
                    auto_increment = tokens[value]
                        .first()
                        .map(|t| t.is_ident("true"))
                        .unwrap_or(false);
                }
                "references" => {
                    if let Some(ref_open) = object_open(tokens, value) {
                        let mut model = None;
                        let mut ref_key = None;
                        for (k, v) in object_entries(tokens, ref_open) {
                            match k.as_str() {
                                "model" => model = literal_in(tokens, v),
                                "key" => ref_key = literal_in(tokens, v),
                                _ => {}
                            }
                        }
                        if let (Some(model), Some(key)) = (model, ref_key) {
                            reference = Some(format!(" REFERENCES {model}({key})"));
                        }
                    }
                }
                _ => {}
            }
        }
        let mut type_sql = type_sql?;
        if auto_increment {
            type_sql = match type_sql.as_str() {
                "bigint" => "bigserial".to_string(),
                "smallint" => "smallserial".to_string(),
                _ => "serial".to_string(),
            };
        }
        if let Some(reference) = reference {
            clauses.push_str(&reference);
        }
        Some(format!("{type_sql}{clauses}"))
    } else {
        datatype_sql(tokens, range)
    }
}

fn type_only(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    if let Some(open) = object_open(tokens, range.clone()) {
        object_entries(tokens, open)
            .into_iter()
            .find(|(key, _)| key == "type")
            .and_then(|(_, value)| datatype_sql(tokens, value))
    } else {
        datatype_sql(tokens, range)
    }
}

fn allow_null_in(tokens: &[Token], range: std::ops::Range<usize>) -> Option<bool> {
    let open = object_open(tokens, range)?;
    object_entries(tokens, open)
        .into_iter()
        .find(|(key, _)| key == "allowNull")
        .and_then(|(_, value)| match tokens[value].first() {
            Some(t) if t.is_ident("true") => Some(true),
            Some(t) if t.is_ident("false") => Some(false),
            _ => None,
        })
}

/// `DataTypes.STRING`, `Sequelize.STRING(100)`, `DataTypes.DECIMAL(10, 2)`.
fn datatype_sql(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    let slice = &tokens[range.clone()];
    // last identifier in the member chain is the datatype
    let (ix, datatype) = slice
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Ident)
        .last()?;
    let mut params: Vec<String> = Vec::new();
    if slice.get(ix + 1).map(|t| t.is_punct('(')).unwrap_or(false) {
        let (args, _) = call_args(tokens, range.start + ix + 1)?;
        for arg in args {
            match tokens[arg].first() {
                Some(t) if t.kind == TokenKind::Number => params.push(t.text.clone()),
                _ => {}
            }
        }
    }
    let sql = match datatype.text.as_str() {
        "STRING" => match params.first() {
            Some(n) => format!("varchar({n})"),
            None => "varchar(255)".to_string(),
        },
        "CHAR" => match params.first() {
            Some(n) => format!("char({n})"),
            None => "char(255)".to_string(),
        },
        "TEXT" => "text".to_string(),
        "INTEGER" => "integer".to_string(),
        "BIGINT" => "bigint".to_string(),
        "SMALLINT" => "smallint".to_string(),
        "FLOAT" | "REAL" => "real".to_string(),
        "DOUBLE" => "double precision".to_string(),
        "DECIMAL" | "NUMERIC" => match (params.first(), params.get(1)) {
            (Some(p), Some(s)) => format!("numeric({p},{s})"),
            (Some(p), None) => format!("numeric({p})"),
            _ => "numeric".to_string(),
        },
        "BOOLEAN" => "boolean".to_string(),
        "DATE" => "timestamptz".to_string(),
        "DATEONLY" => "date".to_string(),
        "TIME" => "time".to_string(),
        "UUID" => "uuid".to_string(),
        "JSON" => "json".to_string(),
        "JSONB" => "jsonb".to_string(),
        "BLOB" => "bytea".to_string(),
        "ENUM" => "text".to_string(),
        other => other.to_lowercase(),
    };
    Some(sql)
}

fn default_sql(tokens: &[Token], range: std::ops::Range<usize>) -> String {
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

fn literal_in(tokens: &[Token], range: std::ops::Range<usize>) -> Option<String> {
    match &tokens[range] {
        [only] => only.literal_value().map(|s| s.to_string()),
        _ => None,
    }
}

/// Index of the `{` opening an object literal, if the range is one.
fn object_open(tokens: &[Token], range: std::ops::Range<usize>) -> Option<usize> {
    let first = range.clone().find(|ix| !tokens[*ix].is_punct('('))?;
    tokens[first].is_punct('{').then_some(first)
}

/// Split the object literal opened at `open` into `(key, value-range)`
/// pairs at top-level commas.
fn object_entries(tokens: &[Token], open: usize) -> Vec<(String, std::ops::Range<usize>)> {
    let Some(close) = matching(tokens, open) else {
        return vec![];
    };
    let mut entries = Vec::new();
    let mut ix = open + 1;
    while ix < close {
        // key
        let key = match &tokens[ix].kind {
            TokenKind::Ident | TokenKind::Str => tokens[ix].text.clone(),
            _ => {
                ix += 1;
                continue;
            }
        };
        if !tokens.get(ix + 1).map(|t| t.is_punct(':')).unwrap_or(false) {
            ix += 1;
            continue;
        }
        let value_start = ix + 2;
        let mut jx = value_start;
        while jx < close {
            match tokens[jx].kind {
                TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => {
                    jx = matching(tokens, jx).unwrap_or(close);
                }
                TokenKind::Punct(',') => break,
                _ => {}
            }
            jx += 1;
        }
        entries.push((key, value_start..jx.min(close)));
        ix = jx + 1;
    }
    entries
}

/// `['a', 'b']` as a list of strings.
fn string_array(tokens: &[Token], range: std::ops::Range<usize>) -> Option<Vec<String>> {
    let first = range.clone().find(|ix| !tokens[*ix].is_punct('('))?;
    if !tokens[first].is_punct('[') {
        return None;
    }
    let close = matching(tokens, first)?;
    let mut values = Vec::new();
    for token in &tokens[first + 1..close] {
        match &token.kind {
            TokenKind::Str => values.push(token.text.clone()),
            TokenKind::Punct(',') => {}
            _ => return None,
        }
    }
    Some(values)
}

/// Locate `up` in the forms sequelize migrations use: an object method
/// (`async up(queryInterface) {}`), an object property (`up: async () =>`)
/// or an `exports.up =` assignment.
fn find_up_function(tokens: &[Token]) -> Option<usize> {
    (0..tokens.len()).find(|&ix| {
        if !tokens[ix].is_ident("up") {
            return false;
        }
        let not_member = ix == 0 || !tokens[ix - 1].is_punct('.');
        let method_form = not_member
            && tokens.get(ix + 1).map(|t| t.is_punct('(')).unwrap_or(false);
        let property_form = not_member
            && tokens.get(ix + 1).map(|t| t.is_punct(':')).unwrap_or(false);
        let exports_form = ix > 1
            && tokens[ix - 1].is_punct('.')
            && tokens[ix - 2].is_ident("exports")
            && tokens.get(ix + 1).map(|t| t.is_punct('=')).unwrap_or(false);
        method_form || property_form || exports_form
    })
}
