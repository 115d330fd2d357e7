use log::debug;

use crate::comments::find_suppressions;
use crate::error::ContextualResult;
use crate::rules::ast::{self, StatementSummary};

/// One statement of a migration file, as produced by the parser adapter.
/// Read-only after construction.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    /// Trimmed statement text, trailing semicolon stripped.
    pub sql: String,
    /// The grammar's node tag, e.g. `AlterTableStmt`.
    pub kind: &'static str,
    /// Simplified AST body.
    pub summary: StatementSummary,
    /// Rule IDs suppressed for this statement; `"*"` suppresses all.
    pub suppressed: Option<Vec<String>>,
}

/// Split a migration file into [ParsedStatement]s using the PostgreSQL
/// grammar. Parse errors propagate; empty input yields an empty list.
///
/// Suppression directives are collected from the region between the previous
/// statement's end and this statement's end, so a directive binds to the
/// single statement following it and never bleeds further.
pub fn parse_sql(sql: &str) -> crate::Result<Vec<ParsedStatement>> {
    if sql.trim().is_empty() {
        return Ok(vec![]);
    }
    let fragments = pg_query::split_with_parser(sql).with_context("splitting migration file")?;
    let mut statements = Vec::with_capacity(fragments.len());
    let mut cursor = 0usize;
    for fragment in fragments {
        let text = trim_leading_comments(fragment).trim();
        if text.is_empty() {
            continue;
        }
        // split_with_parser hands back subslices of the input, so the offset
        // can be recovered by searching from the running cursor.
        let offset = sql[cursor..]
            .find(fragment)
            .map(|ix| cursor + ix)
            .unwrap_or(cursor);
        let end = offset + fragment.len();
        let lookback = &sql[cursor..end];
        cursor = end;

        let suppressed = find_suppressions(lookback);
        let parsed = pg_query::parse(text)
            .with_context(format!("parsing statement: {}", preview(text, 80)))?;
        for raw in parsed.protobuf.stmts.iter() {
            if let Some(node) = raw.stmt.as_ref().and_then(|stmt| stmt.node.as_ref()) {
                let node_ref = node.to_ref();
                let kind = ast::node_tag(&node_ref);
                let summary = ast::describe(&node_ref)
                    .with_context(format!("describing statement: {}", preview(text, 80)))?;
                debug!("parsed {kind}: {}", preview(text, 60));
                statements.push(ParsedStatement {
                    sql: text.trim_end_matches(';').trim().to_string(),
                    kind,
                    summary,
                    suppressed: suppressed.clone(),
                });
            }
        }
    }
    Ok(statements)
}

/// Format a statement for display in messages: strip comments, collapse
/// whitespace runs, truncate at `width` with a trailing `...`.
pub fn preview(sql: &str, width: usize) -> String {
    let stripped = strip_comments(sql);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > width {
        let cut: String = collapsed.chars().take(width).collect();
        format!("{}...", cut.trim_end())
    } else {
        collapsed
    }
}

/// Drop whitespace, `--` lines and `/* ... */` blocks from the front of a
/// statement fragment, so the preserved text starts at the statement proper.
fn trim_leading_comments(fragment: &str) -> &str {
    let mut rest = fragment;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(ix) => &after[ix + 1..],
                None => "",
            };
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(ix) => &after[ix + 2..],
                None => "",
            };
        } else {
            return trimmed;
        }
    }
}

/// Strip `--` line comments and `/* ... */` block comments.
fn strip_comments(sql: &str) -> String {
    let mut content = sql.chars().peekable();
    let mut result = String::new();

    while let Some(c) = content.next() {
        let next = content.peek().copied();
        match (c, next) {
            ('-', Some('-')) => {
                for c in content.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                content.next();
                while let Some(c) = content.next() {
                    if c == '*' && content.peek().copied() == Some('/') {
                        content.next();
                        break;
                    }
                }
            }
            (ch, _) => {
                result.push(ch);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_input_yields_no_statements() {
        assert!(parse_sql("").unwrap().is_empty());
        assert!(parse_sql("   \n\n").unwrap().is_empty());
    }

    #[test]
    fn parse_error_propagates() {
        assert!(parse_sql("ALTER TABEL users DROP x;").is_err());
    }

    #[test]
    fn statements_are_trimmed_without_semicolon() {
        let statements = parse_sql("SELECT 1;\n  SELECT 2  ;").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].sql, "SELECT 1");
        assert_eq!(statements[1].sql, "SELECT 2");
    }

    #[test]
    fn kind_tags() {
        let statements =
            parse_sql("ALTER TABLE t ADD COLUMN c int; CREATE INDEX i ON t (c);").unwrap();
        assert_eq!(statements[0].kind, "AlterTableStmt");
        assert_eq!(statements[1].kind, "IndexStmt");
    }

    #[test]
    fn directive_attaches_to_next_statement_only() {
        let sql = "-- pgfence-ignore: drop-table\nDROP TABLE a;\nDROP TABLE b;";
        let statements = parse_sql(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].suppressed,
            Some(vec!["drop-table".to_string()])
        );
        assert_eq!(statements[1].suppressed, None);
    }

    #[test]
    fn bare_directive_suppresses_all() {
        let sql = "-- pgfence-ignore\nDROP TABLE a;";
        let statements = parse_sql(sql).unwrap();
        assert_eq!(statements[0].suppressed, Some(vec!["*".to_string()]));
    }

    #[test]
    fn directive_in_gap_between_statements() {
        let sql = "SELECT 1;\n-- pgfence-ignore: truncate\nTRUNCATE t;";
        let statements = parse_sql(sql).unwrap();
        assert_eq!(statements[0].suppressed, None);
        assert_eq!(statements[1].suppressed, Some(vec!["truncate".to_string()]));
    }

    #[test]
    fn directive_does_not_bleed_past_following_statement() {
        let sql = "-- pgfence-ignore\nSELECT 1;\nDROP TABLE a;";
        let statements = parse_sql(sql).unwrap();
        assert_eq!(statements[0].suppressed, Some(vec!["*".to_string()]));
        assert_eq!(statements[1].suppressed, None);
    }

    #[test]
    fn preview_strips_comments_and_collapses_whitespace() {
        let sql = "ALTER TABLE users /* add it */\n  ADD COLUMN -- trailing\n  c int";
        assert_eq!(preview(sql, 80), "ALTER TABLE users ADD COLUMN c int");
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let long = "SELECT aaaaaaaaaa, bbbbbbbbbb, cccccccccc FROM somewhere";
        let shortened = preview(long, 20);
        assert!(shortened.ends_with("..."));
        assert!(shortened.chars().count() <= 24);
    }

    #[test]
    fn leading_comments_are_not_part_of_statement_text() {
        let sql = "SELECT 1;\n-- a note\n/* block */\nDROP TABLE a;";
        let statements = parse_sql(sql).unwrap();
        assert_eq!(statements[1].sql, "DROP TABLE a");
    }

    #[test]
    fn summary_is_attached() {
        let statements = parse_sql("TRUNCATE audit_log;").unwrap();
        assert!(matches!(
            &statements[0].summary,
            StatementSummary::Truncate { tables, .. } if tables == &vec!["audit_log".to_string()]
        ));
    }
}
