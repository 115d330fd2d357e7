use std::path::Path;

use crate::error::ContextualResult;

/// Shared JS/TS token scanner the ORM extractors build on.
pub mod js;
/// Knex migration extractor and schema-builder transpiler.
pub mod knex;
/// Sequelize migration extractor and queryInterface transpiler.
pub mod sequelize;
/// TypeORM migration extractor.
pub mod typeorm;

/// Sentinel expression substituted for defaults the extractors cannot
/// evaluate, so the analyzer classifies them as non-constant.
pub const VOLATILE_EXPR: &str = "pgfence_volatile_expr()";

/// A migration source format the extractors recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Sql,
    Prisma,
    Drizzle,
    TypeOrm,
    Knex,
    Sequelize,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Sql => "sql",
            SourceFormat::Prisma => "prisma",
            SourceFormat::Drizzle => "drizzle",
            SourceFormat::TypeOrm => "typeorm",
            SourceFormat::Knex => "knex",
            SourceFormat::Sequelize => "sequelize",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "sql" => Some(SourceFormat::Sql),
            "prisma" => Some(SourceFormat::Prisma),
            "drizzle" => Some(SourceFormat::Drizzle),
            "typeorm" => Some(SourceFormat::TypeOrm),
            "knex" => Some(SourceFormat::Knex),
            "sequelize" => Some(SourceFormat::Sequelize),
            _ => None,
        }
    }
}

/// A position-pinned warning about SQL the extractor could not analyze:
/// dynamic fragments, conditional sites, unanalyzable blocks. Recovered
/// locally, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    pub path: String,
    /// 1-based.
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// What an extractor produces from one migration source file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub sql: String,
    pub warnings: Vec<ExtractionWarning>,
    /// The host migration framework has disabled its wrapping transaction,
    /// so each statement commits on its own and locks do not accumulate.
    pub auto_commit: bool,
}

/// Pick a format for a file by extension and content probes.
pub fn detect_format(path: &str, source: &str) -> SourceFormat {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension == "sql" {
        return SourceFormat::Sql;
    }
    if matches!(extension.as_str(), "ts" | "js" | "mjs" | "cjs") {
        if source.contains("MigrationInterface") || source.contains("queryRunner") {
            return SourceFormat::TypeOrm;
        }
        if source.contains("queryInterface") {
            return SourceFormat::Sequelize;
        }
        if source.contains("knex") || source.contains("exports.up") {
            return SourceFormat::Knex;
        }
    }
    SourceFormat::Sql
}

/// Strip a UTF-8 byte-order mark.
fn strip_bom(source: &str) -> &str {
    source.strip_prefix('\u{feff}').unwrap_or(source)
}

/// Extract SQL from an in-memory source. Pure; the only I/O lives in
/// [extract_file].
pub fn extract_source(format: SourceFormat, path: &str, source: &str) -> Extraction {
    let source = strip_bom(source);
    match format {
        SourceFormat::Sql | SourceFormat::Prisma | SourceFormat::Drizzle => Extraction {
            sql: source.to_string(),
            warnings: vec![],
            auto_commit: false,
        },
        SourceFormat::TypeOrm => typeorm::extract(path, source),
        SourceFormat::Knex => knex::extract(path, source),
        SourceFormat::Sequelize => sequelize::extract(path, source),
    }
}

/// Read a migration file and extract its SQL, detecting the format when
/// `format` is `None`.
pub fn extract_file(format: Option<SourceFormat>, path: &str) -> crate::Result<Extraction> {
    let source =
        std::fs::read_to_string(path).with_context(format!("reading migration file: {path}"))?;
    let format = format.unwrap_or_else(|| detect_format(path, &source));
    Ok(extract_source(format, path, &source))
}

/// Push a warning for a dynamic SQL site.
pub(crate) fn dynamic_sql_warning(
    warnings: &mut Vec<ExtractionWarning>,
    path: &str,
    line: usize,
    column: usize,
    message: impl Into<String>,
) {
    warnings.push(ExtractionWarning {
        path: path.to_string(),
        line,
        column,
        message: message.into(),
    });
}

/// Push the conditional-SQL warning for a lifted statement at depth > 0.
pub(crate) fn conditional_sql_warning(
    warnings: &mut Vec<ExtractionWarning>,
    path: &str,
    line: usize,
    column: usize,
) {
    warnings.push(ExtractionWarning {
        path: path.to_string(),
        line,
        column,
        message: format!(
            "Conditional SQL at line {line} — statement may or may not execute depending on \
             runtime condition"
        ),
    });
}

/// Join lifted statements into one SQL text, terminating each.
pub(crate) fn join_statements(statements: &[String]) -> String {
    statements
        .iter()
        .map(|s| {
            let trimmed = s.trim();
            if trimmed.ends_with(';') {
                trimmed.to_string()
            } else {
                format!("{trimmed};")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bom_is_stripped_for_raw_sql() {
        let extraction = extract_source(SourceFormat::Sql, "m.sql", "\u{feff}SELECT 1;");
        assert_eq!(extraction.sql, "SELECT 1;");
        assert!(extraction.warnings.is_empty());
        assert!(!extraction.auto_commit);
    }

    #[test]
    fn detects_by_extension_and_content() {
        assert_eq!(detect_format("0001_init.sql", "whatever"), SourceFormat::Sql);
        assert_eq!(
            detect_format(
                "1700000000-AddUsers.ts",
                "export class AddUsers implements MigrationInterface {}"
            ),
            SourceFormat::TypeOrm
        );
        assert_eq!(
            detect_format("20240101-add.js", "module.exports = { up: (queryInterface) => {} }"),
            SourceFormat::Sequelize
        );
        assert_eq!(
            detect_format("20240101_add.js", "exports.up = function (knex) {}"),
            SourceFormat::Knex
        );
        // unrecognized host-language content falls back to raw SQL
        assert_eq!(
            detect_format("helper.js", "console.log('hello');"),
            SourceFormat::Sql
        );
    }

    #[test]
    fn join_statements_terminates_each() {
        let joined = join_statements(&[
            "SELECT 1".to_string(),
            "SELECT 2;".to_string(),
            "  SELECT 3  ".to_string(),
        ]);
        assert_eq!(joined, "SELECT 1;\nSELECT 2;\nSELECT 3;");
    }
}
