use std::fmt::Write;

use crate::analyzer::AnalysisResult;
use crate::output::coverage;

/// Render the human-review table: one block per file with aligned finding
/// rows, followed by policy violations, extraction warnings and the batch
/// coverage line.
pub fn render(results: &[AnalysisResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(
            out,
            "{} ({} statements, max risk: {})",
            result.path, result.statement_count, result.max_risk
        );
        if !result.checks.is_empty() {
            let headers = ["RISK", "LOCK", "RULE", "TABLE"];
            let rows: Vec<[String; 4]> = result
                .checks
                .iter()
                .map(|check| {
                    [
                        check.effective_risk().to_string(),
                        check
                            .lock
                            .map(|mode| mode.as_sql_str().to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        check.rule_id.clone(),
                        check.table.clone().unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            let widths: Vec<usize> = (0..headers.len())
                .map(|col| {
                    rows.iter()
                        .map(|row| row[col].len())
                        .chain(std::iter::once(headers[col].len()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();
            let _ = writeln!(
                out,
                "  {:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  MESSAGE",
                headers[0],
                headers[1],
                headers[2],
                headers[3],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
            );
            for (row, check) in rows.iter().zip(result.checks.iter()) {
                let _ = writeln!(
                    out,
                    "  {:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {}",
                    row[0],
                    row[1],
                    row[2],
                    row[3],
                    check.message,
                    w0 = widths[0],
                    w1 = widths[1],
                    w2 = widths[2],
                    w3 = widths[3],
                );
                if let Some(rewrite) = &check.safe_rewrite {
                    let _ = writeln!(out, "      rewrite: {}", rewrite.description);
                    for step in &rewrite.steps {
                        let _ = writeln!(out, "        {step}");
                    }
                }
            }
        }
        for violation in &result.violations {
            let _ = writeln!(
                out,
                "  {:?}: {} [{}]",
                violation.severity, violation.message, violation.rule_id
            );
            let _ = writeln!(out, "      fix: {}", violation.suggested_fix);
        }
        for warning in &result.warnings {
            let _ = writeln!(
                out,
                "  warning: {}:{}:{} {}",
                warning.path, warning.line, warning.column, warning.message
            );
        }
        let _ = writeln!(out);
    }
    let coverage = coverage(results);
    let _ = writeln!(
        out,
        "Coverage: {}% ({} statements, {} dynamic)",
        coverage.coverage_percent, coverage.total_statements, coverage.dynamic_statements
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, FileInput};
    use crate::config::AnalyzerConfig;
    use crate::extract::Extraction;
    use crate::plugins::PluginRegistry;

    fn analyze(sql: &str) -> Vec<AnalysisResult> {
        let config = AnalyzerConfig::default();
        let plugins = PluginRegistry::new();
        Analyzer::new(&config, None, &plugins)
            .analyze_batch(&[FileInput {
                path: "m.sql".to_string(),
                extraction: Extraction {
                    sql: sql.to_string(),
                    warnings: vec![],
                    auto_commit: false,
                },
            }])
            .unwrap()
    }

    #[test]
    fn renders_file_header_and_rows() {
        let text = render(&analyze("DROP TABLE old_data;"));
        assert!(text.contains("m.sql (1 statements, max risk: critical)"));
        assert!(text.contains("drop-table"));
        assert!(text.contains("ACCESS EXCLUSIVE"));
        assert!(text.contains("Coverage: 100% (1 statements, 0 dynamic)"));
    }

    #[test]
    fn includes_rewrite_steps() {
        let text = render(&analyze("TRUNCATE audit_log;"));
        assert!(text.contains("rewrite:"));
    }
}
