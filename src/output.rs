use serde::Serialize;

use crate::analyzer::AnalysisResult;
use crate::extract::ExtractionWarning;
use crate::policy::PolicyViolation;
use crate::rules::CheckResult;

/// GitHub-flavoured Markdown for PR comments.
pub mod github;
/// The machine-readable JSON envelope.
pub mod json;
/// SARIF 2.1.0 for code scanning.
pub mod sarif;
/// The aligned table for human review.
pub mod terminal;

/// Serializable mirror of [CheckResult] for reports; the public wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOut {
    pub rule_id: String,
    pub statement: String,
    pub preview: String,
    pub table: Option<String>,
    pub lock: Option<&'static str>,
    pub blocks: Option<BlockedOut>,
    pub risk: &'static str,
    pub adjusted_risk: Option<&'static str>,
    pub effective_risk: &'static str,
    pub message: String,
    pub safe_rewrite: Option<SafeRewriteOut>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedOut {
    pub reads: bool,
    pub writes: bool,
    pub other_ddl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeRewriteOut {
    pub description: String,
    pub steps: Vec<String>,
}

impl From<&CheckResult> for CheckOut {
    fn from(check: &CheckResult) -> Self {
        CheckOut {
            rule_id: check.rule_id.clone(),
            statement: check.statement.clone(),
            preview: check.preview.clone(),
            table: check.table.clone(),
            lock: check.lock.map(|mode| mode.as_sql_str()),
            blocks: check.blocked.map(|blocked| BlockedOut {
                reads: blocked.reads,
                writes: blocked.writes,
                other_ddl: blocked.other_ddl,
            }),
            risk: check.base_risk.as_str(),
            adjusted_risk: check.adjusted_risk.map(|risk| risk.as_str()),
            effective_risk: check.effective_risk().as_str(),
            message: check.message.clone(),
            safe_rewrite: check.safe_rewrite.as_ref().map(|rewrite| SafeRewriteOut {
                description: rewrite.description.clone(),
                steps: rewrite.steps.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationOut {
    pub rule_id: String,
    pub severity: crate::policy::Severity,
    pub message: String,
    pub suggested_fix: String,
}

impl From<&PolicyViolation> for ViolationOut {
    fn from(violation: &PolicyViolation) -> Self {
        ViolationOut {
            rule_id: violation.rule_id.clone(),
            severity: violation.severity,
            message: violation.message.clone(),
            suggested_fix: violation.suggested_fix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningOut {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl From<&ExtractionWarning> for WarningOut {
    fn from(warning: &ExtractionWarning) -> Self {
        WarningOut {
            file: warning.path.clone(),
            line: warning.line,
            column: warning.column,
            message: warning.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub statement_count: usize,
    pub max_risk: &'static str,
    pub checks: Vec<CheckOut>,
    pub policy_violations: Vec<ViolationOut>,
    pub extraction_warnings: Vec<WarningOut>,
}

impl From<&AnalysisResult> for FileReport {
    fn from(result: &AnalysisResult) -> Self {
        FileReport {
            path: result.path.clone(),
            statement_count: result.statement_count,
            max_risk: result.max_risk.as_str(),
            checks: result.checks.iter().map(CheckOut::from).collect(),
            policy_violations: result.violations.iter().map(ViolationOut::from).collect(),
            extraction_warnings: result.warnings.iter().map(WarningOut::from).collect(),
        }
    }
}

/// Coverage is the primary trust signal: how much of the migration the
/// analyzer actually saw. Never inflated: every dynamic site counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub total_statements: usize,
    pub dynamic_statements: usize,
    pub coverage_percent: u32,
}

pub fn coverage(results: &[AnalysisResult]) -> Coverage {
    let total: usize = results.iter().map(|r| r.statement_count).sum();
    let dynamic: usize = results.iter().map(|r| r.warnings.len()).sum();
    let percent = if total == 0 {
        100
    } else {
        let analyzed = total.saturating_sub(dynamic) as f64;
        (analyzed / total as f64 * 100.0).round() as u32
    };
    Coverage {
        total_statements: total,
        dynamic_statements: dynamic,
        coverage_percent: percent,
    }
}
