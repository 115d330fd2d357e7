use itertools::Itertools;

use crate::comments::suppresses;
use crate::config::AnalyzerConfig;
use crate::parser::{preview, ParsedStatement};
use crate::pg_types::lock_modes::{BlockedOperations, LockMode};
use crate::pg_types::risk::RiskLevel;
use crate::rule_data::{RuleId, StaticRuleData};

/// The `ast` module describes parsed statements in a structured way, using
/// simpler trees than the ones provided by `pg_query`.
pub mod ast;
/// The built-in rule catalogue.
pub mod catalog;

/// An ordered, concrete recipe for achieving the same schema change safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeRewrite {
    pub description: String,
    pub steps: Vec<String>,
}

/// The output unit of a rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub statement: String,
    pub preview: String,
    /// Unqualified, case-folded table this finding targets, when known.
    pub table: Option<String>,
    pub lock: Option<LockMode>,
    pub blocked: Option<BlockedOperations>,
    pub base_risk: RiskLevel,
    /// Set by the risk adjuster when table stats are available.
    pub adjusted_risk: Option<RiskLevel>,
    pub message: String,
    pub rule_id: String,
    pub safe_rewrite: Option<SafeRewrite>,
    pub applies_to_new_tables: bool,
}

impl CheckResult {
    pub fn effective_risk(&self) -> RiskLevel {
        self.adjusted_risk.unwrap_or(self.base_risk)
    }
}

/// A builder the catalogue uses so every finding carries consistent
/// statement text, preview and blocked-operations data.
pub struct Findings<'a> {
    statement: &'a ParsedStatement,
    config: &'a AnalyzerConfig,
    out: Vec<CheckResult>,
}

impl<'a> Findings<'a> {
    pub fn new(statement: &'a ParsedStatement, config: &'a AnalyzerConfig) -> Self {
        Findings {
            statement,
            config,
            out: vec![],
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.config
    }

    pub fn statement(&self) -> &ParsedStatement {
        self.statement
    }

    pub fn push(
        &mut self,
        meta: &'static StaticRuleData,
        table: Option<String>,
        lock: Option<LockMode>,
        risk: RiskLevel,
        message: String,
        safe_rewrite: Option<SafeRewrite>,
    ) {
        self.out.push(CheckResult {
            statement: self.statement.sql.clone(),
            preview: preview(&self.statement.sql, self.config.preview_width),
            table,
            lock,
            blocked: lock.map(|mode| mode.blocked_operations()),
            base_risk: risk,
            adjusted_risk: None,
            message,
            rule_id: meta.id.to_string(),
            safe_rewrite,
            applies_to_new_tables: meta.applies_to_new_tables,
        });
    }

    pub fn into_results(self) -> Vec<CheckResult> {
        self.out
    }
}

/// A statement-level rule: a pure function from one parsed statement to
/// zero or more findings. All rule state lives in the policy engine.
pub struct Rule {
    pub meta: &'static StaticRuleData,
    pub check: fn(&mut Findings),
}

impl RuleId for Rule {
    fn id(&self) -> &str {
        self.meta.id
    }
}

/// Run every built-in rule on one statement. Selection (config
/// enable/disable, inline suppression) happens on the emitted results, not
/// by skipping rules.
pub fn run_rules(statement: &ParsedStatement, config: &AnalyzerConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();
    for rule in catalog::all_rules() {
        let mut findings = Findings::new(statement, config);
        (rule.check)(&mut findings);
        results.extend(findings.into_results());
    }
    select(results, statement, config)
}

/// Drop findings the config disables or an inline directive suppresses.
pub fn select(
    results: Vec<CheckResult>,
    statement: &ParsedStatement,
    config: &AnalyzerConfig,
) -> Vec<CheckResult> {
    results
        .into_iter()
        .filter(|result| config.rule_selected(&result.rule_id))
        .filter(|result| !suppresses(statement.suppressed.as_deref(), &result.rule_id))
        .collect_vec()
}
