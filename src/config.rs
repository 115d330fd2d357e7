use crate::pg_types::risk::RiskLevel;
use crate::snapshot::SnapshotIndex;

/// Immutable configuration for one analyzer run, assembled by the caller
/// (the CLI front-end or a test). The core never reads configuration files.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Lowest PostgreSQL major version the migration must be safe on.
    pub min_pg_version: u32,
    /// Highest acceptable per-file risk before the CI gate trips.
    pub max_risk: RiskLevel,
    pub require_lock_timeout: bool,
    pub require_statement_timeout: bool,
    /// Ceiling for an accepted `SET lock_timeout`, in milliseconds.
    pub max_lock_timeout_ms: u64,
    /// Ceiling for an accepted `SET statement_timeout`, in milliseconds.
    pub max_statement_timeout_ms: u64,
    /// Rule IDs to drop from results.
    pub disabled_rules: Vec<String>,
    /// When non-empty, only these rule IDs are kept.
    pub enabled_rules: Vec<String>,
    /// Width for statement previews embedded in messages.
    pub preview_width: usize,
    /// Optional schema snapshot for advisory checks.
    pub snapshot: Option<SnapshotIndex>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            min_pg_version: 11,
            max_risk: RiskLevel::High,
            require_lock_timeout: true,
            require_statement_timeout: true,
            max_lock_timeout_ms: 5_000,
            max_statement_timeout_ms: 600_000,
            disabled_rules: vec![],
            enabled_rules: vec![],
            preview_width: 100,
            snapshot: None,
        }
    }
}

impl AnalyzerConfig {
    /// Whether results for `rule_id` survive the enable/disable selection.
    /// Runs after every rule has fired; rules never consult this themselves.
    pub fn rule_selected(&self, rule_id: &str) -> bool {
        if self.disabled_rules.iter().any(|id| id == rule_id) {
            return false;
        }
        self.enabled_rules.is_empty() || self.enabled_rules.iter().any(|id| id == rule_id)
    }
}
