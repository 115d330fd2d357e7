use std::panic::{catch_unwind, AssertUnwindSafe};

use log::warn;

use crate::config::AnalyzerConfig;
use crate::error::InnerError;
use crate::parser::ParsedStatement;
use crate::rules::CheckResult;

/// Prefix every plugin rule ID must carry, to keep the namespace disjoint
/// from the built-in catalogue.
pub const PLUGIN_PREFIX: &str = "plugin:";

/// A rule contributed by a plugin. Implementations run inside a failure
/// boundary: a panic drops that plugin's findings for the statement and the
/// batch continues.
pub trait PluginRule {
    /// Must start with `plugin:`.
    fn id(&self) -> &str;
    fn check(&self, statement: &ParsedStatement, config: &AnalyzerConfig) -> Vec<CheckResult>;
}

pub struct Plugin {
    pub name: String,
    pub rules: Vec<Box<dyn PluginRule>>,
}

/// Registered plugins. Loading I/O lives with the embedding; the registry
/// only validates and runs what it is handed.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, rejecting missing `plugin:` prefixes and rule ID
    /// collisions with anything already registered.
    pub fn register(&mut self, plugin: Plugin) -> crate::Result<()> {
        for rule in &plugin.rules {
            let id = rule.id();
            if !id.starts_with(PLUGIN_PREFIX) {
                return Err(InnerError::PluginIdMissingPrefix(format!(
                    "{} (from plugin {})",
                    id, plugin.name
                ))
                .into());
            }
            if self.known_ids().any(|existing| existing == id) {
                return Err(InnerError::PluginIdCollision(id.to_string()).into());
            }
        }
        self.plugins.push(plugin);
        Ok(())
    }

    fn known_ids(&self) -> impl Iterator<Item = &str> {
        self.plugins
            .iter()
            .flat_map(|p| p.rules.iter().map(|r| r.id()))
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// All registered rule IDs, for reporter registration.
    pub fn rule_ids(&self) -> Vec<String> {
        self.known_ids().map(|id| id.to_string()).collect()
    }

    /// Run every plugin rule on one statement. A panicking rule is logged
    /// and its findings for this statement discarded.
    pub fn run(&self, statement: &ParsedStatement, config: &AnalyzerConfig) -> Vec<CheckResult> {
        let mut results = Vec::new();
        for plugin in &self.plugins {
            for rule in &plugin.rules {
                match catch_unwind(AssertUnwindSafe(|| rule.check(statement, config))) {
                    Ok(findings) => results.extend(findings),
                    Err(_) => {
                        warn!(
                            "plugin {} rule {} panicked on `{}`; findings dropped",
                            plugin.name,
                            rule.id(),
                            statement.sql
                        );
                    }
                }
            }
        }
        results
    }
}
