//! pgfence is a static safety analyzer for PostgreSQL schema migrations.
//!
//! It parses migration files with the real PostgreSQL grammar, reports the
//! lock each DDL statement acquires and what that lock blocks, assigns a
//! calibrated risk level (optionally adjusted by table size), checks
//! migration-wide policies with a transaction state machine, and emits
//! concrete safe-rewrite recipes. Reports target human review, JSON
//! consumers, pull-request comments and SARIF code scanning; a non-zero
//! exit gates merges above a configurable risk ceiling.

/// The per-file pipeline: parse, rules, policy, visibility, risk, aggregate.
pub mod analyzer;
/// `-- pgfence-ignore` comment directives.
pub mod comments;
/// Immutable configuration assembled by the CLI front-end.
pub mod config;
pub mod error;
/// Extractors that lift SQL out of migration source files.
pub mod extract;
/// Report generation: terminal table, JSON, GitHub Markdown, SARIF.
/// This module is the best documentation of the output formats and can be
/// considered a public api for the library.
pub mod output;
/// The parser adapter over `pg_query`.
pub mod parser;
/// Types that directly translate to postgres concepts like lock modes.
pub mod pg_types;
/// Plugin rule registry with a per-statement failure boundary.
pub mod plugins;
/// The file-scope policy engine and its transaction state machine.
pub mod policy;
/// Static metadata for the built-in rule catalogue.
pub mod rule_data;
/// The statement-level rule engine and built-in catalogue.
pub mod rules;
/// Schema snapshots from the external introspection collaborator.
pub mod snapshot;
/// Table statistics and the row-count risk adjuster.
pub mod stats;
/// Suppression of findings that target tables created earlier in the batch.
pub mod visibility;

pub type Result<T> = std::result::Result<T, error::Error>;

pub use analyzer::{ci_gate_fails, AnalysisResult, Analyzer, FileInput};
pub use config::AnalyzerConfig;
pub use extract::{detect_format, extract_file, extract_source, Extraction, SourceFormat};
pub use pg_types::lock_modes::LockMode;
pub use pg_types::risk::RiskLevel;
