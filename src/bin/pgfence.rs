use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::generate;
use clap_complete::Shell::{Bash, Elvish, Fish, PowerShell, Zsh};
use log::warn;
use serde::Serialize;

use pgfence::analyzer::{ci_gate_fails, Analyzer, FileInput};
use pgfence::config::AnalyzerConfig;
use pgfence::extract::{extract_file, SourceFormat};
use pgfence::output;
use pgfence::pg_types::lock_modes::{LockMode, LOCK_MODES};
use pgfence::pg_types::risk::RiskLevel;
use pgfence::plugins::PluginRegistry;
use pgfence::rule_data;
use pgfence::snapshot::SnapshotIndex;
use pgfence::stats::StatsSnapshot;

#[derive(Parser)]
#[command(name = "pgfence")]
#[command(about = "Static safety analyzer for PostgreSQL schema migrations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "pgfence parses migration files with the PostgreSQL grammar and reports
which lock each DDL statement acquires, what that lock blocks, how risky
the statement is for a live application, and how to rewrite the dangerous
ones safely. Use --ci to gate merges on a maximum risk level.
"
)]
struct Pgfence {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct AnalyzeOptions {
    /// Migration files to analyze, in application order
    #[arg(name = "paths", required = true)]
    paths: Vec<String>,

    /// Migration source format
    #[arg(long = "format", default_value = "auto", value_parser = clap::builder::PossibleValuesParser::new([
        "sql", "typeorm", "prisma", "knex", "drizzle", "sequelize", "auto",
    ]))]
    format: String,

    /// Report format
    #[arg(short = 'o', long = "output", default_value = "cli", value_parser = clap::builder::PossibleValuesParser::new([
        "cli", "json", "github", "sarif",
    ]))]
    output: String,

    /// Fetch table statistics from this database (read-only, one query)
    #[arg(long = "db-url")]
    db_url: Option<String>,

    /// JSON file with table statistics; ignored when --db-url is given
    #[arg(long = "stats-file")]
    stats_file: Option<String>,

    /// Lowest PostgreSQL major version the migration must be safe on
    #[arg(long = "min-pg-version", default_value_t = 11)]
    min_pg_version: u32,

    /// Highest acceptable risk before --ci exits non-zero
    #[arg(long = "max-risk", default_value = "high")]
    max_risk: String,

    /// Exit 1 when the risk ceiling is exceeded or an error-severity policy
    /// violation is present
    #[arg(long = "ci", default_value_t = false)]
    ci: bool,

    /// Do not require a SET lock_timeout
    #[arg(long = "no-lock-timeout", default_value_t = false)]
    no_lock_timeout: bool,

    /// Do not require a SET statement_timeout
    #[arg(long = "no-statement-timeout", default_value_t = false)]
    no_statement_timeout: bool,

    /// Ceiling for an accepted lock_timeout, in milliseconds
    #[arg(long = "max-lock-timeout", default_value_t = 5_000)]
    max_lock_timeout: u64,

    /// Ceiling for an accepted statement_timeout, in milliseconds
    #[arg(long = "max-statement-timeout", default_value_t = 600_000)]
    max_statement_timeout: u64,

    /// Rule IDs to drop from the results; can be used multiple times
    #[arg(long = "disable-rules", num_args = 1..)]
    disable_rules: Vec<String>,

    /// When given, only these rule IDs are kept; can be used multiple times
    #[arg(long = "enable-rules", num_args = 1..)]
    enable_rules: Vec<String>,

    /// Schema snapshot JSON produced by the introspection collaborator
    #[arg(long = "snapshot")]
    snapshot: Option<String>,

    /// Plugin module paths
    #[arg(long = "plugin", num_args = 1..)]
    plugins: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze migration files and report lock and risk findings
    Analyze(AnalyzeOptions),
    /// List the built-in rule catalogue
    Rules,
    /// List postgres lock modes
    Modes,
    /// Explain what a lock mode conflicts with and blocks
    Explain {
        /// Lock mode to explain, e.g. "ACCESS EXCLUSIVE" or "AccessExclusiveLock"
        mode: String,
    },
    /// Generate shell completions for pgfence
    Completions {
        #[arg(short, long, default_value = "bash", value_parser = clap::builder::PossibleValuesParser::new([
            "bash", "zsh", "fish", "pwsh", "powershell", "elvish",
        ]))]
        shell: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleInfo {
    id: &'static str,
    name: &'static str,
    condition: &'static str,
    applies_to_new_tables: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockModeInfo {
    mode: &'static str,
    db_name: &'static str,
    conflicts_with: Vec<&'static str>,
    blocks_reads: bool,
    blocks_writes: bool,
    blocks_other_ddl: bool,
}

impl From<&LockMode> for LockModeInfo {
    fn from(mode: &LockMode) -> Self {
        LockModeInfo {
            mode: mode.as_sql_str(),
            db_name: mode.to_db_str(),
            conflicts_with: mode.conflicts_with().iter().map(|m| m.as_sql_str()).collect(),
            blocks_reads: mode.blocks_reads(),
            blocks_writes: mode.blocks_writes(),
            blocks_other_ddl: mode.blocks_other_ddl(),
        }
    }
}

fn analyze(opts: AnalyzeOptions) -> Result<i32> {
    let max_risk: RiskLevel = opts
        .max_risk
        .parse()
        .map_err(|_| anyhow!("invalid risk level: {}", opts.max_risk))?;
    let format = match opts.format.as_str() {
        "auto" => None,
        other => Some(
            SourceFormat::from_str_opt(other)
                .ok_or_else(|| anyhow!("invalid format: {other}"))?,
        ),
    };
    let snapshot = opts
        .snapshot
        .as_deref()
        .map(SnapshotIndex::load)
        .transpose()
        .map_err(|e| anyhow!("{e}"))?;
    let stats = match (&opts.db_url, &opts.stats_file) {
        (Some(url), _) => Some(pgfence::stats::fetch_from_db(url).map_err(|e| anyhow!("{e}"))?),
        (None, Some(path)) => Some(StatsSnapshot::load_file(path).map_err(|e| anyhow!("{e}"))?),
        (None, None) => None,
    };
    if !opts.plugins.is_empty() {
        // Plugin modules register through the library embedding API; the
        // standalone binary has nothing to load them with.
        warn!(
            "ignoring --plugin {:?}: the pgfence binary has no plugin host",
            opts.plugins
        );
    }

    let config = AnalyzerConfig {
        min_pg_version: opts.min_pg_version,
        max_risk,
        require_lock_timeout: !opts.no_lock_timeout,
        require_statement_timeout: !opts.no_statement_timeout,
        max_lock_timeout_ms: opts.max_lock_timeout,
        max_statement_timeout_ms: opts.max_statement_timeout,
        disabled_rules: opts.disable_rules.clone(),
        enabled_rules: opts.enable_rules.clone(),
        ..Default::default()
    };
    let config = AnalyzerConfig { snapshot, ..config };

    let mut files = Vec::with_capacity(opts.paths.len());
    for path in &opts.paths {
        let extraction = extract_file(format, path).map_err(|e| anyhow!("{e}"))?;
        files.push(FileInput {
            path: path.clone(),
            extraction,
        });
    }

    let plugins = PluginRegistry::new();
    let results = Analyzer::new(&config, stats.as_ref(), &plugins)
        .analyze_batch(&files)
        .map_err(|e| anyhow!("{e}"))?;

    let report = match opts.output.as_str() {
        "cli" => output::terminal::render(&results),
        "json" => output::json::render(&results).map_err(|e| anyhow!("{e}"))?,
        "github" => output::github::render(&results).map_err(|e| anyhow!("{e}"))?,
        "sarif" => output::sarif::render(&results).map_err(|e| anyhow!("{e}"))?,
        other => return Err(anyhow!("invalid output format: {other}")),
    };
    if !report.trim().is_empty() {
        println!("{report}");
    }

    if opts.ci && ci_gate_fails(&results, max_risk) {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn run() -> Result<i32> {
    let args = Pgfence::parse();
    match args.command {
        Commands::Analyze(opts) => analyze(opts),
        Commands::Rules => {
            let rules: Vec<RuleInfo> = rule_data::ALL
                .iter()
                .map(|data| RuleInfo {
                    id: data.id,
                    name: data.name,
                    condition: data.condition,
                    applies_to_new_tables: data.applies_to_new_tables,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rules)?);
            Ok(0)
        }
        Commands::Modes => {
            let modes: Vec<LockModeInfo> = LOCK_MODES.iter().map(LockModeInfo::from).collect();
            println!("{}", serde_json::to_string_pretty(&modes)?);
            Ok(0)
        }
        Commands::Explain { mode } => {
            let choice = LOCK_MODES
                .iter()
                .find(|m| {
                    m.as_sql_str().eq_ignore_ascii_case(&mode)
                        || m.to_db_str().eq_ignore_ascii_case(&mode)
                        || m.to_db_str().replace("Lock", "").eq_ignore_ascii_case(&mode)
                })
                .context(format!("invalid lock mode: {mode}"))?;
            let info = LockModeInfo::from(choice);
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(0)
        }
        Commands::Completions { shell } => {
            let sh = match shell.as_str() {
                "bash" => Bash,
                "zsh" => Zsh,
                "fish" => Fish,
                "pwsh" | "powershell" => PowerShell,
                "elvish" => Elvish,
                other => return Err(anyhow!("unsupported shell: {other}")),
            };
            let mut com = Pgfence::command();
            generate(sh, &mut com, "pgfence", &mut std::io::stdout());
            Ok(0)
        }
    }
}

pub fn main() {
    env_logger::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("pgfence: {error}");
            std::process::exit(2);
        }
    }
}
