// rules-cli/src/main.rs
// ============================================================================
// Module: Rules CLI Entry Point
// Description: Command dispatcher for registering rules, setting facts, and
//              emitting events against an in-process `RuleEngine`.
// Purpose: Exercise the embedding contract from a terminal (spec §1 out of
//          scope for the core, carried here as the reference consumer).
// Dependencies: clap, rules-config, rules-core, rules-engine, rules-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! One process, one engine: every subcommand loads config, builds a
//! `RuleEngine`, performs one operation, and exits. There is no daemon mode;
//! a long-running embedder is expected to hold its own `RuleEngine` handle
//! rather than shell out to this binary repeatedly.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use rules_config::EngineConfig;
use rules_core::RuleId;
use rules_engine::EngineOptions;
use rules_engine::RuleEngine;
use rules_store_sqlite::SqliteRulePersistence;
use rules_store_sqlite::SqliteStoreConfig;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ruleforge", arg_required_else_help = true)]
struct Cli {
    /// Path to a `ruleforge.toml` config file; falls back to `RULEFORGE_CONFIG`
    /// or `./ruleforge.toml` when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rule lifecycle operations.
    Rule {
        #[command(subcommand)]
        action: RuleCommand,
    },
    /// Fact Store operations.
    Fact {
        #[command(subcommand)]
        action: FactCommand,
    },
    /// Emits one event and exits once dispatch settles.
    Emit {
        /// Dotted event topic.
        topic: String,
        /// Event payload as a JSON literal.
        data: String,
    },
}

#[derive(Subcommand, Debug)]
enum RuleCommand {
    /// Registers a rule from a JSON file.
    Register {
        /// Path to a JSON file containing one `rules_core::Rule`.
        path: PathBuf,
    },
    /// Lists every registered rule.
    List,
    /// Enables a rule by id.
    Enable {
        /// Rule identifier.
        id: String,
    },
    /// Disables a rule by id.
    Disable {
        /// Rule identifier.
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum FactCommand {
    /// Sets a fact to a JSON value.
    Set {
        /// Colon-segmented fact key.
        key: String,
        /// Fact value as a JSON literal.
        value: String,
    },
    /// Gets a fact by exact key.
    Get {
        /// Colon-segmented fact key.
        key: String,
    },
    /// Queries facts by a colon-segmented glob pattern.
    Query {
        /// Colon-segmented glob pattern (`*` one segment, `**` any depth).
        pattern: String,
    },
}

/// Errors surfaced to the process exit code.
#[derive(Debug)]
enum CliError {
    Config(rules_config::ConfigError),
    Engine(rules_engine::EngineError),
    Json(serde_json::Error),
    Persistence(rules_engine::interfaces::PersistenceError),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "config error: {err}"),
            Self::Engine(err) => write!(f, "engine error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Persistence(err) => write!(f, "persistence error: {err}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&format!("ruleforge: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Writes a single line to stdout, bypassing the `println!` lint.
fn write_stdout_line(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(&mut stdout, "{message}");
}

/// Writes a single line to stderr, bypassing the `eprintln!` lint.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = EngineConfig::load(cli.config.as_deref()).map_err(CliError::Config)?;
    let engine = build_engine(&config).await?;

    match cli.command {
        Command::Rule { action } => run_rule_command(&engine, action).await,
        Command::Fact { action } => run_fact_command(&engine, action).await,
        Command::Emit { topic, data } => {
            let value: serde_json::Value = serde_json::from_str(&data).map_err(CliError::Json)?;
            engine.emit(topic, value, None).await.map_err(CliError::Engine)?;
            Ok(())
        }
    }
}

async fn build_engine(config: &EngineConfig) -> Result<RuleEngine, CliError> {
    let mut options = EngineOptions { name: config.name.clone().unwrap_or_default(), ..EngineOptions::default() };
    options.trace_enabled = config.trace.enabled;
    options.trace_max_entries = config.trace.max_entries;

    if let rules_config::config::PersistenceConfig::Sqlite { path } = &config.persistence {
        let store = SqliteRulePersistence::new(SqliteStoreConfig::new(path))
            .map_err(|err| CliError::Persistence(err.into()))?;
        options.persistence = Some(Arc::new(store));
    }

    let engine = RuleEngine::new(options);
    engine.start().await.map_err(CliError::Engine)?;
    Ok(engine)
}

async fn run_rule_command(engine: &RuleEngine, action: RuleCommand) -> Result<(), CliError> {
    match action {
        RuleCommand::Register { path } => {
            let bytes = std::fs::read(&path).map_err(|err| CliError::NotFound(err.to_string()))?;
            let rule: rules_core::Rule = serde_json::from_slice(&bytes).map_err(CliError::Json)?;
            engine.register_rule(rule).map_err(CliError::Engine)?;
            Ok(())
        }
        RuleCommand::List => {
            for rule in engine.get_rules() {
                let status = if rule.enabled { "enabled" } else { "disabled" };
                write_stdout_line(&format!("{}\t{}\t{status}", rule.id, rule.name));
            }
            Ok(())
        }
        RuleCommand::Enable { id } => {
            engine.enable_rule(&RuleId::new(id)).map_err(CliError::Engine)?;
            Ok(())
        }
        RuleCommand::Disable { id } => {
            engine.disable_rule(&RuleId::new(id)).map_err(CliError::Engine)?;
            Ok(())
        }
    }
}

async fn run_fact_command(engine: &RuleEngine, action: FactCommand) -> Result<(), CliError> {
    match action {
        FactCommand::Set { key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value).map_err(CliError::Json)?;
            engine.set_fact(key, value, Some("cli")).await.map_err(CliError::Engine)?;
            Ok(())
        }
        FactCommand::Get { key } => match engine.get_fact(&key) {
            Some(fact) => {
                write_stdout_line(&serde_json::to_string_pretty(&fact).map_err(CliError::Json)?);
                Ok(())
            }
            None => Err(CliError::NotFound(key)),
        },
        FactCommand::Query { pattern } => {
            for fact in engine.query_facts(&pattern) {
                write_stdout_line(&serde_json::to_string(&fact).map_err(CliError::Json)?);
            }
            Ok(())
        }
    }
}
