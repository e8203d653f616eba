//! Template Guard CLI binary.
//!
//! Security gate for LLM prompt templates.
//!
//! # Commands
//!
//! - `validate` - Validate a template and print the verdict (exit code 2 if insecure)
//! - `sanitize` - Strip dangerous markup from a template
//! - `rules` - List the detection rules
//! - `config` - Print the effective configuration

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use template_guard::{
    catalog::{RuleKind, ThreatCategory},
    GuardConfig, RuleCatalog, Sanitizer, ValidationResult, Validator, VERSION,
};

/// Exit code for an insecure verdict.
const EXIT_INSECURE: i32 = 2;

#[derive(Parser)]
#[command(name = "template-guard")]
#[command(version = VERSION)]
#[command(about = "Template Guard - security validation for LLM prompt templates", long_about = None)]
struct Cli {
    /// Config file (default: <config_dir>/template-guard/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a template
    Validate {
        /// Template text (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove script and template-introspection markup
    Sanitize {
        /// Template text (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List detection rules
    Rules {
        /// Only rules of this category (e.g. xss, sql_injection)
        #[arg(short, long)]
        category: Option<ThreatCategory>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print the default config file path instead
        #[arg(long)]
        path: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Validate { input, file, json } => cmd_validate(&config, input, file, json),
        Commands::Sanitize {
            input,
            file,
            output,
        } => cmd_sanitize(&config, input, file, output),
        Commands::Rules { category } => cmd_rules(category),
        Commands::Config { path } => cmd_config(&config, path),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<GuardConfig> {
    let base = match explicit {
        Some(path) => GuardConfig::from_file(path)?,
        None => match GuardConfig::default_path().filter(|p| p.exists()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                GuardConfig::from_file(path)?
            },
            None => GuardConfig::default(),
        },
    };
    Ok(base.with_env()?)
}

fn cmd_validate(
    config: &GuardConfig,
    input: Option<String>,
    file: Option<PathBuf>,
    json_output: bool,
) -> anyhow::Result<()> {
    let content = read_input_bytes(input, file)?;
    let catalog = Arc::new(RuleCatalog::builtin()?);
    let validator = Validator::new(catalog, config.validator.clone());

    let result = validator.validate_bytes(&content)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.is_secure {
        std::process::exit(EXIT_INSECURE);
    }
    Ok(())
}

fn print_result(result: &ValidationResult) {
    if result.is_secure {
        println!("SECURE (risk score: {})", result.risk_score);
    } else {
        println!("INSECURE (risk score: {})", result.risk_score);
        println!();
        println!("Violations:");
        for v in &result.violations {
            println!("  - [{}] {} ({})", v.severity, v.category, v.rule_id);
            println!("    {}", v.message);
            if let Some(range) = v.range {
                println!("    at bytes {}..{}", range.start, range.end);
            }
        }
    }

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &result.warnings {
            println!("  - {}: {}", w.category, w.message);
        }
    }
}

fn cmd_sanitize(
    config: &GuardConfig,
    input: Option<String>,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let sanitizer = Sanitizer::with_catalog(
        Arc::new(RuleCatalog::builtin()?),
        config.sanitizer.clone(),
    );
    let clean = sanitizer.sanitize(&content);

    if clean.len() < content.len() {
        eprintln!("Removed {} bytes", content.len() - clean.len());
    }
    write_output(output, &clean)
}

fn cmd_rules(category: Option<ThreatCategory>) -> anyhow::Result<()> {
    let catalog = RuleCatalog::builtin()?;
    println!("Rule catalog v{} ({} rules)", catalog.version(), catalog.len());

    for cat in ThreatCategory::ALL {
        if category.is_some_and(|c| c != cat) {
            continue;
        }
        println!();
        println!("{cat}:");
        for rule in catalog.rules_for(cat) {
            let kind = match rule.kind() {
                RuleKind::Pattern(_) => "pattern",
                RuleKind::Literal(_) => "literal",
                RuleKind::KeyValue(_) => "key-value",
                RuleKind::Structural(_) => "structural",
            };
            let strip = if rule.is_strippable() { " [strip]" } else { "" };
            println!(
                "  {:<40} {:<9} {:<10} {}{strip}",
                rule.id(),
                rule.severity(),
                kind,
                rule.message()
            );
        }
    }
    Ok(())
}

fn cmd_config(config: &GuardConfig, path: bool) -> anyhow::Result<()> {
    if path {
        match GuardConfig::default_path() {
            Some(p) => println!("{}", p.display()),
            None => anyhow::bail!("no config directory on this platform"),
        }
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    let bytes = read_input_bytes(input, file)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_input_bytes(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<Vec<u8>> {
    if let Some(path) = file {
        Ok(std::fs::read(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s.into_bytes())
        }
    } else {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}
