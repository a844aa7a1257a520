//! Command-line interface for capload.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use capload_core::config::{env_vars, LoadSemantics, LoadStrategy, LoaderConfig, ModuleSourceKind};
use capload_core::loader::{ModuleOpener, NativeOpener, TypeSummary};
use capload_core::{InspectReport, PluginHost};
use clap::{Parser, Subcommand};
use serde::Serialize;

/// capload - inspect capability plugin modules.
#[derive(Parser, Debug)]
#[command(name = "capload")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Loader configuration file (defaults to ./capload.toml when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Show the modules and candidate types a strategy finds for a capability.
    Inspect {
        /// Capability name, e.g. "demo.greeter".
        #[arg(long)]
        capability: String,
        /// Plugin directory to scan.
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Load strategy name or code.
        #[arg(short, long)]
        strategy: Option<String>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the load strategies.
    Strategies {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate a single module file.
    Validate {
        /// Path to the module file.
        #[arg(required = true)]
        path: PathBuf,
        /// Skip trust checks.
        #[arg(long)]
        relaxed: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config =
        LoaderConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(
        category = "config",
        plugin_dir = %config.plugin_dir.display(),
        strategy = %config.strategy,
        extension = %config.module_extension,
        "Configuration resolved"
    );

    match args.command {
        Command::Inspect {
            capability,
            dir,
            strategy,
            json,
        } => run_inspect(config, &capability, dir, strategy, json),
        Command::Strategies { json } => list_strategies(json),
        Command::Validate {
            path,
            relaxed,
            json,
        } => run_validate(&config, &path, relaxed, json),
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "capload=debug" } else { "capload=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    // Logs go to stderr so --json output stays parseable
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Run resolve/load/scan for a capability and print what was found.
fn run_inspect(
    mut config: LoaderConfig,
    capability: &str,
    dir: Option<PathBuf>,
    strategy: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(dir) = dir {
        config.plugin_dir = dir;
    }
    let strategy = match strategy {
        Some(selector) => selector
            .parse::<LoadStrategy>()
            .with_context(|| format!("Invalid --strategy '{}'", selector))?,
        None => config.strategy,
    };

    let host = PluginHost::from_config(&config);
    let report = host.inspect(strategy, capability);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_inspect(&report, host.plugin_dir());
    }
    Ok(())
}

fn print_inspect(report: &InspectReport, dir: &Path) {
    println!("Capability:  {}", report.capability);
    println!("Strategy:    {} ({})", report.strategy, report.strategy.code());
    println!("Directory:   {}", dir.display());
    println!();

    println!("Modules ({}):", report.modules.len());
    for module in &report.modules {
        println!("  {}  [{}]", module.name, module.origin);
    }

    println!();
    println!("Candidates ({}):", report.candidates.len());
    for candidate in &report.candidates {
        let note = if candidate.default_constructor {
            ""
        } else {
            "  (no default constructor)"
        };
        println!("  {}  from {}{}", candidate.type_name, candidate.module, note);
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("Diagnostics ({}):", report.diagnostics.len());
        for diagnostic in &report.diagnostics {
            println!("  {}", diagnostic);
        }
    }
}

#[derive(Debug, Serialize)]
struct StrategyInfo {
    code: u8,
    name: &'static str,
    semantics: LoadSemantics,
    source: ModuleSourceKind,
}

/// List every load strategy with its code and axes.
fn list_strategies(json: bool) -> Result<()> {
    let strategies: Vec<StrategyInfo> = LoadStrategy::ALL
        .iter()
        .map(|s| StrategyInfo {
            code: s.code(),
            name: s.as_str(),
            semantics: s.semantics(),
            source: s.source(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&strategies)?);
        return Ok(());
    }

    println!("{:<6} {:<18} {:<10} {}", "CODE", "NAME", "SEMANTICS", "SOURCE");
    for info in &strategies {
        println!(
            "{:<6} {:<18} {:<10} {}",
            info.code,
            info.name,
            semantics_label(info.semantics),
            source_label(info.source)
        );
    }
    Ok(())
}

fn semantics_label(semantics: LoadSemantics) -> &'static str {
    match semantics {
        LoadSemantics::Standard => "standard",
        LoadSemantics::RawFile => "raw-file",
        LoadSemantics::Relaxed => "relaxed",
    }
}

fn source_label(source: ModuleSourceKind) -> &'static str {
    match source {
        ModuleSourceKind::Directory => "directory",
        ModuleSourceKind::Merged => "merged",
    }
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    path: PathBuf,
    module: String,
    attach_hook: bool,
    types: Vec<TypeSummary>,
}

/// Open one module and list its catalog.
fn run_validate(config: &LoaderConfig, path: &Path, relaxed: bool, json: bool) -> Result<()> {
    let opener = NativeOpener::new(config.trust.clone())
        .with_extension(config.module_extension.clone());
    let semantics = if relaxed {
        LoadSemantics::Relaxed
    } else {
        LoadSemantics::Standard
    };

    let module = match opener.open_path(path, semantics) {
        Ok(module) => module,
        Err(e) => {
            println!("Module Validation: FAILED");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Make sure:");
            println!("  1. The module file exists");
            println!("  2. The file has the .{} extension", config.module_extension);
            println!("  3. It was built with export_module! against this SDK version");
            anyhow::bail!("module validation failed: {}", path.display());
        }
    };

    let catalog = match module.describe_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            println!("Module Validation: FAILED");
            println!();
            println!("Error: {}", e);
            for cause in e.loader_errors() {
                println!("  caused by: {}", cause);
            }
            anyhow::bail!("module catalog could not be read: {}", path.display());
        }
    };

    let report = ValidationReport {
        path: path.to_path_buf(),
        module: catalog.module,
        attach_hook: module.has_attach_hook(),
        types: catalog.types,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Module Validation: PASSED");
    println!();
    println!("Module:          {}", report.module);
    println!("Path:            {}", report.path.display());
    println!("Attach hook:     {}", if report.attach_hook { "yes" } else { "no" });
    println!("Types:           {}", report.types.len());
    for info in &report.types {
        println!(
            "  {} [{}]{}",
            info.name,
            info.kind,
            if info.default_constructor { "" } else { " (no default constructor)" }
        );
        for capability in &info.capabilities {
            println!("    - {}", capability);
        }
    }
    Ok(())
}
