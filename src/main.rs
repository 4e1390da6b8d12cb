//! Formcheck CLI - structural checks for form and module models

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use formcheck::check::{CheckDefinition, TargetSpec};
use formcheck::config::{ColorMode, Config, OutputFormat};
use formcheck::model::{load_file, Graph};
use formcheck::output::formatter_for;
use formcheck::watch::{is_model_file, watch_and_run};
use formcheck::{CancellationToken, Engine};
use std::io::IsTerminal;
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "formcheck",
    version,
    about = "Form and module model checker",
    long_about = "Runs structural checks over form and module model documents (YAML/JSON)."
)]
struct Cli {
    /// Model files or directories to check
    files: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from a preset (recommended, ui, code)
    #[arg(long)]
    preset: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable specific checks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Only enable specific checks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    select: Option<Vec<String>>,

    /// Override a check parameter, as `check-id:name=value`
    #[arg(long = "param", value_name = "CHECK:NAME=VALUE")]
    params: Vec<String>,

    /// Watch model files and re-check on changes
    #[arg(long, short = 'w')]
    watch: bool,

    /// Clear screen before each run (use with --watch)
    #[arg(long, requires = "watch")]
    clear: bool,

    /// Show per-check timing statistics
    #[arg(long)]
    timing: bool,

    /// Exit with 0 even if issues are found
    #[arg(long)]
    exit_zero: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered checks
    List,
    /// Show detailed information about a check
    Explain {
        /// Check ID to explain
        check_id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Split `check-id:name=value`
fn parse_param(raw: &str) -> Result<(&str, &str, &str)> {
    let Some((check_id, assignment)) = raw.split_once(':') else {
        bail!("invalid --param '{}': expected CHECK:NAME=VALUE", raw);
    };
    let Some((name, value)) = assignment.split_once('=') else {
        bail!("invalid --param '{}': expected CHECK:NAME=VALUE", raw);
    };
    if check_id.is_empty() || name.is_empty() {
        bail!("invalid --param '{}': empty check id or name", raw);
    }
    Ok((check_id, name, value))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match (&cli.config, &cli.preset) {
        (Some(path), _) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(preset)) => match Config::preset(preset) {
            Some(config) => config,
            None => bail!("unknown preset '{}'", preset),
        },
        (None, None) => Config::load_default().unwrap_or_default(),
    };

    let format = cli.format.map(|f| match f {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    });
    config.merge_cli(
        format,
        cli.verbose.then_some(true),
        cli.jobs,
        cli.disable.clone(),
        cli.select.clone(),
    );
    if cli.no_color {
        config.output.color = ColorMode::Never;
    }
    for raw in &cli.params {
        let (check_id, name, value) = parse_param(raw)?;
        config.set_parameter(check_id, name, value);
    }
    Ok(config)
}

/// Expand directories into the model files beneath them, in name order
fn model_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to read {}", path.display()))?;
            if entry.file_type().is_file() && is_model_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn load_graph(files: &[PathBuf]) -> Result<Graph> {
    let mut graph = Graph::new();
    for file in files {
        let roots = load_file(&mut graph, file)
            .with_context(|| format!("failed to load model {}", file.display()))?;
        log::debug!("{}: {} root(s)", file.display(), roots.len());
    }
    Ok(graph)
}

fn describe_targets(targets: &[TargetSpec]) -> Vec<String> {
    targets
        .iter()
        .map(|spec| {
            if spec.kinds.is_empty() {
                return spec.root.as_str().to_string();
            }
            let kinds: Vec<&str> = spec.kinds.iter().map(|k| k.as_str()).collect();
            format!(
                "{} in {}{}",
                kinds.join(", "),
                spec.root.as_str(),
                if spec.requires_containment {
                    ""
                } else {
                    " (or the root itself)"
                }
            )
        })
        .collect()
}

fn print_check(definition: &CheckDefinition, enabled: bool) {
    println!(
        "    {} [{}] ({}){}",
        definition.id().cyan(),
        definition.default_severity(),
        definition.issue_type(),
        if enabled { "".normal() } else { " [disabled]".yellow() }
    );
    if !definition.title().is_empty() {
        println!("      {}", definition.title());
    }
}

fn explain_check(definition: &CheckDefinition) {
    println!("{}", "Check Details".bold());
    println!();
    println!("  {}: {}", "ID".bold(), definition.id().cyan());
    println!("  {}: {}", "Title".bold(), definition.title());
    println!("  {}: {}", "Severity".bold(), definition.default_severity());
    println!("  {}: {}", "Type".bold(), definition.issue_type());
    println!("  {}: {}", "Complexity".bold(), definition.complexity());

    if !definition.description().is_empty() {
        println!();
        println!("  {}", "Description".bold());
        println!("  {}", definition.description());
    }

    println!();
    println!("  {}", "Targets".bold());
    for target in describe_targets(definition.targets()) {
        println!("    {}", target);
    }

    if !definition.parameters().is_empty() {
        println!();
        println!("  {}", "Parameters".bold());
        for param in definition.parameters() {
            println!(
                "    {} ({}, default {}): {}",
                param.name.cyan(),
                param.kind,
                param.default,
                param.title
            );
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let config = load_config(cli)?;
    let engine = Engine::with_builtin_checks(config).context("check registration failed")?;

    match &cli.command {
        Some(Commands::List) => {
            println!("{}", "Available checks:".bold());
            for (_, definition) in engine.registry().iter() {
                print_check(definition, engine.config().is_check_enabled(definition.id()));
            }
            return Ok(0);
        }
        Some(Commands::Explain { check_id }) => {
            let Some(definition) = engine.registry().definition(check_id) else {
                bail!("unknown check '{}'", check_id);
            };
            explain_check(definition);
            return Ok(0);
        }
        None => {}
    }

    if cli.files.is_empty() {
        bail!("no model files given");
    }

    let formatter = formatter_for(&engine.config().output, std::io::stdout().is_terminal());
    if engine.config().output.color == ColorMode::Never {
        colored::control::set_override(false);
    }
    let cancel = CancellationToken::new();

    let scan = |files: &[PathBuf]| -> Result<i32> {
        let graph = load_graph(files)?;
        let result = engine.scan(&graph, &cancel);
        print!("{}", formatter.format(&result));
        if cli.timing {
            eprintln!();
            eprintln!("{}", result.format_timings());
        }
        Ok(result.exit_code())
    };

    let files = model_files(&cli.files)?;
    if !cli.watch {
        let exit_code = scan(&files)?;
        return Ok(if cli.exit_zero { 0 } else { exit_code });
    }

    eprintln!(
        "{} Watching for changes... (press Ctrl+C to stop)",
        "[watch]".cyan().bold()
    );
    // A change to any file reloads every document: cross references span files
    watch_and_run(&cli.files, cli.clear, &cancel, |_changed| {
        let reloaded = model_files(&cli.files).and_then(|files| scan(&files));
        if let Err(e) = reloaded {
            eprintln!("{}: {:#}", "error".red().bold(), e);
        }
        eprintln!("{} Watching for changes...", "[watch]".cyan().bold());
    })
    .context("failed to start file watcher")?;
    Ok(0)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
