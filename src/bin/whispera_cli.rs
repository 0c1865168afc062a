/*!
 * Whispera CLI - intent JSON to shell commands
 *
 * Resolves model intents against the configured template table, generates
 * the fine-tuning corpus, and regenerates the alias table.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use whispera_core::alias_scan::{existing_table, AliasScanner};
use whispera_core::executor::{run_command, RunOpts};
use whispera_core::logging;
use whispera_core::{
    resolve_config_dir, ConfigStore, DatasetGenerator, Intent, Settings, TemplateResolver,
};

/// Exit status for per-command failures (unknown operation, missing slot, bad JSON)
const EXIT_UNRESOLVED: i32 = 2;

#[derive(Parser)]
#[command(name = "whispera_cli")]
#[command(about = "Whispera - resolve voice-command intents into shell commands", long_about = None)]
struct Cli {
    /// Configuration directory (templates, patterns, samples, aliases)
    #[arg(short, long, global = true, env = "WHISPERA_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one intent into a command (dry run unless --execute)
    Resolve {
        /// Intent JSON (stdin if not provided)
        intent: Option<String>,

        /// Input is raw model output; extract the first JSON object
        #[arg(short, long)]
        model_output: bool,

        /// Execute the resolved command
        #[arg(short = 'x', long)]
        execute: bool,

        /// Execution timeout in milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Read intents line by line; prefix a line with '!' to execute it
    Interactive,

    /// Load and validate the configuration
    Check {
        /// Print the summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Generate train.jsonl and valid.jsonl for fine-tuning
    Generate {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        /// Cap on examples per pattern
        #[arg(long)]
        max_per_pattern: Option<usize>,

        /// Per-operation floor for up-sampling
        #[arg(long)]
        min_per_operation: Option<usize>,

        /// Maximum count ratio between any two operations
        #[arg(long, conflicts_with = "no_downsample")]
        max_imbalance: Option<f64>,

        /// Disable down-sampling of large operations
        #[arg(long)]
        no_downsample: bool,

        /// Share of examples written to valid.jsonl
        #[arg(long)]
        validation_fraction: Option<f64>,

        /// Print the per-operation report as JSON
        #[arg(long)]
        report: bool,
    },

    /// Regenerate the alias table from installed applications
    Aliases {
        /// Application directory to scan (repeatable; defaults to the macOS locations)
        #[arg(long = "app-dir")]
        app_dirs: Vec<PathBuf>,

        /// Print the merged table instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config_dir = resolve_config_dir(cli.config_dir);

    match cli.command {
        Commands::Resolve {
            intent,
            model_output,
            execute,
            timeout_ms,
        } => {
            let (settings, store) = load(&config_dir)?;
            let input = match intent {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read intent from stdin")?;
                    buf
                }
            };
            let opts = RunOpts {
                timeout_ms,
                ..RunOpts::default()
            };
            resolve_one(&store, &settings, &input, model_output, execute.then_some(opts)).await
        }
        Commands::Interactive => {
            let (settings, store) = load(&config_dir)?;
            interactive(&store, &settings).await
        }
        Commands::Check { json } => {
            let (_, store) = load(&config_dir)?;
            let summary = store.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "✅ {} operations in {} categories ({} patterns, {} pools, {} literals, {} aliases)",
                    summary.operations,
                    summary.categories,
                    summary.patterns,
                    summary.pools,
                    summary.literals,
                    summary.aliases
                );
            }
            Ok(0)
        }
        Commands::Generate {
            output,
            seed,
            max_per_pattern,
            min_per_operation,
            max_imbalance,
            no_downsample,
            validation_fraction,
            report,
        } => {
            let (settings, store) = load(&config_dir)?;
            let mut gen = settings.generator;
            if let Some(seed) = seed {
                gen.seed = seed;
            }
            if let Some(cap) = max_per_pattern {
                gen.max_per_pattern = cap;
            }
            if let Some(floor) = min_per_operation {
                gen.min_per_operation = floor;
            }
            if max_imbalance.is_some() {
                gen.max_imbalance = max_imbalance;
            }
            if no_downsample {
                gen.max_imbalance = None;
            }
            if let Some(fraction) = validation_fraction {
                gen.validation_fraction = fraction;
            }

            let fraction = gen.validation_fraction;
            let dataset = DatasetGenerator::new(&store, gen).generate()?;
            let files = dataset.write_corpus(&output, fraction)?;

            if report {
                println!("{}", serde_json::to_string_pretty(&dataset.report)?);
            } else {
                println!(
                    "Generated {} training examples -> {}",
                    files.train_count,
                    files.train.display()
                );
                println!(
                    "Generated {} validation examples -> {}",
                    files.valid_count,
                    files.valid.display()
                );
                println!("Operations: {}", dataset.report.operations.len());
            }
            Ok(0)
        }
        Commands::Aliases { app_dirs, dry_run } => {
            let dirs = if app_dirs.is_empty() {
                AliasScanner::default_dirs()
            } else {
                app_dirs
            };
            let scanner = AliasScanner::new(dirs);
            if dry_run {
                let (_, existing) = existing_table(&config_dir)?;
                let table = scanner.regenerate(existing);
                print!("{}", serde_yaml::to_string(&table)?);
            } else {
                let (path, table) = scanner.regenerate_in(&config_dir)?;
                let total: usize = table.values().map(|names| names.len()).sum();
                println!("✅ Wrote {} aliases to {}", total, path.display());
            }
            Ok(0)
        }
        Commands::Version => {
            println!("whispera_cli v{}", env!("CARGO_PKG_VERSION"));
            println!("Whispera intent resolver and dataset generator");
            Ok(0)
        }
    }
}

fn load(config_dir: &Path) -> Result<(Settings, ConfigStore)> {
    let settings = Settings::load(config_dir)?;
    let store = ConfigStore::load_dir(config_dir, settings.shell())?;
    Ok((settings, store))
}

/// Resolve (and optionally run) one intent; returns the process exit status
async fn resolve_one(
    store: &ConfigStore,
    settings: &Settings,
    input: &str,
    model_output: bool,
    execute: Option<RunOpts>,
) -> Result<i32> {
    let parsed = if model_output {
        Intent::from_model_output(input)
    } else {
        Intent::from_json(input.trim())
    };
    let intent = match parsed {
        Ok(intent) => intent,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_UNRESOLVED);
        }
    };

    let command = match TemplateResolver::new(store).resolve_intent(&intent) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_UNRESOLVED);
        }
    };

    println!("{}", command);

    let Some(opts) = execute else {
        return Ok(0);
    };
    let result = run_command(&command, settings.shell(), opts).await?;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if result.timed_out {
        eprintln!("Error: command timed out");
        return Ok(1);
    }
    Ok(result.code.unwrap_or(1))
}

async fn interactive(store: &ConfigStore, settings: &Settings) -> Result<i32> {
    let show_prompt = io::stdin().is_terminal();
    if show_prompt {
        println!("Whispera - enter intent JSON or 'quit' to exit");
        println!("Prefix with '!' to execute immediately\n");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if show_prompt {
            print!(">>> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        let (execute, text) = match line.strip_prefix('!') {
            Some(rest) => (Some(RunOpts::default()), rest.trim()),
            None => (None, line),
        };
        // Failures are reported per line; the session continues.
        resolve_one(store, settings, text, true, execute).await?;
    }

    if show_prompt {
        println!("Bye!");
    }
    Ok(0)
}
