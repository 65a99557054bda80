//! Racesheet CLI - canonical tables from race and horse exports
//!
//! # Main Command
//!
//! ```bash
//! racesheet run exports/ canonical.csv                 # Bundled alias set
//! racesheet run exports/ canonical.csv --aliases a.json --report report.json
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! racesheet resolve exports/2024_01.csv   # Show how each field resolves
//! racesheet parse exports/2024_01.csv     # Dump the raw table as JSON
//! ```

use clap::{Parser, Subcommand};
use racesheet::logs::{log_info, log_warning};
use racesheet::{
    default_jobs, load_file, run_batch, AliasConfig, BatchOptions, CancelFlag, HeaderResolver,
    LOG_BROADCASTER,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable consulted when `--aliases` is omitted.
const ALIASES_ENV: &str = "RACESHEET_ALIASES";

#[derive(Parser)]
#[command(name = "racesheet")]
#[command(about = "Normalize race and horse spreadsheet exports into one canonical table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every eligible file in a directory
    Run {
        /// Directory containing the exports
        input_dir: PathBuf,

        /// Canonical CSV output file
        output: PathBuf,

        /// Alias configuration (default: $RACESHEET_ALIASES, then the bundled set)
        #[arg(short, long)]
        aliases: Option<PathBuf>,

        /// Write diagnostics as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Files processed concurrently (default: available cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Don't echo the run log to stderr
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show how each logical field resolves against one file's headers
    Resolve {
        /// Input file
        input: PathBuf,

        /// Alias configuration
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },

    /// Parse one file and output its raw table as JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input_dir,
            output,
            aliases,
            report,
            jobs,
            quiet,
        } => cmd_run(input_dir, output, aliases, report, jobs, quiet).await,

        Commands::Resolve { input, aliases } => cmd_resolve(&input, aliases),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn aliases_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| std::env::var_os(ALIASES_ENV).map(PathBuf::from))
}

async fn cmd_run(
    input_dir: PathBuf,
    output: PathBuf,
    aliases: Option<PathBuf>,
    report: Option<PathBuf>,
    jobs: Option<usize>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    LOG_BROADCASTER.set_quiet(quiet);

    let config = AliasConfig::load(aliases_path(aliases).as_deref())?;
    log_info(format!("📖 Aliases: {}", config.summary()));

    let options = BatchOptions {
        input_dir,
        output,
        report,
        jobs: jobs.unwrap_or_else(default_jobs).max(1),
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_warning("Interrupted, finishing files in progress");
            on_interrupt.cancel();
        }
    });

    let outcome = run_batch(&options, Arc::new(config), &cancel).await?;
    if outcome.diagnostics.cancelled {
        log_warning(format!(
            "Run cancelled, {} records from completed files written",
            outcome.dataset.len()
        ));
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_resolve(input: &Path, aliases: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AliasConfig::load(aliases_path(aliases).as_deref())?;
    eprintln!("🔎 Resolving: {}", input.display());

    let table = load_file(input)?;
    eprintln!("   Encoding: {}", table.encoding);
    if let Some(d) = table.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(d));
    }
    eprintln!("   Columns: {}", table.headers.join(", "));

    let map = HeaderResolver::new(&config).resolve(&table.headers);
    let width = config.fields().map(|f| f.name.len()).max().unwrap_or(0);
    for spec in config.fields() {
        match map.get(&spec.name) {
            Some(column) => println!(
                "{:<width$}  {:<9}  #{} '{}' (alias '{}')",
                spec.name,
                format!("{:?}", column.tier).to_lowercase(),
                column.position,
                column.header,
                column.alias,
                width = width
            ),
            None => println!(
                "{:<width$}  {:<9}{}",
                spec.name,
                "-",
                if spec.is_required() { "  REQUIRED, file would be skipped" } else { "" },
                width = width
            ),
        }
    }

    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = load_file(input)?;
    eprintln!("   Encoding: {}", table.encoding);
    if let Some(d) = table.delimiter {
        eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(d));
    }
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.rows.len());

    let json = serde_json::to_string_pretty(&table)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
