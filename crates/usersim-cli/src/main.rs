//! usersim CLI - judge simulated users against observed facts

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod summary;

/// Exit code when every persona is satisfied everywhere.
const EXIT_OK: u8 = 0;
/// Exit code when at least one persona is unsatisfied.
const EXIT_UNSATISFIED: u8 = 1;
/// Exit code for malformed input, bad usage or IO failures.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "usersim")]
#[command(about = "usersim - judge simulated users against observed facts", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge one facts document, or a directory of them, against personas
    Judge {
        /// Facts document (`-` reads stdin)
        #[arg(long, required_unless_present = "facts_dir")]
        facts: Option<String>,

        /// Directory of facts documents, judged into a matrix
        #[arg(long, conflicts_with = "facts")]
        facts_dir: Option<PathBuf>,

        /// Persona files or directories
        #[arg(long, required = true, num_args = 1..)]
        users: Vec<PathBuf>,

        /// Project config supplying the `engine` section
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write results JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Suppress the human summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run instrumentation and perceptions for every scenario, then judge
    Run {
        /// Project config file
        #[arg(short, long, default_value = usersim_core::CONFIG_FILE)]
        config: PathBuf,

        /// Run only this scenario
        #[arg(short, long)]
        path: Option<String>,

        /// Write results JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Suppress the human summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Report constraint health for a results or matrix document
    Audit {
        /// Results or matrix document (`-` reads stdin)
        #[arg(long)]
        results: String,

        /// Facts directory, for dead-fact detection
        #[arg(long)]
        facts_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the facts each scenario produces, without judging
    Calibrate {
        /// Project config file
        #[arg(short, long, default_value = usersim_core::CONFIG_FILE)]
        config: PathBuf,

        /// Run only this scenario
        #[arg(short, long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let outcome = match cli.command {
        Commands::Judge {
            facts,
            facts_dir,
            users,
            config,
            out,
            quiet,
        } => {
            let source = match (facts, facts_dir) {
                (_, Some(dir)) => commands::FactsSource::Directory(dir),
                (Some(file), None) => commands::FactsSource::File(file),
                (None, None) => commands::FactsSource::File("-".to_string()),
            };
            commands::judge(source, &users, config.as_deref(), out.as_deref(), quiet)
        }
        Commands::Run {
            config,
            path,
            out,
            quiet,
        } => commands::run(&config, path.as_deref(), out.as_deref(), quiet).await,
        Commands::Audit {
            results,
            facts_dir,
            json,
        } => commands::audit(&results, facts_dir.as_deref(), json),
        Commands::Calibrate { config, path } => {
            commands::calibrate(&config, path.as_deref()).await
        }
    };

    match outcome {
        Ok(true) => ExitCode::from(EXIT_OK),
        Ok(false) => ExitCode::from(EXIT_UNSATISFIED),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
