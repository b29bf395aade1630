//! backstop CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "backstop",
    version,
    about = "Retry, backoff and error recovery for AI requests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an error message and list recovery actions
    Classify {
        /// The error message to classify
        message: String,

        /// HTTP status that accompanied the error
        #[arg(long)]
        status: Option<u16>,

        /// Retry-After header value (seconds or HTTP date)
        #[arg(long)]
        retry_after: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the backoff schedule for a retry policy
    Backoff {
        /// Number of retries to show
        #[arg(long, default_value = "5")]
        attempts: u32,

        /// Base delay in milliseconds
        #[arg(long, default_value = "1000")]
        base_ms: u64,

        /// Maximum delay in milliseconds
        #[arg(long, default_value = "60000")]
        max_ms: u64,

        /// Retry-After header value that overrides the schedule
        #[arg(long)]
        retry_after: Option<String>,

        /// Add a column with one jittered sample per retry, drawn from the thread RNG
        #[arg(long)]
        seed_free: bool,
    },

    /// Parse a Retry-After header value
    RetryAfter {
        /// Header value (seconds or HTTP date)
        value: String,
    },

    /// Send a prompt through a provider with retries
    Complete {
        /// The prompt to send
        #[arg(long)]
        prompt: String,

        /// Provider name from the config (default: config's default_provider)
        #[arg(long)]
        provider: Option<String>,

        /// Model identifier (default: config's default_model)
        #[arg(long)]
        model: Option<String>,

        /// Override retry.max_retries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    let directive = match "backstop=info".parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("Error: invalid log directive: {e}");
            process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify {
            message,
            status,
            retry_after,
            format,
        } => commands::classify::execute(message, status, retry_after, format),
        Commands::Backoff {
            attempts,
            base_ms,
            max_ms,
            retry_after,
            seed_free,
        } => commands::backoff::execute(attempts, base_ms, max_ms, retry_after, seed_free),
        Commands::RetryAfter { value } => commands::retry_after::execute(value),
        Commands::Complete {
            prompt,
            provider,
            model,
            max_retries,
            config,
        } => commands::complete::execute(prompt, provider, model, max_retries, config).await,
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
