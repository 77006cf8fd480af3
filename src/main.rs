//! pagezip - paginated exports into zip archives
//!
//! Reads a JSON Lines file page by page and writes its records as CSV, Excel
//! or JSON Lines files of bounded size, bundled into one zip archive.
//!
//! # Usage
//!
//! ```bash
//! pagezip export -i orders.jsonl -o orders.zip --format xlsx --rotation-threshold 10000
//! ```

use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use pagezip::cli::CliInterface;
use pagezip::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Wire Ctrl+C to cancellation and run the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                cancel_token_clone.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    });

    let result = cli.execute(cancel_token).await;
    ctrl_c_handle.abort();
    result
}

/// Initialize logging system based on verbosity level
///
/// `-v`/`--vv` win over everything; otherwise `RUST_LOG` directives apply,
/// falling back to the configured level.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let filter = if cli.args().very_verbose {
        EnvFilter::default().add_directive(LevelFilter::TRACE.into())
    } else if cli.args().verbose {
        EnvFilter::default().add_directive(LevelFilter::DEBUG.into())
    } else {
        EnvFilter::builder()
            .with_default_directive(
                LevelFilter::from_level(cli.config().logging.level.to_tracing_level()).into(),
            )
            .from_env_lossy()
    };

    // Logs go to stderr so summaries on stdout stay machine readable
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
