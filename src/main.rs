use anyhow::Result;
use clap::Parser;
use logsift::config::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_POSTLINES, DEFAULT_PRELINES};
use logsift::{Config, Extractor, ModelCheck, Reporter};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::stdout;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Log file to scan
    log_file: Option<PathBuf>,

    /// Lines of context before each match
    #[arg(short = 'B', long, default_value_t = DEFAULT_PRELINES)]
    before: usize,

    /// Lines of context after each match
    #[arg(short = 'A', long, default_value_t = DEFAULT_POSTLINES)]
    after: usize,

    /// Lines of context on both sides; overrides --before and --after
    #[arg(short = 'C', long)]
    context: Option<usize>,

    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Generate endpoint of the ollama API
    #[arg(long, default_value = DEFAULT_API_URL)]
    url: String,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pull the model first if the ollama host does not have it
    #[arg(long)]
    pull: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let (before, after) = match args.context {
        Some(n) => (n, n),
        None => (args.before, args.after),
    };
    let config = Config {
        model: args.model,
        api_url: args.url,
        ..Config::default()
    }
    .with_context(before, after);

    let lines = Extractor::new(config.clone()).load(args.log_file.as_deref());

    if args.pull && lines.as_ref().is_some_and(|l| !l.is_empty()) {
        let ready = match ModelCheck::new(&config) {
            Ok(check) => check.ensure_model().await,
            Err(e) => Err(e),
        };
        if let Err(e) = ready {
            println!("Error: {e}");
            return Ok(());
        }
    }

    let reporter = Reporter::new(config, args.timeout.map(Duration::from_secs))?;
    reporter.report(lines.as_deref(), &mut stdout()).await?;

    Ok(())
}
