use bottle_bomb::commands::{self, Outcome};
use bottle_bomb::{BrewApi, Config, colors};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bottle-bomb")]
#[command(author, version, about = "Download a homebrew bottle for any platform", long_about = None)]
struct Cli {
    /// Formula name
    formula: String,

    /// Directory to write <formula>.tar.gz into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Verify the bottle's SHA-256 against the formula metadata
    #[arg(long)]
    verify: bool,

    /// Help message for toggle
    #[arg(short, long)]
    toggle: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let colors_enabled = colors::init_colors();
    tracing::debug!(toggle = cli.toggle, "parsed arguments");

    let config = Config::from_env()
        .with_output_dir(cli.output_dir)
        .with_verify(cli.verify);

    let api = BrewApi::new(&config)?;

    // Download failures are already reported inline
    match commands::fetch(&api, &config, &cli.formula, colors_enabled).await? {
        Outcome::Downloaded | Outcome::Cancelled => Ok(()),
        Outcome::Failed => anyhow::bail!("no bottle of {} was saved", cli.formula),
    }
}
