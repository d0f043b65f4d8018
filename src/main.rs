use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use stripe_receipts::app::fetch_receipts_from_file;
use stripe_receipts::browser::{ChromeOptions, ChromeSession};
use stripe_receipts::config::{default_config_path, Config};
use stripe_receipts::duration::parse_duration_arg;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "stripe-receipts")]
#[command(about = "Download Stripe invoice receipts from a saved billing history HTML page")]
struct Cli {
    /// Path to the saved billing history HTML file.
    #[arg(long)]
    html: PathBuf,

    /// Output directory for downloaded PDFs.
    #[arg(long, default_value = "receipts")]
    out: PathBuf,

    /// Run with a visible browser window.
    #[arg(long)]
    headed: bool,

    /// Don't stop on first duplicate; skip and continue (useful for filling holes).
    #[arg(long)]
    no_early_stop: bool,

    /// Path to config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Wait after opening each invoice page (e.g. "5s").
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    render_wait: Option<Duration>,

    /// Pause between invoices (e.g. "400ms").
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    link_delay: Option<Duration>,

    /// Chrome/Chromium executable.
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Chrome profile directory whose cookies should be reused.
    #[arg(long, value_name = "DIR")]
    profile_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    if let Some(render_wait) = cli.render_wait {
        config.timing.render_wait = render_wait;
    }
    if let Some(link_delay) = cli.link_delay {
        config.timing.link_delay = link_delay;
    }
    if let Some(chrome) = cli.chrome {
        config.browser.chrome_path = Some(chrome);
    }
    if let Some(profile_dir) = cli.profile_dir {
        config.browser.profile_dir = Some(profile_dir);
    }

    let chrome_options = ChromeOptions {
        headed: cli.headed,
        chrome_path: config.browser.chrome_path.clone(),
        profile_dir: config.browser.profile_dir.clone(),
        args: config.browser.args.clone(),
    };
    let options = config.download_options(&cli.out, !cli.no_early_stop);

    fetch_receipts_from_file(&cli.html, &config.link_prefix, options, || async {
        ChromeSession::launch(&chrome_options).await
    })
    .await?;

    Ok(())
}
