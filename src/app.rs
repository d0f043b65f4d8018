//! Top-level flow: find invoice links, then download each receipt.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};

use crate::browser::BrowserSession;
use crate::download::{DownloadOptions, ReceiptDownloader, RunReport};
use crate::duration::format_duration;
use crate::links::extract_links_with_prefix;

/// Read the saved billing page at `html_path` and download its receipts.
pub async fn fetch_receipts_from_file<B, F, Fut>(
    html_path: &Path,
    link_prefix: &str,
    options: DownloadOptions,
    launch: F,
) -> Result<Option<RunReport>>
where
    B: BrowserSession,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<B>>,
{
    let html = std::fs::read_to_string(html_path)
        .with_context(|| format!("Failed to read HTML file: {}", html_path.display()))?;
    fetch_receipts(&html, link_prefix, options, launch).await
}

/// Download every receipt linked from `html`.
///
/// Returns `None` when the page has no invoice links; `launch` is only
/// called once there is something to download.
pub async fn fetch_receipts<B, F, Fut>(
    html: &str,
    link_prefix: &str,
    options: DownloadOptions,
    launch: F,
) -> Result<Option<RunReport>>
where
    B: BrowserSession,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<B>>,
{
    let urls = extract_links_with_prefix(html, link_prefix);
    if urls.is_empty() {
        println!("No Stripe invoice links found in the provided HTML.");
        return Ok(None);
    }

    std::fs::create_dir_all(&options.out_dir).with_context(|| {
        format!("Failed to create output dir: {}", options.out_dir.display())
    })?;
    let out_dir = options
        .out_dir
        .canonicalize()
        .unwrap_or_else(|_| options.out_dir.clone());
    println!(
        "Found {} invoice links. Saving to: {}",
        urls.len(),
        out_dir.display()
    );
    if options.early_stop {
        println!("Early stop enabled: will exit on first duplicate.");
    }

    tracing::debug!(
        render_wait = %format_duration(options.render_wait),
        link_delay = %format_duration(options.link_delay),
        labels = ?options.labels,
        "Starting downloads"
    );

    let browser = launch().await?;
    let mut downloader = ReceiptDownloader::new(browser, options);
    let result = downloader.run(&urls).await;

    let mut browser = downloader.into_browser();
    if let Err(err) = browser.close().await {
        tracing::warn!(error = %err, "Failed to close browser");
    }

    let report = result?;
    println!(
        "Done: {} saved, {} already present, {} without a download button.",
        report.saved.len(),
        report.skipped.len() + usize::from(report.stopped_at.is_some()),
        report.not_found.len()
    );
    tracing::info!(
        processed = report.processed,
        saved = report.saved.len(),
        not_found = report.not_found.len(),
        "Run finished"
    );

    Ok(Some(report))
}
