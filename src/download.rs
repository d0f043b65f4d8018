//! Per-link download driver.
//!
//! For each invoice link: navigate, let the page render, read the details
//! table, then either skip an existing receipt or search for a download
//! affordance label by label (role locator before text locator) and save the
//! first download that arrives.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::browser::{AutomationError, BrowserSession, Download, Locator};
use crate::filename::{receipt_filename, unique_filename};
use crate::invoice::{extract_invoice_info, InvoiceInfo};

/// Button texts that show up on Stripe invoice pages, most specific first.
pub const DEFAULT_DOWNLOAD_LABELS: &[&str] = &[
    "Download receipt",
    "Download invoice",
    "Download PDF",
    "Download",
];

/// Run-wide settings for [`ReceiptDownloader`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub out_dir: PathBuf,
    /// Stop the whole run at the first receipt that already exists.
    pub early_stop: bool,
    /// Flat wait after navigation for client-side rendering.
    pub render_wait: Duration,
    /// Pause between links.
    pub link_delay: Duration,
    pub click_timeout: Duration,
    pub download_timeout: Duration,
    pub labels: Vec<String>,
}

impl DownloadOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            early_stop: true,
            render_wait: Duration::from_secs(5),
            link_delay: Duration::from_millis(400),
            click_timeout: Duration::from_secs(2),
            download_timeout: Duration::from_secs(15),
            labels: DEFAULT_DOWNLOAD_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        }
    }
}

/// Locator strategies, tried in this order for every label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Role,
    Text,
}

impl Strategy {
    pub const ORDER: [Strategy; 2] = [Strategy::Role, Strategy::Text];

    pub fn locator(self, label: &str) -> Locator {
        match self {
            Strategy::Role => Locator::button(label),
            Strategy::Text => Locator::text(label),
        }
    }
}

/// What happened to one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Saved { filename: String },
    /// Receipt already on disk; moved on to the next link.
    SkippedExisting { filename: String },
    /// Receipt already on disk; the run ends here.
    StoppedExisting { filename: String },
    /// No label/strategy combination produced a download.
    NotFound,
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub saved: Vec<String>,
    pub skipped: Vec<String>,
    pub not_found: Vec<String>,
    pub stopped_at: Option<String>,
}

impl RunReport {
    fn record(&mut self, url: &str, outcome: &LinkOutcome) {
        self.processed += 1;
        match outcome {
            LinkOutcome::Saved { filename } => self.saved.push(filename.clone()),
            LinkOutcome::SkippedExisting { filename } => self.skipped.push(filename.clone()),
            LinkOutcome::StoppedExisting { filename } => self.stopped_at = Some(filename.clone()),
            LinkOutcome::NotFound => self.not_found.push(url.to_string()),
        }
    }
}

/// Drives one browser session through a list of invoice links.
pub struct ReceiptDownloader<B> {
    browser: B,
    options: DownloadOptions,
    /// Names written during this run.
    written: HashSet<String>,
}

impl<B: BrowserSession> ReceiptDownloader<B> {
    pub fn new(browser: B, options: DownloadOptions) -> Self {
        Self {
            browser,
            options,
            written: HashSet::new(),
        }
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Process `urls` in order. Missing buttons are reported; engine failures end the run.
    pub async fn run(&mut self, urls: &[String]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let total = urls.len();

        for (i, url) in urls.iter().enumerate() {
            let index = i + 1;
            println!("[{index}/{total}] {url}");

            let outcome = self.process_link(index, url).await?;
            report.record(url, &outcome);

            if matches!(outcome, LinkOutcome::StoppedExisting { .. }) {
                break;
            }

            tokio::time::sleep(self.options.link_delay).await;
        }

        Ok(report)
    }

    /// Handle one link; `index` is 1-based and feeds the fallback filename.
    pub async fn process_link(&mut self, index: usize, url: &str) -> Result<LinkOutcome> {
        self.browser.navigate(url).await?;
        tokio::time::sleep(self.options.render_wait).await;

        let page_html = self.browser.content().await?;
        let info = extract_invoice_info(&page_html);
        tracing::debug!(
            url,
            invoice_number = ?info.invoice_number,
            payment_date = ?info.payment_date,
            "Extracted invoice details"
        );

        if let Some(filename) = info.target_filename() {
            if self.options.out_dir.join(&filename).exists() {
                if self.options.early_stop {
                    println!("  → already exists: {filename} (stopping)");
                    return Ok(LinkOutcome::StoppedExisting { filename });
                }
                println!("  → already exists: {filename} (skipping)");
                return Ok(LinkOutcome::SkippedExisting { filename });
            }
        }

        let Some(download) = self.trigger_download().await? else {
            println!("  ! Could not find a download button on this page (skipped).");
            return Ok(LinkOutcome::NotFound);
        };

        let filename = self.choose_filename(&info, &download, index);
        let dest = self.options.out_dir.join(&filename);
        self.browser.save_download(&download, &dest).await?;
        println!("  → saved: {filename}");

        Ok(LinkOutcome::Saved { filename })
    }

    /// Walk labels in priority order, role locator first, until a click yields a download.
    async fn trigger_download(&mut self) -> Result<Option<Download>> {
        for label in &self.options.labels {
            for strategy in Strategy::ORDER {
                let locator = strategy.locator(label);

                match self
                    .browser
                    .click(&locator, self.options.click_timeout)
                    .await
                {
                    Ok(()) => {}
                    Err(err) if err.is_timeout() => {
                        tracing::debug!(%label, ?strategy, "No clickable match");
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }

                match self
                    .browser
                    .await_download(self.options.download_timeout)
                    .await
                {
                    Ok(download) => {
                        tracing::debug!(%label, ?strategy, "Download received");
                        return Ok(Some(download));
                    }
                    Err(AutomationError::Timeout { .. }) => {
                        tracing::debug!(%label, ?strategy, "Clicked but no download arrived");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        Ok(None)
    }

    fn choose_filename(&mut self, info: &InvoiceInfo, download: &Download, index: usize) -> String {
        let filename = receipt_filename(info, download.suggested_filename.as_deref(), index);
        let filename = if info.is_complete() {
            filename
        } else {
            unique_filename(&filename, index, &self.written)
        };
        self.written.insert(filename.clone());
        filename
    }
}
