//! Chrome/Chromium [`BrowserSession`] over the DevTools protocol.
//!
//! Downloads are allowed into a private staging directory; a download is a
//! new file there that is no longer a `.crdownload` partial. Chrome names it
//! after the suggested filename, which is what we report back.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::{AutomationError, BrowserSession, Download, Locator};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a finished-looking file must keep its size before it is taken.
const DOWNLOAD_SETTLE: Duration = Duration::from_secs(1);
const PARTIAL_SUFFIX: &str = ".crdownload";

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// How to launch the browser.
#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    /// Show the browser window.
    pub headed: bool,
    /// Explicit Chrome/Chromium executable; searched for when unset.
    pub chrome_path: Option<PathBuf>,
    /// User-data dir to reuse cookies from. A throwaway profile when unset.
    pub profile_dir: Option<PathBuf>,
    /// Extra command-line switches.
    pub args: Vec<String>,
}

/// One Chrome process with a single page reused across invoices.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    staging: TempDir,
    /// Staging contents right before the last click.
    armed: Option<HashSet<PathBuf>>,
}

impl ChromeSession {
    pub async fn launch(options: &ChromeOptions) -> Result<Self> {
        let chrome_path = match &options.chrome_path {
            Some(path) => path.display().to_string(),
            None => find_chrome().context(
                "Chrome/Chromium not found. Install Chrome or Chromium, or set browser.chrome_path.",
            )?,
        };
        tracing::debug!(chrome = %chrome_path, headed = options.headed, "Launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if options.headed {
            builder = builder.with_head();
        }
        if let Some(profile_dir) = &options.profile_dir {
            std::fs::create_dir_all(profile_dir).with_context(|| {
                format!("Failed to create profile dir: {}", profile_dir.display())
            })?;
            builder = builder.user_data_dir(profile_dir);
        }
        for arg in &options.args {
            builder = builder.arg(arg.clone());
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to configure browser: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser.new_page("about:blank").await?;

        let staging = tempfile::Builder::new()
            .prefix("stripe-receipts-")
            .tempdir()
            .context("Failed to create download staging dir")?;
        setup_download_handling(&page, staging.path()).await?;

        Ok(Self {
            browser,
            page,
            handler_task,
            staging,
            armed: None,
        })
    }

    fn staged_files(&self) -> Result<HashSet<PathBuf>> {
        let entries = std::fs::read_dir(self.staging.path()).with_context(|| {
            format!("Failed to read staging dir: {}", self.staging.path().display())
        })?;
        Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
    }

    fn staged_sizes(&self) -> Result<Vec<(PathBuf, u64)>> {
        let entries = std::fs::read_dir(self.staging.path()).with_context(|| {
            format!("Failed to read staging dir: {}", self.staging.path().display())
        })?;
        Ok(entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let size = e.metadata().ok()?.len();
                Some((e.path(), size))
            })
            .collect())
    }
}

/// Decides when a download in the staging dir is finished.
///
/// A file counts once it is new, non-empty, no partial download is still in
/// flight, and its size has not changed for `settle`.
struct DownloadWatch {
    initial: HashSet<PathBuf>,
    settle: Duration,
    candidate: Option<(PathBuf, u64, Instant)>,
}

impl DownloadWatch {
    fn new(initial: HashSet<PathBuf>, settle: Duration) -> Self {
        Self {
            initial,
            settle,
            candidate: None,
        }
    }

    fn observe(&mut self, files: &[(PathBuf, u64)], now: Instant) -> Option<PathBuf> {
        let new_files: Vec<&(PathBuf, u64)> = files
            .iter()
            .filter(|(path, _)| !self.initial.contains(path))
            .collect();

        if new_files.iter().any(|(path, _)| is_partial(path)) {
            self.candidate = None;
            return None;
        }

        let Some((path, size)) = new_files
            .into_iter()
            .filter(|(_, size)| *size > 0)
            .min_by(|a, b| a.0.cmp(&b.0))
        else {
            self.candidate = None;
            return None;
        };

        let stable_since = match &self.candidate {
            Some((seen, seen_size, since)) if seen == path && seen_size == size => Some(*since),
            _ => None,
        };
        match stable_since {
            Some(since) if now.duration_since(since) >= self.settle => Some(path.clone()),
            Some(_) => None,
            None => {
                self.candidate = Some((path.clone(), *size, now));
                None
            }
        }
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .ends_with(PARTIAL_SUFFIX)
}

#[async_trait::async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AutomationError> {
        Ok(self
            .page
            .content()
            .await
            .context("Failed to read page content")?)
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<(), AutomationError> {
        let xpath = locator_xpath(locator);
        self.armed = Some(self.staged_files()?);

        let start = Instant::now();
        loop {
            // Elements may be present but not yet clickable; try each match in order.
            match self.page.find_xpaths(xpath.as_str()).await {
                Ok(elements) => {
                    for element in &elements {
                        match element.click().await {
                            Ok(_) => return Ok(()),
                            Err(err) => {
                                tracing::trace!(%locator, error = %err, "Click attempt failed")
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(%locator, error = %err, "Element lookup failed");
                    // A lookup error on a live page means "not there yet"; a dead page is fatal.
                    self.page
                        .url()
                        .await
                        .context("Browser stopped responding during element lookup")?;
                }
            }

            if start.elapsed() >= timeout {
                return Err(AutomationError::timeout(locator.to_string(), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn await_download(&mut self, timeout: Duration) -> Result<Download, AutomationError> {
        let initial = match self.armed.take() {
            Some(files) => files,
            None => self.staged_files()?,
        };
        let mut watch = DownloadWatch::new(initial, DOWNLOAD_SETTLE);

        let start = Instant::now();
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if let Some(path) = watch.observe(&self.staged_sizes()?, Instant::now()) {
                let suggested_filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                return Ok(Download {
                    suggested_filename,
                    path,
                });
            }

            if start.elapsed() >= timeout {
                return Err(AutomationError::timeout("download", timeout));
            }
        }
    }

    async fn save_download(&mut self, download: &Download, dest: &Path) -> Result<(), AutomationError> {
        if std::fs::rename(&download.path, dest).is_err() {
            // Staging may live on another filesystem.
            std::fs::copy(&download.path, dest)
                .with_context(|| format!("Failed to save download to {}", dest.display()))?;
            let _ = std::fs::remove_file(&download.path);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        self.browser
            .close()
            .await
            .context("Failed to close browser")?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

async fn setup_download_handling(page: &Page, download_dir: &Path) -> Result<()> {
    let download_params = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.display().to_string())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build download params: {e}"))?;

    page.execute(download_params).await?;
    Ok(())
}

/// Compile a locator to an XPath query with ASCII case folding.
pub(crate) fn locator_xpath(locator: &Locator) -> String {
    let needle = xpath_literal(&locator.needle().to_lowercase());
    match locator {
        Locator::Role { role, .. } => {
            let name = lowercase("normalize-space(concat(., ' ', @aria-label, ' ', @value))");
            format!(
                "//*[({}@role={}) and contains({name}, {needle})]",
                native_role_test(role),
                xpath_literal(role),
            )
        }
        Locator::Text(_) => {
            let text = lowercase("normalize-space(.)");
            format!(
                "//body//*[not(self::script or self::style) and contains({text}, {needle}) \
                 and not(.//*[contains({text}, {needle})])]"
            )
        }
    }
}

fn lowercase(expr: &str) -> String {
    format!("translate({expr}, '{UPPER}', '{LOWER}')")
}

/// Elements that carry `role` implicitly.
fn native_role_test(role: &str) -> &'static str {
    match role {
        "button" => "self::button or (self::input and (@type='button' or @type='submit')) or ",
        "link" => "(self::a and @href) or ",
        _ => "",
    }
}

/// Quote `s` as an XPath 1.0 string literal.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Find Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(str::to_string)
}
