#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use stripe_receipts::browser::{AutomationError, BrowserSession, Download, Locator};
use stripe_receipts::download::DownloadOptions;
use tempfile::TempDir;

/// A clickable thing on a scripted page.
#[derive(Debug, Clone)]
pub struct MockElement {
    /// ARIA role, e.g. `Some("button")`; `None` for plain text elements.
    pub role: Option<String>,
    pub text: String,
    /// What clicking it downloads, if anything.
    pub download: Option<MockDownload>,
}

impl MockElement {
    pub fn button(text: impl Into<String>) -> Self {
        Self {
            role: Some("button".to_string()),
            text: text.into(),
            download: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            text: text.into(),
            download: None,
        }
    }

    pub fn downloads(mut self, suggested: Option<&str>, bytes: &[u8]) -> Self {
        self.download = Some(MockDownload {
            suggested_filename: suggested.map(str::to_string),
            bytes: bytes.to_vec(),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockDownload {
    pub suggested_filename: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub html: String,
    pub elements: Vec<MockElement>,
    /// Make `content()` fail like a crashed engine.
    pub broken: bool,
    /// Make `click()` fail like an engine that died after rendering.
    pub crashes_on_click: bool,
}

impl MockPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn crashes_on_click(mut self) -> Self {
        self.crashes_on_click = true;
        self
    }
}

/// Scripted [`BrowserSession`]; every call is appended to a shared log.
pub struct MockBrowser {
    pages: HashMap<String, MockPage>,
    current: Option<String>,
    pending: Option<MockDownload>,
    staging: TempDir,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            current: None,
            pending: None,
            staging: TempDir::new().expect("staging dir"),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, page: MockPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Handle for reading the log after the browser has been moved.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        self.log.clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().expect("log lock poisoned").push(entry);
    }

    fn current_page(&self) -> Option<&MockPage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

fn element_matches(element: &MockElement, locator: &Locator) -> bool {
    match locator {
        Locator::Role { role, .. } => {
            element.role.as_deref() == Some(role.as_str()) && locator.matches(&element.text)
        }
        Locator::Text(_) => locator.matches(&element.text),
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        self.record(format!("navigate {url}"));
        self.current = Some(url.to_string());
        self.pending = None;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AutomationError> {
        match self.current_page() {
            Some(page) if page.broken => Err(anyhow::anyhow!("browser crashed").into()),
            Some(page) => Ok(page.html.clone()),
            None => Ok("<html><body></body></html>".to_string()),
        }
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<(), AutomationError> {
        if self.current_page().is_some_and(|page| page.crashes_on_click) {
            self.record(format!("crash {locator}"));
            return Err(anyhow::anyhow!("browser stopped responding").into());
        }

        let found = self
            .current_page()
            .and_then(|page| page.elements.iter().find(|e| element_matches(e, locator)))
            .cloned();

        match found {
            Some(element) => {
                self.record(format!("click {locator}"));
                self.pending = element.download;
                Ok(())
            }
            None => {
                self.record(format!("miss {locator}"));
                Err(AutomationError::timeout(locator.to_string(), timeout))
            }
        }
    }

    async fn await_download(&mut self, timeout: Duration) -> Result<Download, AutomationError> {
        let Some(pending) = self.pending.take() else {
            self.record("no download".to_string());
            return Err(AutomationError::timeout("download", timeout));
        };

        let staged_name = pending
            .suggested_filename
            .clone()
            .unwrap_or_else(|| "download.bin".to_string());
        let path = self.staging.path().join(staged_name);
        std::fs::write(&path, &pending.bytes).map_err(anyhow::Error::from)?;

        Ok(Download {
            suggested_filename: pending.suggested_filename,
            path,
        })
    }

    async fn save_download(&mut self, download: &Download, dest: &Path) -> Result<(), AutomationError> {
        std::fs::rename(&download.path, dest).map_err(anyhow::Error::from)?;
        self.record(format!("save {}", dest.file_name().unwrap_or_default().to_string_lossy()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        self.record("close".to_string());
        Ok(())
    }
}

/// Rendered hosted-invoice page with a details table.
pub fn invoice_page_html(invoice_number: &str, payment_date: &str) -> String {
    format!(
        r#"<html><body>
             <div class="InvoiceDetails">
               <table class="InvoiceDetails-table"><tbody>
                 <tr class="LabeledTableRow"><td>Invoice number</td><td>{invoice_number}</td></tr>
                 <tr class="LabeledTableRow"><td>Payment date</td><td>{payment_date}</td></tr>
                 <tr class="LabeledTableRow"><td>Payment method</td><td>Visa - 4242</td></tr>
               </tbody></table>
             </div>
           </body></html>"#
    )
}

/// Billing-history page linking to `urls` in order.
pub fn billing_page_html(urls: &[&str]) -> String {
    let rows: String = urls
        .iter()
        .map(|url| format!(r#"<tr><td><a href="{url}" target="_blank">View</a></td></tr>"#))
        .collect();
    format!("<html><body><table>{rows}</table></body></html>")
}

/// Options with every wait zeroed.
pub fn instant_options(out_dir: &Path) -> DownloadOptions {
    let mut options = DownloadOptions::new(out_dir);
    options.render_wait = Duration::ZERO;
    options.link_delay = Duration::ZERO;
    options.click_timeout = Duration::from_millis(10);
    options.download_timeout = Duration::from_millis(10);
    options
}

pub fn log_entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().expect("log lock poisoned").clone()
}
