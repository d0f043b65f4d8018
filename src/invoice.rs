//! Invoice metadata scraped from a rendered hosted-invoice page.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

const DETAILS_TABLE: &str = "table.InvoiceDetails-table";
const DETAILS_ROW: &str = "tr.LabeledTableRow";

const INVOICE_NUMBER_LABEL: &str = "Invoice number";
const PAYMENT_DATE_LABEL: &str = "Payment date";

/// Human-readable payment date as rendered on the page, e.g. "October 30, 2025".
const PAYMENT_DATE_FORMAT: &str = "%B %d, %Y";

/// Invoice number and payment date, when the page exposes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceInfo {
    pub invoice_number: Option<String>,
    /// Normalized to `YYYY-MM-DD` when parseable.
    pub payment_date: Option<String>,
}

impl InvoiceInfo {
    pub fn new(invoice_number: impl Into<String>, payment_date: impl Into<String>) -> Self {
        Self {
            invoice_number: Some(invoice_number.into()),
            payment_date: Some(payment_date.into()),
        }
    }

    /// Both fields are known.
    pub fn is_complete(&self) -> bool {
        self.invoice_number.is_some() && self.payment_date.is_some()
    }
}

/// Read the invoice details table out of `page_html`.
///
/// A missing table or missing labels leave the corresponding fields unset.
pub fn extract_invoice_info(page_html: &str) -> InvoiceInfo {
    let document = Html::parse_document(page_html);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse(DETAILS_TABLE),
        Selector::parse(DETAILS_ROW),
        Selector::parse("td"),
    ) else {
        return InvoiceInfo::default();
    };

    let mut invoice_number = None;
    let mut payment_date = None;

    if let Some(table) = document.select(&table_sel).next() {
        for row in table.select(&row_sel) {
            let mut cells = row.select(&cell_sel);
            let (Some(label), Some(value)) = (cells.next(), cells.next()) else {
                continue;
            };

            match cell_text(label).as_str() {
                INVOICE_NUMBER_LABEL => invoice_number = Some(cell_text(value)),
                PAYMENT_DATE_LABEL => payment_date = Some(cell_text(value)),
                _ => {}
            }
        }
    }

    InvoiceInfo {
        invoice_number,
        payment_date: payment_date.as_deref().map(normalize_payment_date),
    }
}

/// Normalize "October 30, 2025" to "2025-10-30".
///
/// Anything that doesn't parse is kept with spaces replaced by hyphens.
pub fn normalize_payment_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, PAYMENT_DATE_FORMAT) {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(err) => {
            tracing::debug!(date = raw, error = %err, "Unparseable payment date, using literal");
            raw.replace(' ', "-")
        }
    }
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
