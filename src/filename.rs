//! Receipt file naming.

use std::collections::HashSet;

use crate::invoice::InvoiceInfo;

impl InvoiceInfo {
    /// `<payment_date>-<invoice_number>.pdf`, when both fields are known.
    pub fn target_filename(&self) -> Option<String> {
        match (&self.payment_date, &self.invoice_number) {
            (Some(date), Some(number)) => Some(sanitize_component(&format!("{date}-{number}.pdf"))),
            _ => None,
        }
    }
}

/// Pick the name a downloaded receipt is saved under.
///
/// Metadata wins, then the browser's suggested filename, then `invoice_<index>.pdf`.
pub fn receipt_filename(info: &InvoiceInfo, suggested: Option<&str>, index: usize) -> String {
    if let Some(name) = info.target_filename() {
        return name;
    }

    suggested
        .map(sanitize_component)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_filename(index))
}

pub fn default_filename(index: usize) -> String {
    format!("invoice_{index}.pdf")
}

/// Insert `-<index>` before the extension: `receipt.pdf` -> `receipt-3.pdf`.
pub fn disambiguate(name: &str, index: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{index}.{ext}"),
        _ => format!("{name}-{index}"),
    }
}

/// First variant of `name` not in `taken`: `name`, then `-<index>`, then
/// `-<index>-2`, `-<index>-3`, ...
pub fn unique_filename(name: &str, index: usize, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let first = disambiguate(name, index);
    let mut candidate = first.clone();
    let mut attempt = 2;
    while taken.contains(&candidate) {
        candidate = disambiguate(&first, attempt);
        attempt += 1;
    }
    candidate
}

/// Make `name` safe to use as a single path component.
///
/// Path separators, NUL and control characters become `_`; leading dots are
/// stripped so the result can't be `.`/`..` or a hidden file.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced.trim().trim_start_matches('.').to_string()
}
