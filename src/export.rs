//! Attachment export: CSV streams and a renderer-agnostic spreadsheet model.
//!
//! Reports are reduced to a header row plus ordered field tuples here;
//! turning a [`Sheet`] into a concrete document format (XLSX, PDF) is the
//! job of a [`DocumentRenderer`] implementation. The bundled renderer
//! serializes sheets as CSV so exports work without any office-format
//! dependency.

use anyhow::Result;
use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

/// Format integer cents as a currency string, `$#,##0.00` style.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = cents / 100;
    let frac = cents % 100;
    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}.{frac:02}")
}

/// Cents as fractional dollars, for chart data.
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Serialize a header and rows into CSV bytes.
pub fn csv_bytes(header: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    Ok(writer.into_inner()?)
}

/// Build a download response with a `Content-Disposition: attachment` header.
pub fn attachment_response(filename: &str, content_type: &str, body: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Integer cents; renderers apply the `$#,##0.00` number format.
    Currency(i64),
}

impl Cell {
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Cell::Currency(c) => format_cents(*c),
        }
    }
}

/// A spreadsheet page: bold, centered header row over data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Auto-sized width per column: longest rendered value plus padding,
    /// scaled slightly so text does not touch the cell borders.
    pub fn column_widths(&self) -> Vec<f64> {
        let cols = self.headers.len();
        let mut widths = vec![0usize; cols];
        for (i, h) in self.headers.iter().enumerate() {
            widths[i] = h.chars().count();
        }
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(cols) {
                widths[i] = widths[i].max(cell.display().chars().count());
            }
        }
        widths.into_iter().map(|w| (w + 2) as f64 * 1.2).collect()
    }
}

pub trait DocumentRenderer: Send + Sync {
    /// Render a sheet into a downloadable byte stream.
    fn render(&self, sheet: &Sheet) -> Result<Vec<u8>>;
    fn extension(&self) -> &'static str;
    fn content_type(&self) -> &'static str;
}

/// Fallback renderer: CSV text, currency cells pre-formatted.
pub struct CsvDocumentRenderer;

impl DocumentRenderer for CsvDocumentRenderer {
    fn render(&self, sheet: &Sheet) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&sheet.headers)?;
        for row in &sheet.rows {
            let record: Vec<String> = row.iter().map(Cell::display).collect();
            writer.write_record(&record)?;
        }
        Ok(writer.into_inner()?)
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn content_type(&self) -> &'static str {
        "text/csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_formatting() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(123_456), "$1,234.56");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
        assert_eq!(format_cents(-250), "-$2.50");
    }

    #[test]
    fn column_widths_track_longest_value() {
        let mut sheet = Sheet::new("Sales Report", &["No", "Customer"]);
        sheet.push_row(vec![
            Cell::Text("1".into()),
            Cell::Text("A very long customer name".into()),
        ]);
        let widths = sheet.column_widths();
        // header "No" wins column 0, the 25-char name wins column 1
        assert_eq!(widths[0], (2 + 2) as f64 * 1.2);
        assert_eq!(widths[1], (25 + 2) as f64 * 1.2);
    }

    #[test]
    fn csv_renderer_formats_currency_cells() {
        let mut sheet = Sheet::new("Sales Report", &["Order", "Amount"]);
        sheet.push_row(vec![Cell::Text("A1".into()), Cell::Currency(123_456)]);
        let bytes = CsvDocumentRenderer.render(&sheet).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Order,Amount"));
        assert!(text.contains("\"$1,234.56\""));
    }

    #[test]
    fn csv_bytes_quotes_embedded_commas() {
        let rows = vec![vec!["Smith, Jane".to_string(), "10".to_string()]];
        let bytes = csv_bytes(&["Customer", "Qty"], &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"Smith, Jane\",10"));
    }
}
