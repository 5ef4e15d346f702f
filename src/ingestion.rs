use crate::error::Result;
use crate::schema::RawLineRecord;
use crate::utils::non_blank;
use log::debug;
use serde::{Deserialize, Serialize};

/// Amount column as it arrives from an export: a JSON number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(f64),
    Text(String),
}

/// A row as exported by the accounting system, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub sale_type: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub document_class: Option<String>,
    #[serde(default)]
    pub value: Option<AmountField>,
    #[serde(default)]
    pub advisor_code: Option<String>,
}

/// Parses an exported amount. Malformed or missing amounts are `0.0`.
///
/// Handles currency symbols and codes (`$ 1.500`, `COP 1.500`), thousands and
/// decimal separators in either convention (`1.234.567,89`, `1,234,567.89`),
/// and negatives written as `-300`, `300-` or `(300)`. A single separator
/// followed by exactly three digits is read as a thousands separator.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let (mut negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let body: String = body
        .chars()
        .filter(|&c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£' | '\''))
        .collect();
    let mut body = body.trim_matches(|c: char| c.is_ascii_alphabetic());

    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest;
    } else if let Some(rest) = body.strip_suffix('-') {
        negative = !negative;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }

    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return 0.0;
    }

    let value = normalize_separators(body).parse::<f64>().unwrap_or(0.0);
    if negative {
        -value
    } else {
        value
    }
}

fn normalize_separators(body: &str) -> String {
    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    match (dots, commas) {
        (0, 0) => body.to_string(),
        (_, 0) | (0, _) => {
            let sep = if dots > 0 { '.' } else { ',' };
            let count = dots.max(commas);
            let digits_after = body.rsplit(sep).next().map(str::len).unwrap_or(0);
            if count > 1 || digits_after == 3 {
                body.replace(sep, "")
            } else {
                body.replace(sep, ".")
            }
        }
        _ => {
            let last_dot = body.rfind('.').unwrap_or(0);
            let last_comma = body.rfind(',').unwrap_or(0);
            let (thousands, decimal) = if last_dot > last_comma {
                (',', '.')
            } else {
                ('.', ',')
            };
            body.replace(thousands, "").replace(decimal, ".")
        }
    }
}

pub fn normalize_row(row: &ExportRow) -> RawLineRecord {
    let value = match &row.value {
        Some(AmountField::Number(n)) if n.is_finite() => *n,
        Some(AmountField::Text(text)) => parse_amount(text),
        _ => 0.0,
    };

    RawLineRecord {
        customer_id: non_blank(row.customer_id.as_deref()).map(str::to_string),
        date: non_blank(row.date.as_deref()).map(str::to_string),
        sale_type: non_blank(row.sale_type.as_deref()).map(str::to_string),
        payment_method: non_blank(row.payment_method.as_deref()).map(str::to_string),
        document_class: non_blank(row.document_class.as_deref()).map(str::to_string),
        value,
        advisor_code: non_blank(row.advisor_code.as_deref()).map(str::to_string),
    }
}

pub fn normalize_rows(rows: &[ExportRow]) -> Vec<RawLineRecord> {
    rows.iter().map(normalize_row).collect()
}

/// Parses a JSON array of export rows into normalized records.
pub fn load_records_from_json(json: &str) -> Result<Vec<RawLineRecord>> {
    let rows: Vec<ExportRow> = serde_json::from_str(json)?;
    debug!("Loaded {} export rows from JSON", rows.len());
    Ok(normalize_rows(&rows))
}
