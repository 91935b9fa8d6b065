// 🧹 Normalizer - raw rows → canonical rows
//
// Lenient by policy: a row that fails any check is dropped and recorded as a
// ValidationError; the batch keeps going. Downstream stages only ever see
// `CanonicalRow`.

use crate::config::PipelineConfig;
use crate::entities::TransactionKind;
use crate::error::ValidationError;
use crate::extract::RawBatch;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

// ============================================================================
// CANONICAL SCHEMA
// ============================================================================

/// Validated, typed row. `amount` is already non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    /// 0-based index of the raw row this came from
    pub source_row: usize,
    pub date: NaiveDateTime,
    pub description: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub account: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Description,
    Amount,
    Kind,
    Account,
    Category,
}

/// Map a source header onto the canonical field it feeds, if any.
///
/// Headers are folded to lower snake case first, so `"Account Name"`,
/// `"account-name"` and `" ACCOUNT_NAME "` all match.
fn canonical_field(header: &str) -> Option<Field> {
    let folded: String = header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, ' ' | '-' | '.') { '_' } else { c })
        .collect();

    match folded.as_str() {
        "date" | "data" | "transaction_date" => Some(Field::Date),
        "description" | "descricao" | "descrição" | "memo" | "details" => Some(Field::Description),
        "amount" | "valor" | "value" => Some(Field::Amount),
        "kind" | "tipo" | "type" | "direction" => Some(Field::Kind),
        "account" | "conta" | "account_name" => Some(Field::Account),
        "category" | "categoria" => Some(Field::Category),
        _ => None,
    }
}

/// Column index per canonical field; first matching header wins
#[derive(Debug, Default)]
struct ColumnMap {
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    kind: Option<usize>,
    account: Option<usize>,
    category: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();

        for (idx, header) in headers.iter().enumerate() {
            let slot = match canonical_field(header) {
                Some(Field::Date) => &mut map.date,
                Some(Field::Description) => &mut map.description,
                Some(Field::Amount) => &mut map.amount,
                Some(Field::Kind) => &mut map.kind,
                Some(Field::Account) => &mut map.account,
                Some(Field::Category) => &mut map.category,
                None => {
                    debug!(column = %header, "discarding non-canonical column");
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }

        map
    }
}

fn cell(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).map(|s| s.trim()).unwrap_or("")
}

// ============================================================================
// VALUE PARSERS
// ============================================================================

/// Coerce a textual amount to a signed number.
///
/// Handles currency symbols, `(x)` negatives, and both `1,234.56` and
/// `1.234,56` styles. A lone separator followed by exactly three digits is a
/// thousands separator (`3.000` is three thousand). Non-finite results are
/// rejected, and so is a sign inside parentheses.
pub fn parse_amount(value: &str) -> Option<f64> {
    let mut text = value.trim();
    if text.is_empty() {
        return None;
    }

    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negative = true;
        text = &text[1..text.len() - 1];
    }

    let cleaned: String = text
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£'))
        .collect();

    if negative && cleaned.starts_with(|c: char| c == '-' || c == '+') {
        return None;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => single_separator(&cleaned, '.')?,
        (None, Some(_)) => single_separator(&cleaned, ',')?,
        (None, None) => cleaned,
    };

    let parsed: f64 = normalized.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    Some(if negative { -parsed } else { parsed })
}

/// Only one kind of separator present: thousands grouping or a decimal mark
fn single_separator(number: &str, separator: char) -> Option<String> {
    if is_thousands_grouped(number, separator) {
        Some(number.replace(separator, ""))
    } else if number.matches(separator).count() == 1 {
        Some(number.replace(separator, "."))
    } else {
        None
    }
}

/// `1.234.567`: a 1-3 digit lead without a leading zero, then 3-digit groups
fn is_thousands_grouped(number: &str, separator: char) -> bool {
    let digits = number.trim_start_matches(|c: char| c == '-' || c == '+');
    let mut groups = digits.split(separator);

    let lead = groups.next().unwrap_or("");
    let lead_ok = (1..=3).contains(&lead.len())
        && !lead.starts_with('0')
        && lead.chars().all(|c| c.is_ascii_digit());

    let rest: Vec<&str> = groups.collect();
    lead_ok
        && !rest.is_empty()
        && rest
            .iter()
            .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Try each format in order; formats without a time yield midnight.
pub fn parse_date(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();

    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    })
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Output of one normalization pass
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    pub rejected: Vec<ValidationError>,
}

impl Normalized {
    pub fn processed(&self) -> usize {
        self.rows.len() + self.rejected.len()
    }

    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }
}

pub struct Normalizer {
    date_formats: Vec<String>,
    default_account: String,
}

impl Normalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Normalizer {
            date_formats: config.date_formats.clone(),
            default_account: config.default_account.trim().to_string(),
        }
    }

    pub fn normalize(&self, batch: &RawBatch) -> Normalized {
        let columns = ColumnMap::from_headers(&batch.headers);
        let mut out = Normalized::default();

        for (idx, row) in batch.rows.iter().enumerate() {
            match self.normalize_row(idx, row, &columns) {
                Ok(canonical) => out.rows.push(canonical),
                Err(err) => {
                    warn!(row = idx, field = err.field(), "dropping row: {}", err);
                    out.rejected.push(err);
                }
            }
        }

        info!(
            processed = out.processed(),
            kept = out.rows.len(),
            skipped = out.skipped(),
            "normalized batch"
        );

        out
    }

    fn normalize_row(
        &self,
        row_idx: usize,
        row: &[String],
        columns: &ColumnMap,
    ) -> Result<CanonicalRow, ValidationError> {
        // Date
        let raw_date = cell(row, columns.date);
        if raw_date.is_empty() {
            return Err(ValidationError::MissingField {
                row: row_idx,
                field: "date",
            });
        }
        let date = parse_date(raw_date, &self.date_formats).ok_or_else(|| {
            ValidationError::InvalidDate {
                row: row_idx,
                value: raw_date.to_string(),
            }
        })?;

        // Amount
        let raw_amount = cell(row, columns.amount);
        if raw_amount.is_empty() {
            return Err(ValidationError::MissingField {
                row: row_idx,
                field: "amount",
            });
        }
        let signed = parse_amount(raw_amount).ok_or_else(|| ValidationError::InvalidAmount {
            row: row_idx,
            value: raw_amount.to_string(),
        })?;

        // Kind: explicit column wins, otherwise the sign decides
        let raw_kind = cell(row, columns.kind);
        let kind = if raw_kind.is_empty() {
            TransactionKind::from_sign(signed)
        } else {
            TransactionKind::parse(raw_kind).ok_or_else(|| ValidationError::InvalidKind {
                row: row_idx,
                value: raw_kind.to_string(),
            })?
        };

        // Category
        let category = cell(row, columns.category).to_lowercase();
        if category.is_empty() {
            return Err(ValidationError::MissingField {
                row: row_idx,
                field: "category",
            });
        }

        // Account
        let account = match cell(row, columns.account) {
            "" => self.default_account.clone(),
            name => name.to_string(),
        };
        if account.is_empty() {
            return Err(ValidationError::MissingField {
                row: row_idx,
                field: "account",
            });
        }

        Ok(CanonicalRow {
            source_row: row_idx,
            date,
            description: cell(row, columns.description).to_lowercase(),
            amount: signed.abs(),
            kind,
            account,
            category,
        })
    }
}
