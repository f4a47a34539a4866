use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::Field;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the source sheet
// ---------------------------------------------------------------------------

/// A dynamically-typed spreadsheet cell, independent of the source format.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    /// Empty cells and whitespace-only text count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One sheet as read from disk: header labels plus raw cell rows.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

// ---------------------------------------------------------------------------
// Derived categories
// ---------------------------------------------------------------------------

/// Bucket of a numeric rating score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RatingBand {
    High,
    Medium,
    Low,
    NoRating,
}

impl RatingBand {
    pub const ALL: [RatingBand; 4] = [
        RatingBand::High,
        RatingBand::Medium,
        RatingBand::Low,
        RatingBand::NoRating,
    ];

    /// `>= 80` is High, `>= 65` is Medium, anything lower is Low.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            None => RatingBand::NoRating,
            Some(s) if s >= 80.0 => RatingBand::High,
            Some(s) if s >= 65.0 => RatingBand::Medium,
            Some(_) => RatingBand::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RatingBand::High => "High",
            RatingBand::Medium => "Medium",
            RatingBand::Low => "Low",
            RatingBand::NoRating => "No Rating",
        }
    }
}

impl fmt::Display for RatingBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket of the free-text opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpinionCategory {
    Positive,
    Negative,
    Neutral,
    Attention,
    Other,
    NotEvaluated,
}

/// Ordered keyword rules; the first rule with a matching keyword wins.
const OPINION_RULES: &[(&[&str], OpinionCategory)] = &[
    (&["positivo", "positive"], OpinionCategory::Positive),
    (&["negativo", "negative", "default"], OpinionCategory::Negative),
    (&["neutro", "neutral"], OpinionCategory::Neutral),
    (
        &["atenção", "attention", "requer", "requires"],
        OpinionCategory::Attention,
    ),
];

impl OpinionCategory {
    pub const ALL: [OpinionCategory; 6] = [
        OpinionCategory::Positive,
        OpinionCategory::Negative,
        OpinionCategory::Neutral,
        OpinionCategory::Attention,
        OpinionCategory::Other,
        OpinionCategory::NotEvaluated,
    ];

    /// Classify opinion text by case-insensitive keyword match.
    pub fn classify(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return OpinionCategory::NotEvaluated;
        };
        let lower = text.to_lowercase();
        OPINION_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, category)| *category)
            .unwrap_or(OpinionCategory::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            OpinionCategory::Positive => "Positive",
            OpinionCategory::Negative => "Negative",
            OpinionCategory::Neutral => "Neutral",
            OpinionCategory::Attention => "Attention",
            OpinionCategory::Other => "Other",
            OpinionCategory::NotEvaluated => "Not Evaluated",
        }
    }
}

impl fmt::Display for OpinionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A category label that matched none of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for RatingBand {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RatingBand::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl FromStr for OpinionCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpinionCategory::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Rating scale label, present only in newer sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingScale {
    Labelled(String),
    /// Column exists but the cell is blank.
    Blank,
    /// The sheet has no rating scale column at all.
    Unavailable,
}

/// Maximum number of characters kept in a conclusion summary.
pub const SUMMARY_CHARS: usize = 300;

/// Shorten a conclusion to [`SUMMARY_CHARS`] characters plus `...`.
pub fn summarize_conclusion(text: &str) -> String {
    if text.chars().count() <= SUMMARY_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SUMMARY_CHARS).collect();
    out.push_str("...");
    out
}

/// `YYYY-MM` period of a date.
pub fn month_period(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

// ---------------------------------------------------------------------------
// CreditRecord – one normalized row
// ---------------------------------------------------------------------------

/// A single credit evaluation (one row of the source sheet).
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRecord {
    pub id: Option<i64>,
    pub company_name: String,
    pub kind: Option<String>,
    pub submission_date: Option<NaiveDate>,
    pub rating_score: Option<f64>,
    pub rating_scale: RatingScale,
    pub opinion_text: Option<String>,
    pub conclusion_text: Option<String>,
    /// Columns the mapping does not know about, kept verbatim.
    pub extra: BTreeMap<String, CellValue>,

    pub rating_band: RatingBand,
    pub opinion_category: OpinionCategory,
    pub month_period: Option<String>,
    pub conclusion_summary: Option<String>,
}

/// Source fields of a record before the derived columns are computed.
#[derive(Debug, Clone, Default)]
pub struct RecordFields {
    pub id: Option<i64>,
    pub company_name: String,
    pub kind: Option<String>,
    pub submission_date: Option<NaiveDate>,
    pub rating_score: Option<f64>,
    pub rating_scale: Option<RatingScale>,
    pub opinion_text: Option<String>,
    pub conclusion_text: Option<String>,
    pub extra: BTreeMap<String, CellValue>,
}

impl CreditRecord {
    /// Build a record, deriving every computed column from `fields`.
    pub fn derive(fields: RecordFields) -> Self {
        let rating_band = RatingBand::from_score(fields.rating_score);
        let opinion_category = OpinionCategory::classify(fields.opinion_text.as_deref());
        let month_period = fields.submission_date.map(month_period);
        let conclusion_summary = fields.conclusion_text.as_deref().map(summarize_conclusion);

        CreditRecord {
            id: fields.id,
            company_name: fields.company_name,
            kind: fields.kind,
            submission_date: fields.submission_date,
            rating_score: fields.rating_score,
            rating_scale: fields.rating_scale.unwrap_or(RatingScale::Unavailable),
            opinion_text: fields.opinion_text,
            conclusion_text: fields.conclusion_text,
            extra: fields.extra,
            rating_band,
            opinion_category,
            month_period,
            conclusion_summary,
        }
    }
}

// ---------------------------------------------------------------------------
// CreditTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// Soft schema problem: an optional column is missing from the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("optional column for '{field}' not found; values marked unavailable")]
pub struct SchemaMismatch {
    pub field: Field,
}

/// The normalized table. Never mutated after load.
#[derive(Debug, Clone, Default)]
pub struct CreditTable {
    pub records: Vec<CreditRecord>,
    /// Header labels not mapped to any canonical field.
    pub extra_columns: Vec<String>,
    pub schema_warnings: Vec<SchemaMismatch>,
}

impl CreditTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the records at `indices`, skipping out-of-range ones.
    pub fn select(&self, indices: &[usize]) -> Vec<&CreditRecord> {
        indices.iter().filter_map(|&i| self.records.get(i)).collect()
    }

    /// Earliest and latest submission dates, if any record is dated.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.submission_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}
