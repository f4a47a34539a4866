use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::data::model::{CreditRecord, OpinionCategory, RatingBand};

// ---------------------------------------------------------------------------
// Summary metrics
// ---------------------------------------------------------------------------

/// Headline numbers for a set of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total: usize,
    /// Record count per distinct kind; unkinded records are not counted.
    pub kind_counts: BTreeMap<String, usize>,
    /// Mean over rated records, `None` when nothing is rated.
    pub mean_rating: Option<f64>,
    /// Percentage of `Negative` opinions, `None` for an empty set.
    pub negative_share: Option<f64>,
}

impl Summary {
    pub fn of(records: &[&CreditRecord]) -> Self {
        let mut kind_counts = BTreeMap::new();
        for kind in records.iter().filter_map(|r| r.kind.as_ref()) {
            *kind_counts.entry(kind.clone()).or_insert(0) += 1;
        }

        let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating_score).collect();
        let mean_rating =
            (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64);

        let negatives = records
            .iter()
            .filter(|r| r.opinion_category == OpinionCategory::Negative)
            .count();
        let negative_share =
            (!records.is_empty()).then(|| negatives as f64 / records.len() as f64 * 100.0);

        Summary {
            total: records.len(),
            kind_counts,
            mean_rating,
            negative_share,
        }
    }

    pub fn kind_count(&self, kind: &str) -> usize {
        self.kind_counts.get(kind).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

/// Count per category, largest first; ties keep declaration order.
fn distribution<T: Ord + Copy>(values: impl Iterator<Item = T>) -> Vec<(T, usize)> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut out: Vec<(T, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

pub fn opinion_distribution(records: &[&CreditRecord]) -> Vec<(OpinionCategory, usize)> {
    distribution(records.iter().map(|r| r.opinion_category))
}

pub fn band_distribution(records: &[&CreditRecord]) -> Vec<(RatingBand, usize)> {
    distribution(records.iter().map(|r| r.rating_band))
}

// ---------------------------------------------------------------------------
// Per-record views
// ---------------------------------------------------------------------------

/// One bar of the rating-per-company chart.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingBar {
    pub company: String,
    pub rating: f64,
    pub opinion: OpinionCategory,
}

/// Rated records, lowest rating first.
pub fn rating_series(records: &[&CreditRecord]) -> Vec<RatingBar> {
    let mut bars: Vec<RatingBar> = records
        .iter()
        .filter_map(|r| {
            r.rating_score.map(|rating| RatingBar {
                company: r.company_name.clone(),
                rating,
                opinion: r.opinion_category,
            })
        })
        .collect();
    bars.sort_by(|a, b| a.rating.total_cmp(&b.rating));
    bars
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%d/%m/%Y").to_string())
}

fn format_rating(rating: Option<f64>) -> String {
    rating.map(|r| format!("{r}")).unwrap_or_else(|| "N/A".to_string())
}

/// One row of the detail table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub company: String,
    pub kind: String,
    /// `DD/MM/YYYY`, empty when undated.
    pub date: String,
    pub rating: Option<f64>,
    pub band: RatingBand,
    pub opinion: OpinionCategory,
    pub opinion_text: String,
}

pub fn table_rows(records: &[&CreditRecord]) -> Vec<TableRow> {
    records
        .iter()
        .map(|r| TableRow {
            company: r.company_name.clone(),
            kind: r.kind.clone().unwrap_or_default(),
            date: format_date(r.submission_date).unwrap_or_default(),
            rating: r.rating_score,
            band: r.rating_band,
            opinion: r.opinion_category,
            opinion_text: r.opinion_text.clone().unwrap_or_default(),
        })
        .collect()
}

/// Expandable conclusion entry for a record that has one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConclusionEntry {
    pub heading: String,
    pub kind: String,
    pub date: String,
    pub opinion_text: String,
    pub conclusion: String,
    pub summary: String,
}

pub fn conclusions(records: &[&CreditRecord]) -> Vec<ConclusionEntry> {
    records
        .iter()
        .filter_map(|r| {
            let conclusion = r.conclusion_text.clone()?;
            Some(ConclusionEntry {
                heading: format!(
                    "{} | Rating: {} | {}",
                    r.company_name,
                    format_rating(r.rating_score),
                    r.opinion_category
                ),
                kind: r.kind.clone().unwrap_or_else(|| "N/A".to_string()),
                date: format_date(r.submission_date).unwrap_or_else(|| "N/A".to_string()),
                opinion_text: r.opinion_text.clone().unwrap_or_else(|| "N/A".to_string()),
                summary: r.conclusion_summary.clone().unwrap_or_default(),
                conclusion,
            })
        })
        .collect()
}
