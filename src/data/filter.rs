use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;

use super::model::{CreditRecord, CreditTable, OpinionCategory, RatingBand};

// ---------------------------------------------------------------------------
// Filter predicate: one optional constraint per filterable field
// ---------------------------------------------------------------------------

/// Inclusive submission date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Current filter selections. `None` means "All" (no constraint).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub kind: Option<String>,
    pub opinion: Option<OpinionCategory>,
    pub band: Option<RatingBand>,
    /// Once set, undated records no longer match.
    pub period: Option<DateRange>,
}

impl FilterState {
    /// Whether no filter is active.
    pub fn is_inactive(&self) -> bool {
        *self == FilterState::default()
    }

    /// A record passes when it satisfies every active filter.
    pub fn matches(&self, record: &CreditRecord) -> bool {
        if let Some(kind) = &self.kind {
            if record.kind.as_ref() != Some(kind) {
                return false;
            }
        }
        if let Some(opinion) = self.opinion {
            if record.opinion_category != opinion {
                return false;
            }
        }
        if let Some(band) = self.band {
            if record.rating_band != band {
                return false;
            }
        }
        if let Some(period) = &self.period {
            match record.submission_date {
                Some(date) if period.contains(date) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Return indices of records that pass all active filters, in table order.
pub fn filtered_indices(table: &CreditTable, filters: &FilterState) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, record)| filters.matches(record))
        .map(|(i, _)| i)
        .collect()
}

/// Parse a user selection, treating the "All"/"Every" sentinels as no filter.
pub fn parse_selection<T: FromStr>(value: &str) -> Result<Option<T>, T::Err> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("all")
        || trimmed.eq_ignore_ascii_case("every")
    {
        return Ok(None);
    }
    trimmed.parse().map(Some)
}

// ---------------------------------------------------------------------------
// Selectable options
// ---------------------------------------------------------------------------

/// Values a user can pick from, taken from the unfiltered table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub kinds: Vec<String>,
    pub opinions: Vec<OpinionCategory>,
    pub bands: Vec<RatingBand>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl FilterOptions {
    /// Distinct values present in `table`. Recompute only when the base
    /// table changes, never from a filtered subset.
    pub fn from_table(table: &CreditTable) -> Self {
        let kinds: BTreeSet<&String> = table.records.iter().filter_map(|r| r.kind.as_ref()).collect();
        let opinions: BTreeSet<OpinionCategory> =
            table.records.iter().map(|r| r.opinion_category).collect();
        let bands: BTreeSet<RatingBand> = table.records.iter().map(|r| r.rating_band).collect();

        FilterOptions {
            kinds: kinds.into_iter().cloned().collect(),
            opinions: opinions.into_iter().collect(),
            bands: bands.into_iter().collect(),
            date_bounds: table.date_bounds(),
        }
    }
}
