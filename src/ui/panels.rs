use std::io::{self, Write};

use crate::color::{ColorMap, to_hex};
use crate::data::filter::{FilterOptions, FilterState};
use crate::report::{ConclusionEntry, Summary, TableRow};

// ---------------------------------------------------------------------------
// Filter header
// ---------------------------------------------------------------------------

/// Active selections next to the values that could be chosen.
pub fn filter_panel(out: &mut impl Write, filters: &FilterState, options: &FilterOptions) -> io::Result<()> {
    writeln!(out, "Filters")?;
    let kinds = options.kinds.join(", ");
    let opinions: Vec<&str> = options.opinions.iter().map(|o| o.label()).collect();
    let bands: Vec<&str> = options.bands.iter().map(|b| b.label()).collect();

    writeln!(
        out,
        "  Kind:    {:<14} [{kinds}]",
        filters.kind.as_deref().unwrap_or("All")
    )?;
    writeln!(
        out,
        "  Opinion: {:<14} [{}]",
        filters.opinion.map_or("All", |o| o.label()),
        opinions.join(", ")
    )?;
    writeln!(
        out,
        "  Band:    {:<14} [{}]",
        filters.band.map_or("All", |b| b.label()),
        bands.join(", ")
    )?;
    let period = match &filters.period {
        Some(p) => format!("{} .. {}", p.start, p.end),
        None => "All".to_string(),
    };
    let bounds = match options.date_bounds {
        Some((lo, hi)) => format!("{lo} .. {hi}"),
        None => "no dated records".to_string(),
    };
    writeln!(out, "  Period:  {period:<14} [{bounds}]")
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Headline numbers. Every kind in the legend is listed with its colour,
/// including kinds the current filters leave at zero.
pub fn metrics(out: &mut impl Write, summary: &Summary, kind_colors: &ColorMap) -> io::Result<()> {
    let mean = summary
        .mean_rating
        .map_or_else(|| "N/A".to_string(), |m| format!("{m:.1}"));
    let negative = summary
        .negative_share
        .map_or_else(|| "N/A".to_string(), |p| format!("{p:.1}%"));

    writeln!(out, "Total evaluations: {}", summary.total)?;
    for (kind, color) in kind_colors.legend_entries() {
        writeln!(out, "  {kind} ({}): {}", to_hex(color), summary.kind_count(kind))?;
    }
    writeln!(out, "Mean rating:       {mean}")?;
    writeln!(out, "Negative share:    {negative}")
}

// ---------------------------------------------------------------------------
// Detail table
// ---------------------------------------------------------------------------

pub fn detail_table(out: &mut impl Write, rows: &[TableRow]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "No evaluations match the selected filters.");
    }
    writeln!(
        out,
        "{:<32} {:<10} {:<10} {:>6} {:<9} {:<13} Opinion text",
        "Company", "Kind", "Date", "Rating", "Band", "Opinion"
    )?;
    for row in rows {
        let rating = row.rating.map_or_else(String::new, |r| format!("{r:.0}"));
        writeln!(
            out,
            "{:<32} {:<10} {:<10} {:>6} {:<9} {:<13} {}",
            truncate(&row.company, 32),
            truncate(&row.kind, 10),
            row.date,
            rating,
            row.band.label(),
            row.opinion.label(),
            row.opinion_text
        )?;
    }
    Ok(())
}

pub fn conclusion_list(out: &mut impl Write, entries: &[ConclusionEntry], full: bool) -> io::Result<()> {
    for entry in entries {
        writeln!(out, "{}", entry.heading)?;
        writeln!(
            out,
            "  Kind: {} | Date: {} | Opinion: {}",
            entry.kind, entry.date, entry.opinion_text
        )?;
        let text = if full { &entry.conclusion } else { &entry.summary };
        writeln!(out, "  {text}")?;
        writeln!(out)?;
    }
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
