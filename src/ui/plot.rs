use std::fmt::Display;
use std::io::{self, Write};

use crate::color::{band_color, opinion_color, to_hex};
use crate::data::model::{OpinionCategory, RatingBand};
use crate::report::RatingBar;

const BAR_WIDTH: usize = 40;

// ---------------------------------------------------------------------------
// Text bar charts
// ---------------------------------------------------------------------------

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.min(BAR_WIDTH))
}

fn counts_chart<T: Display>(
    out: &mut impl Write,
    title: &str,
    counts: &[(T, usize)],
    color: impl Fn(&T) -> String,
) -> io::Result<()> {
    writeln!(out, "{title}")?;
    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0) as f64;
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    for (label, n) in counts {
        let pct = *n as f64 / total as f64 * 100.0;
        writeln!(
            out,
            "  {:<14} {} {:<40} {n} ({pct:.1}%)",
            label.to_string(),
            color(label),
            bar(*n as f64, max)
        )?;
    }
    Ok(())
}

/// Opinion category counts.
pub fn opinion_chart(out: &mut impl Write, counts: &[(OpinionCategory, usize)]) -> io::Result<()> {
    counts_chart(out, "Opinion distribution", counts, |c| to_hex(opinion_color(*c)))
}

/// Rating band counts.
pub fn band_chart(out: &mut impl Write, counts: &[(RatingBand, usize)]) -> io::Result<()> {
    counts_chart(out, "Rating band distribution", counts, |b| to_hex(band_color(*b)))
}

/// Per-company rating on a 0-100 scale, coloured by opinion.
pub fn rating_chart(out: &mut impl Write, bars: &[RatingBar]) -> io::Result<()> {
    writeln!(out, "Rating by company")?;
    if bars.is_empty() {
        return writeln!(out, "  No rated evaluations for the selected filters.");
    }
    for b in bars {
        writeln!(
            out,
            "  {:<32} {:<40} {:>5.1} {}",
            b.company,
            bar(b.rating, 100.0),
            b.rating,
            b.opinion
        )?;
    }
    Ok(())
}
