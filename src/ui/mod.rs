//! Plain-text rendering of a session's current view.

pub mod panels;
pub mod plot;

use std::io::{self, Write};

use crate::color::ColorMap;
use crate::report::{
    Summary, band_distribution, conclusions, opinion_distribution, rating_series, table_rows,
};
use crate::state::Session;

/// Print the whole report for the records visible in `session`.
pub fn print_report(out: &mut impl Write, session: &Session, full_conclusions: bool) -> io::Result<()> {
    if let Some(msg) = &session.status_message {
        writeln!(out, "{msg}")?;
    }
    if session.table.is_none() {
        return writeln!(out, "No credit report loaded.");
    }
    if let Some(path) = session.source_path() {
        writeln!(out, "Source: {}", path.display())?;
    }

    let records = session.visible_records();

    panels::filter_panel(out, &session.filters, &session.options)?;
    writeln!(out)?;
    let kind_colors = ColorMap::new(&session.options.kinds);
    panels::metrics(out, &Summary::of(&records), &kind_colors)?;
    writeln!(out)?;
    plot::opinion_chart(out, &opinion_distribution(&records))?;
    writeln!(out)?;
    plot::band_chart(out, &band_distribution(&records))?;
    writeln!(out)?;
    plot::rating_chart(out, &rating_series(&records))?;
    writeln!(out)?;
    panels::detail_table(out, &table_rows(&records))?;
    writeln!(out)?;
    panels::conclusion_list(out, &conclusions(&records), full_conclusions)
}
