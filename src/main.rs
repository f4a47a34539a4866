use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;

use credit_panda::config::DashboardConfig;
use credit_panda::data::filter::{DateRange, FilterState, parse_selection};
use credit_panda::data::model::{OpinionCategory, RatingBand};
use credit_panda::state::Session;
use credit_panda::ui;

// ---------------------------------------------------------------------------
// CLI args
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "credit-panda", about = "Summarise a spreadsheet of credit evaluations")]
struct Args {
    /// Spreadsheet to load (.xlsx, .xls, .ods, .csv, .json, .parquet).
    /// Defaults to the first existing configured data path.
    path: Option<PathBuf>,

    /// JSON config file (sheet name, column mapping, data paths).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report kind, e.g. "Empresa" or "Emissão" ("All" for every kind).
    #[arg(long)]
    kind: Option<String>,

    /// Opinion category: Positive, Negative, Neutral, Attention, Other, "Not Evaluated".
    #[arg(long)]
    opinion: Option<String>,

    /// Rating band: High, Medium, Low, "No Rating".
    #[arg(long)]
    band: Option<String>,

    /// First submission date to include (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Last submission date to include (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    to: Option<NaiveDate>,

    /// Print full conclusions instead of the 300-character summaries.
    #[arg(long)]
    details: bool,
}

impl Args {
    /// Translate the flags into a filter selection. A single date bound is
    /// completed with the table's own bound.
    fn filters(&self, date_bounds: Option<(NaiveDate, NaiveDate)>) -> Result<FilterState> {
        let kind = match &self.kind {
            Some(k) => parse_selection::<String>(k)?,
            None => None,
        };
        let opinion = match &self.opinion {
            Some(o) => parse_selection::<OpinionCategory>(o).context("--opinion")?,
            None => None,
        };
        let band = match &self.band {
            Some(b) => parse_selection::<RatingBand>(b).context("--band")?,
            None => None,
        };
        let period = match (self.from, self.to, date_bounds) {
            (None, None, _) => None,
            (Some(start), Some(end), _) if start > end => {
                bail!("--from {start} is after --to {end}")
            }
            (Some(start), Some(end), _) => Some(DateRange { start, end }),
            (Some(start), None, Some((_, hi))) => Some(DateRange { start, end: hi }),
            (None, Some(end), Some((lo, _))) => Some(DateRange { start: lo, end }),
            // Only one bound and no dated record: nothing can match.
            (Some(d), None, None) | (None, Some(d), None) => Some(DateRange { start: d, end: d }),
        };
        Ok(FilterState {
            kind,
            opinion,
            band,
            period,
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::from_path(path)?,
        None => DashboardConfig::default(),
    };

    let mut session = Session::new(config);
    let loaded = match &args.path {
        Some(path) => session.load_path(path),
        None => session.load_default(),
    };

    if loaded {
        let filters = args.filters(session.options.date_bounds)?;
        if !filters.is_inactive() {
            session.set_filters(filters);
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    ui::print_report(&mut out, &session, args.details).context("writing report")?;
    out.flush().context("flushing report")?;
    Ok(())
}
