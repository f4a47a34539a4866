use std::path::Path;
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::data::cache::TableCache;
use crate::data::filter::{FilterOptions, FilterState, filtered_indices};
use crate::data::loader::load_file;
use crate::data::model::{CreditRecord, CreditTable};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything one user session holds, independent of how it is displayed.
pub struct Session {
    pub config: DashboardConfig,

    /// Loaded table (None until a file loads successfully).
    pub table: Option<Arc<CreditTable>>,

    /// Selectable filter values, derived from the unfiltered table.
    pub options: FilterOptions,

    /// Current filter selections.
    pub filters: FilterState,

    /// Indices passing the current filters; None until filters are applied.
    pub view: Option<Vec<usize>>,

    /// Status / error message for the user.
    pub status_message: Option<String>,

    cache: TableCache,
}

impl Session {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            table: None,
            options: FilterOptions::default(),
            filters: FilterState::default(),
            view: None,
            status_message: None,
            cache: TableCache::default(),
        }
    }

    /// Replace the configuration. Cached tables were built with the old
    /// column mapping, so they are dropped.
    pub fn set_config(&mut self, config: DashboardConfig) {
        self.config = config;
        self.cache.clear();
    }

    /// Load `path`. On failure the message is kept in `status_message` and
    /// any previously loaded table stays in place.
    pub fn load_path(&mut self, path: &Path) -> bool {
        let config = &self.config;
        match self.cache.get_or_load(path, |p| load_file(p, config)) {
            Ok(table) => {
                log::info!(
                    "Loaded {} records from {} ({} extra columns)",
                    table.len(),
                    path.display(),
                    table.extra_columns.len()
                );
                self.set_table(table);
                true
            }
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                self.status_message = Some(format!(
                    "Error loading {}: {}",
                    path.display(),
                    error_chain(&e)
                ));
                false
            }
        }
    }

    /// Load the first configured data path that exists.
    pub fn load_default(&mut self) -> bool {
        match self.config.first_existing_path().map(Path::to_path_buf) {
            Some(path) => self.load_path(&path),
            None => {
                self.status_message =
                    Some("No data file found; pass a spreadsheet path.".to_string());
                false
            }
        }
    }

    /// Ingest a table: options are rebuilt and filters reset to "All".
    pub fn set_table(&mut self, table: Arc<CreditTable>) {
        if self.table.as_ref().is_some_and(|t| Arc::ptr_eq(t, &table)) {
            self.status_message = None;
            return;
        }
        self.options = FilterOptions::from_table(&table);
        self.filters = FilterState::default();
        self.view = None;
        self.table = Some(table);
        self.status_message = None;
    }

    /// Replace the filter selections and recompute the view.
    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.refilter();
    }

    /// Recompute `view` after a filter change.
    pub fn refilter(&mut self) {
        if let Some(table) = &self.table {
            self.view = Some(filtered_indices(table, &self.filters));
        }
    }

    /// Canonical path of the file the cached table came from.
    pub fn source_path(&self) -> Option<&Path> {
        self.cache.cached_source().map(|id| id.path.as_path())
    }

    /// Records of the current view; the whole table before any filtering.
    pub fn visible_records(&self) -> Vec<&CreditRecord> {
        match (&self.table, &self.view) {
            (Some(table), Some(view)) => table.select(view),
            (Some(table), None) => table.records.iter().collect(),
            (None, _) => Vec::new(),
        }
    }
}

/// `outer: inner: innermost` rendering of an error and its sources.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::DateRange;
    use crate::data::model::RatingBand;

    const CSV: &str = "\
Relatórios Enviados,Empresa / Emissão,Data de Envio,Rating - X/100,Opinião - Independente de pontuação de Rating
Alpha,Empresa,2024-01-15,85,Positivo forte
Beta,Emissão,2024-02-20,70,Requer atenção
Gamma,Empresa,,,
";

    fn session_with_csv() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.csv");
        std::fs::write(&path, CSV).unwrap();
        let mut session = Session::new(DashboardConfig::default());
        assert!(session.load_path(&path));
        (dir, session)
    }

    #[test]
    fn load_then_filter() {
        let (_dir, mut session) = session_with_csv();
        assert_eq!(session.view, None);
        assert_eq!(session.visible_records().len(), 3);

        session.set_filters(FilterState {
            band: Some(RatingBand::High),
            ..Default::default()
        });
        let names: Vec<_> = session
            .visible_records()
            .iter()
            .map(|r| r.company_name.clone())
            .collect();
        assert_eq!(names, ["Alpha"]);
    }

    #[test]
    fn empty_view_differs_from_unfiltered() {
        let (_dir, mut session) = session_with_csv();
        session.set_filters(FilterState {
            kind: Some("Fundo".into()),
            ..Default::default()
        });
        assert_eq!(session.view, Some(Vec::new()));
        assert!(session.visible_records().is_empty());
    }

    #[test]
    fn options_do_not_shrink_when_filtering() {
        let (_dir, mut session) = session_with_csv();
        let before = session.options.clone();
        session.set_filters(FilterState {
            period: Some(DateRange {
                start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            }),
            ..Default::default()
        });
        assert_eq!(session.view, Some(vec![0]));
        assert_eq!(session.options, before);
        assert_eq!(before.kinds.len(), 2);
    }

    #[test]
    fn failed_load_keeps_prior_table() {
        let (dir, mut session) = session_with_csv();
        let prior = session.table.clone().unwrap();

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "Relatórios Enviados,Rating - X/100\nAlpha,muito alto\n").unwrap();
        assert!(!session.load_path(&bad));

        let msg = session.status_message.clone().unwrap();
        assert!(msg.contains("muito alto"), "{msg}");
        assert!(Arc::ptr_eq(session.table.as_ref().unwrap(), &prior));

        assert!(!session.load_path(&dir.path().join("missing.xlsx")));
        assert!(Arc::ptr_eq(session.table.as_ref().unwrap(), &prior));
        assert_eq!(
            session.source_path(),
            Some(dir.path().join("base.csv").canonicalize().unwrap().as_path())
        );
    }

    #[test]
    fn new_file_replaces_table_and_resets_filters() {
        let (dir, mut session) = session_with_csv();
        session.set_filters(FilterState {
            band: Some(RatingBand::Low),
            ..Default::default()
        });

        let other = dir.path().join("other.csv");
        std::fs::write(&other, "Relatórios Enviados,Rating - X/100\nDelta,40\n").unwrap();
        assert!(session.load_path(&other));

        assert_eq!(session.table.as_ref().unwrap().len(), 1);
        assert!(session.filters.is_inactive());
        assert_eq!(session.view, None);
        assert_eq!(session.options.bands, vec![RatingBand::Low]);
    }

    #[test]
    fn reloading_same_file_keeps_filters() {
        let (dir, mut session) = session_with_csv();
        let filters = FilterState {
            kind: Some("Empresa".into()),
            ..Default::default()
        };
        session.set_filters(filters.clone());
        assert!(session.load_path(&dir.path().join("base.csv")));
        assert_eq!(session.filters, filters);
    }

    #[test]
    fn no_default_file_sets_message() {
        let mut session = Session::new(DashboardConfig {
            data_paths: vec!["/nonexistent/base_credito.xlsx".into()],
            ..Default::default()
        });
        assert!(!session.load_default());
        assert!(session.status_message.is_some());
        assert!(session.table.is_none());
    }
}
