use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// Canonical record field a source header can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    CompanyBaseName,
    ReportField,
    Kind,
    Date,
    RatingScore,
    RatingScaleLabel,
    OpinionText,
    ConclusionText,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::CompanyBaseName => "company_base_name",
            Field::ReportField => "report_field",
            Field::Kind => "kind",
            Field::Date => "date",
            Field::RatingScore => "rating_score",
            Field::RatingScaleLabel => "rating_scale_label",
            Field::OpinionText => "opinion_text",
            Field::ConclusionText => "conclusion_text",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_SHEET: &str = "Relatórios de Crédito";

/// Header labels used by the credit report spreadsheets.
const DEFAULT_COLUMNS: &[(&str, Field)] = &[
    ("##", Field::Id),
    ("Nome da Empresa na Base", Field::CompanyBaseName),
    ("Relatórios Enviados", Field::ReportField),
    ("Empresa / Emissão", Field::Kind),
    ("Data de Envio", Field::Date),
    ("Rating - X/100", Field::RatingScore),
    ("Escala de Rating", Field::RatingScaleLabel),
    (
        "Opinião - Independente de pontuação de Rating",
        Field::OpinionText,
    ),
    ("Conclusão", Field::ConclusionText),
];

const DEFAULT_DATA_PATHS: &[&str] = &[
    "data/base_credito.xlsx",
    "base_credito.xlsx",
    "data/base_credito.csv",
];

/// Loader configuration. Every field falls back to the built-in default, so a
/// JSON file only needs the keys it overrides.
///
/// ```json
/// {
///   "sheet_name": "Relatórios de Crédito",
///   "columns": { "Rating - X/100": "rating_score" },
///   "data_paths": ["data/base_credito.xlsx"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Worksheet read from workbook files.
    pub sheet_name: String,
    /// Source header label → canonical field. Matched by exact text.
    pub columns: BTreeMap<String, Field>,
    /// Files tried in order when no path is given.
    pub data_paths: Vec<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            columns: DEFAULT_COLUMNS
                .iter()
                .map(|(label, field)| (label.to_string(), *field))
                .collect(),
            data_paths: DEFAULT_DATA_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// The first configured data path that exists on disk.
    pub fn first_existing_path(&self) -> Option<&Path> {
        self.data_paths
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.is_file())
    }
}
