use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use super::loader::LoadError;
use super::model::{
    CellValue, CreditRecord, CreditTable, RatingScale, RawSheet, RecordFields, SchemaMismatch,
};
use crate::config::Field;

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Where the company name of each row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    /// At least one of the canonical name columns resolved.
    Canonical {
        report: Option<usize>,
        base: Option<usize>,
    },
    /// Neither did: second column first, then the first one.
    Positional {
        primary: usize,
        fallback: Option<usize>,
    },
}

#[derive(Debug)]
struct ResolvedColumns {
    fields: BTreeMap<Field, usize>,
    extra: Vec<(usize, String)>,
    name: NameSource,
}

impl ResolvedColumns {
    fn resolve(headers: &[String], mapping: &BTreeMap<String, Field>) -> Result<Self, LoadError> {
        let mut fields = BTreeMap::new();
        let mut extra = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            match mapping.get(header) {
                Some(field) if !fields.contains_key(field) => {
                    fields.insert(*field, idx);
                }
                _ => extra.push((idx, header.clone())),
            }
        }

        let report = fields.get(&Field::ReportField).copied();
        let base = fields.get(&Field::CompanyBaseName).copied();
        let name = match (report, base, headers.len()) {
            (None, None, 0) => return Err(LoadError::NoCompanyColumn),
            (None, None, 1) => NameSource::Positional {
                primary: 0,
                fallback: None,
            },
            (None, None, _) => NameSource::Positional {
                primary: 1,
                fallback: Some(0),
            },
            (report, base, _) => NameSource::Canonical { report, base },
        };

        Ok(Self {
            fields,
            extra,
            name,
        })
    }

    fn get(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    fn missing_optional(&self) -> Vec<SchemaMismatch> {
        const OPTIONAL: [Field; 7] = [
            Field::Id,
            Field::Kind,
            Field::Date,
            Field::RatingScore,
            Field::RatingScaleLabel,
            Field::OpinionText,
            Field::ConclusionText,
        ];
        OPTIONAL
            .into_iter()
            .filter(|f| !self.fields.contains_key(f))
            .map(|field| SchemaMismatch { field })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Turn a raw sheet into a [`CreditTable`]: resolve columns, backfill the
/// company name, then derive the computed columns of every row.
pub fn normalize(
    sheet: RawSheet,
    mapping: &BTreeMap<String, Field>,
) -> Result<CreditTable, LoadError> {
    let columns = ResolvedColumns::resolve(&sheet.headers, mapping)?;
    let schema_warnings = columns.missing_optional();
    for warning in &schema_warnings {
        log::warn!("{warning}");
    }

    let mut records = Vec::with_capacity(sheet.rows.len());
    for (i, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(CellValue::is_blank) {
            continue;
        }
        // Header is sheet row 1.
        let row_no = i + 2;
        let fields = read_fields(row, row_no, &sheet.headers, &columns)?;
        records.push(CreditRecord::derive(fields));
    }

    Ok(CreditTable {
        records,
        extra_columns: columns.extra.into_iter().map(|(_, h)| h).collect(),
        schema_warnings,
    })
}

fn read_fields(
    row: &[CellValue],
    row_no: usize,
    headers: &[String],
    columns: &ResolvedColumns,
) -> Result<RecordFields, LoadError> {
    let cell = |field: Field| columns.get(field).and_then(|idx| row.get(idx));
    let invalid = |field: Field, reason: String| LoadError::InvalidCell {
        row: row_no,
        column: columns
            .get(field)
            .and_then(|idx| headers.get(idx))
            .cloned()
            .unwrap_or_default(),
        reason,
    };

    let id = cell(Field::Id).and_then(|c| {
        let id = cell_integer(c);
        if id.is_none() && !c.is_blank() {
            log::warn!("row {row_no}: ignoring non-integer id '{c}'");
        }
        id
    });

    let rating_score = match cell(Field::RatingScore) {
        Some(c) => cell_rating(c).map_err(|reason| invalid(Field::RatingScore, reason))?,
        None => None,
    };
    let submission_date = match cell(Field::Date) {
        Some(c) => cell_date(c).map_err(|reason| invalid(Field::Date, reason))?,
        None => None,
    };
    let rating_scale = columns.get(Field::RatingScaleLabel).map(|idx| {
        match row.get(idx).and_then(cell_text) {
            Some(label) => RatingScale::Labelled(label),
            None => RatingScale::Blank,
        }
    });

    let extra = columns
        .extra
        .iter()
        .map(|(idx, header)| {
            let value = row.get(*idx).cloned().unwrap_or(CellValue::Empty);
            (header.clone(), value)
        })
        .collect();

    Ok(RecordFields {
        id,
        company_name: company_name(row, columns.name),
        kind: cell(Field::Kind).and_then(cell_text),
        submission_date,
        rating_score,
        rating_scale,
        opinion_text: cell(Field::OpinionText).and_then(cell_text),
        conclusion_text: cell(Field::ConclusionText).and_then(cell_text),
        extra,
    })
}

fn company_name(row: &[CellValue], source: NameSource) -> String {
    let text_at = |idx: Option<usize>| idx.and_then(|i| row.get(i)).and_then(cell_text);
    let name = match source {
        NameSource::Canonical { report, base } => text_at(report).or_else(|| text_at(base)),
        NameSource::Positional { primary, fallback } => {
            text_at(Some(primary)).or_else(|| text_at(fallback))
        }
    };
    name.unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Cell conversions
// ---------------------------------------------------------------------------

/// Non-blank cell rendered as text.
fn cell_text(cell: &CellValue) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    match cell {
        CellValue::Text(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn cell_integer(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rating in `[0, 100]`; blank cells are a missing rating.
fn cell_rating(cell: &CellValue) -> Result<Option<f64>, String> {
    let value = match cell {
        _ if cell.is_blank() => return Ok(None),
        CellValue::Int(i) => *i as f64,
        CellValue::Float(f) => *f,
        CellValue::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number"))?,
        other => return Err(format!("'{other}' is not a number")),
    };
    if value.is_nan() {
        return Ok(None);
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("rating {value} is outside 0-100"));
    }
    Ok(Some(value))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse the date formats found in exported sheets.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn cell_date(cell: &CellValue) -> Result<Option<NaiveDate>, String> {
    match cell {
        _ if cell.is_blank() => Ok(None),
        CellValue::Date(d) => Ok(Some(*d)),
        CellValue::Text(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| format!("'{s}' is not a date")),
        other => Err(format!("'{other}' is not a date")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::data::model::{OpinionCategory, RatingBand};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sheet(headers: &[&str], rows: Vec<Vec<CellValue>>) -> RawSheet {
        RawSheet {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    fn mapping() -> BTreeMap<String, Field> {
        DashboardConfig::default().columns
    }

    #[test]
    fn example_scenario_classifies_each_row() {
        let raw = sheet(
            &[
                "Relatórios Enviados",
                "Rating - X/100",
                "Opinião - Independente de pontuação de Rating",
            ],
            vec![
                vec![text("Alpha"), CellValue::Int(85), text("Positivo forte")],
                vec![text("Beta"), CellValue::Float(70.0), text("Requer atenção")],
                vec![text("Gamma"), CellValue::Empty, CellValue::Empty],
            ],
        );
        let table = normalize(raw, &mapping()).unwrap();

        let bands: Vec<_> = table.records.iter().map(|r| r.rating_band).collect();
        assert_eq!(
            bands,
            [RatingBand::High, RatingBand::Medium, RatingBand::NoRating]
        );
        let opinions: Vec<_> = table.records.iter().map(|r| r.opinion_category).collect();
        assert_eq!(
            opinions,
            [
                OpinionCategory::Positive,
                OpinionCategory::Attention,
                OpinionCategory::NotEvaluated
            ]
        );
    }

    #[test]
    fn report_field_wins_over_base_name() {
        let raw = sheet(
            &["Nome da Empresa na Base", "Relatórios Enviados"],
            vec![
                vec![text("Base A"), text("Report A")],
                vec![text("Base B"), CellValue::Empty],
                vec![text("Base C"), text("   ")],
            ],
        );
        let table = normalize(raw, &mapping()).unwrap();
        let names: Vec<_> = table.records.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, ["Report A", "Base B", "Base C"]);
    }

    #[test]
    fn base_name_alone_is_used() {
        let raw = sheet(&["x", "Nome da Empresa na Base"], vec![vec![text("x"), text("Base")]]);
        let table = normalize(raw, &mapping()).unwrap();
        assert_eq!(table.records[0].company_name, "Base");
    }

    #[test]
    fn positional_fallback_prefers_second_column() {
        let raw = sheet(
            &["Empresa", "Relatório"],
            vec![
                vec![text("First"), text("Second")],
                vec![text("Only first"), CellValue::Empty],
            ],
        );
        let table = normalize(raw, &mapping()).unwrap();
        let names: Vec<_> = table.records.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, ["Second", "Only first"]);
    }

    #[test]
    fn sheet_without_columns_is_rejected() {
        let err = normalize(RawSheet::default(), &mapping()).unwrap_err();
        assert!(matches!(err, LoadError::NoCompanyColumn));
    }

    #[test]
    fn missing_scale_column_marks_unavailable() {
        let raw = sheet(&["Relatórios Enviados"], vec![vec![text("A")]]);
        let table = normalize(raw, &mapping()).unwrap();
        assert_eq!(table.records[0].rating_scale, RatingScale::Unavailable);
        assert!(table
            .schema_warnings
            .contains(&SchemaMismatch {
                field: Field::RatingScaleLabel
            }));

        let raw = sheet(
            &["Relatórios Enviados", "Escala de Rating"],
            vec![vec![text("A"), text("AA")], vec![text("B"), CellValue::Empty]],
        );
        let table = normalize(raw, &mapping()).unwrap();
        assert_eq!(
            table.records[0].rating_scale,
            RatingScale::Labelled("AA".into())
        );
        assert_eq!(table.records[1].rating_scale, RatingScale::Blank);
    }

    #[test]
    fn unknown_columns_are_kept() {
        let raw = sheet(
            &["Relatórios Enviados", "Analista"],
            vec![vec![text("A"), text("Maria")]],
        );
        let table = normalize(raw, &mapping()).unwrap();
        assert_eq!(table.extra_columns, ["Analista"]);
        assert_eq!(table.records[0].extra.get("Analista"), Some(&text("Maria")));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let raw = sheet(
            &["Relatórios Enviados", "Rating - X/100"],
            vec![
                vec![text("A"), CellValue::Int(50)],
                vec![CellValue::Empty, text(" ")],
                vec![text("B"), CellValue::Int(90)],
            ],
        );
        let table = normalize(raw, &mapping()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn bad_rating_reports_sheet_row() {
        let raw = sheet(
            &["Relatórios Enviados", "Rating - X/100"],
            vec![
                vec![text("A"), text("72,5")],
                vec![text("B"), text("alto")],
            ],
        );
        match normalize(raw, &mapping()) {
            Err(LoadError::InvalidCell { row, column, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "Rating - X/100");
            }
            other => panic!("expected InvalidCell, got {other:?}"),
        }
    }

    #[test]
    fn rating_outside_scale_is_rejected() {
        assert!(cell_rating(&CellValue::Float(100.5)).is_err());
        assert!(cell_rating(&CellValue::Int(-1)).is_err());
        assert_eq!(cell_rating(&text("72,5")), Ok(Some(72.5)));
        assert_eq!(cell_rating(&CellValue::Float(f64::NAN)), Ok(None));
    }

    #[test]
    fn dates_parse_from_text_and_cells() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29);
        assert_eq!(parse_date("2024-02-29"), d);
        assert_eq!(parse_date("29/02/2024"), d);
        assert_eq!(parse_date("2024-02-29 13:45:00"), d);
        assert_eq!(parse_date("2024-02-29T13:45:00.000"), d);
        assert_eq!(parse_date("fevereiro"), None);
        assert_eq!(cell_date(&CellValue::Empty), Ok(None));
        assert!(cell_date(&CellValue::Int(45000)).is_err());
    }

    #[test]
    fn ids_accept_integral_values_only() {
        assert_eq!(cell_integer(&CellValue::Float(7.0)), Some(7));
        assert_eq!(cell_integer(&CellValue::Float(7.5)), None);
        assert_eq!(cell_integer(&text(" 12 ")), Some(12));
        assert_eq!(cell_integer(&text("n/a")), None);
    }
}
