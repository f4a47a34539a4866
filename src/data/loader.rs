use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use calamine::{Data, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{CellValue, CreditTable, RawSheet};
use super::normalize::{normalize, parse_date};
use crate::config::DashboardConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a source file could not be turned into a [`CreditTable`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read workbook {path}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("sheet '{sheet}' not found (available: {})", .available.join(", "))]
    MissingSheet {
        sheet: String,
        available: Vec<String>,
    },

    #[error("cannot parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("no column could be resolved to a company name")]
    NoCompanyColumn,

    #[error("row {row}, column '{column}': {reason}")]
    InvalidCell {
        row: usize,
        column: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and normalize a credit report table.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods` – the configured sheet
/// * `.csv`     – header row followed by one evaluation per line
/// * `.json`    – `[{ "Rating - X/100": 85, ... }, ...]`
/// * `.parquet` – one column per header, as written by `df.to_parquet()`
pub fn load_file(path: &Path, config: &DashboardConfig) -> Result<CreditTable, LoadError> {
    let sheet = read_sheet(path, &config.sheet_name)?;
    log::debug!(
        "read {} rows x {} columns from {}",
        sheet.rows.len(),
        sheet.headers.len(),
        path.display()
    );
    normalize(sheet, &config.columns)
}

/// Read the raw cells of `path` without interpreting any column.
pub fn read_sheet(path: &Path, sheet_name: &str) -> Result<RawSheet, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => return read_workbook(path, sheet_name),
        "csv" => read_csv(path),
        "json" => read_json(path),
        "parquet" | "pq" => read_parquet(path),
        _ => return Err(LoadError::UnsupportedExtension(ext)),
    };
    parsed.map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

/// The first non-empty row of the sheet holds the headers.
fn read_workbook(path: &Path, sheet_name: &str) -> Result<RawSheet, LoadError> {
    let workbook_err = |source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;

    let available = workbook.sheet_names();
    if !available.iter().any(|name| name == sheet_name) {
        return Err(LoadError::MissingSheet {
            sheet: sheet_name.to_string(),
            available,
        });
    }

    let range = workbook.worksheet_range(sheet_name).map_err(workbook_err)?;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| excel_to_cell(c).to_string()).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(excel_to_cell).collect())
        .collect();

    Ok(RawSheet { headers, rows })
}

fn excel_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => CellValue::Date(dt.date()),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_date(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one evaluation per record.
/// Short records are padded with empty cells.
fn read_csv(path: &Path) -> Result<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: Vec<CellValue> = (0..headers.len())
            .map(|i| csv_cell(record.get(i).unwrap_or("")))
            .collect();
        rows.push(row);
    }

    Ok(RawSheet { headers, rows })
}

/// CSV carries no types: cells stay text and only the mapped ID, rating and
/// date columns are coerced during normalization.
fn csv_cell(s: &str) -> CellValue {
    if s.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Relatórios Enviados": "ACME", "Rating - X/100": 85, "Data de Envio": "2024-03-01" },
///   ...
/// ]
/// ```
///
/// Headers follow the key order of the objects, first seen first.
fn read_json(path: &Path) -> Result<RawSheet> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<CellValue>> = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_to_cell).unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    Ok(RawSheet { headers, rows })
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file holding the report table.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Strings, integers, floats, booleans,
/// `Date32` and timestamps are understood; other column types read as text.
fn read_parquet(path: &Path) -> Result<RawSheet> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        if batch.num_columns() != headers.len() {
            bail!(
                "record batch has {} columns, schema has {}",
                batch.num_columns(),
                headers.len()
            );
        }
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(RawSheet { headers, rows })
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Empty;
    }
    let cell = match col.data_type() {
        DataType::Utf8 => col
            .as_string_opt::<i32>()
            .map(|a| CellValue::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => col
            .as_string_opt::<i64>()
            .map(|a| CellValue::Text(a.value(row).to_string())),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| CellValue::Int(i64::from(a.value(row)))),
        DataType::Int64 => col
            .as_primitive_opt::<Int64Type>()
            .map(|a| CellValue::Int(a.value(row))),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| CellValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => col
            .as_primitive_opt::<Float64Type>()
            .map(|a| CellValue::Float(a.value(row))),
        DataType::Boolean => col
            .as_boolean_opt()
            .map(|a| CellValue::Bool(a.value(row))),
        DataType::Date32 => col
            .as_primitive_opt::<Date32Type>()
            .and_then(|a| a.value_as_date(row))
            .map(CellValue::Date),
        DataType::Timestamp(unit, _) => {
            let datetime = match unit {
                TimeUnit::Second => col
                    .as_primitive_opt::<TimestampSecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Millisecond => col
                    .as_primitive_opt::<TimestampMillisecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Microsecond => col
                    .as_primitive_opt::<TimestampMicrosecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Nanosecond => col
                    .as_primitive_opt::<TimestampNanosecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
            };
            datetime.map(|dt| CellValue::Date(dt.date()))
        }
        other => Some(CellValue::Text(format!("{other:?}"))),
    };
    cell.unwrap_or(CellValue::Empty)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field as ArrowField, Schema};
    use arrow::record_batch::RecordBatch;
    use chrono::NaiveDate;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::model::{OpinionCategory, RatingBand};

    const CSV: &str = "\
##,Nome da Empresa na Base,Relatórios Enviados,Empresa / Emissão,Data de Envio,Rating - X/100,Opinião - Independente de pontuação de Rating,Conclusão
1,Alpha SA,Alpha Report,Empresa,2024-01-15,85,Positivo forte,Boa geração de caixa
2,Beta SA,,Emissão,20/02/2024,70,Requer atenção,
3,Gamma SA,,Empresa,,,,
";

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_csv_with_default_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "base.csv", CSV);

        let table = load_file(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(table.len(), 3);

        let alpha = &table.records[0];
        assert_eq!(alpha.id, Some(1));
        assert_eq!(alpha.company_name, "Alpha Report");
        assert_eq!(alpha.kind.as_deref(), Some("Empresa"));
        assert_eq!(alpha.submission_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(alpha.rating_band, RatingBand::High);
        assert_eq!(alpha.conclusion_summary.as_deref(), Some("Boa geração de caixa"));

        let beta = &table.records[1];
        assert_eq!(beta.company_name, "Beta SA");
        assert_eq!(beta.submission_date, NaiveDate::from_ymd_opt(2024, 2, 20));
        assert_eq!(beta.opinion_category, OpinionCategory::Attention);
        assert_eq!(beta.month_period.as_deref(), Some("2024-02"));

        let gamma = &table.records[2];
        assert_eq!(gamma.rating_band, RatingBand::NoRating);
        assert_eq!(gamma.opinion_category, OpinionCategory::NotEvaluated);
        assert_eq!(gamma.submission_date, None);
    }

    #[test]
    fn loads_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "base.json",
            r#"[
                {"Relatórios Enviados": "Alpha", "Rating - X/100": 64.5, "Data de Envio": "2024-03-01T00:00:00.000"},
                {"Relatórios Enviados": "Beta", "Rating - X/100": null, "Opinião - Independente de pontuação de Rating": "Neutro"}
            ]"#,
        );

        let table = load_file(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].rating_band, RatingBand::Low);
        assert_eq!(
            table.records[0].submission_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(table.records[1].opinion_category, OpinionCategory::Neutral);
    }

    #[test]
    fn loads_parquet_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.parquet");

        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("##", DataType::Int64, false),
            ArrowField::new("Relatórios Enviados", DataType::Utf8, true),
            ArrowField::new("Rating - X/100", DataType::Float64, true),
            ArrowField::new("Data de Envio", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("Alpha"), Some("Beta")])),
                Arc::new(Float64Array::from(vec![Some(90.0), None])),
                // 19_723 days after the epoch is 2024-01-01.
                Arc::new(arrow::array::Date32Array::from(vec![Some(19_723), None])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].id, Some(1));
        assert_eq!(table.records[0].rating_band, RatingBand::High);
        assert_eq!(
            table.records[0].submission_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(table.records[1].rating_score, None);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("base.txt"), &DashboardConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedExtension(ext) if ext == "txt"));
    }

    #[test]
    fn corrupt_workbook_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "base.xlsx", "not a zip archive");
        let err = load_file(&path, &DashboardConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Workbook { .. }));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("none.csv"), &DashboardConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn csv_text_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "base.csv",
            "##,Relatórios Enviados,Empresa / Emissão,Rating - X/100,Data de Envio\n\
             1,Infinity,Empresa,85,2024-05-02\n\
             2,007,NaN,\"70,5\",\n\
             3,true,,NaN,\n",
        );

        let table = load_file(&path, &DashboardConfig::default()).unwrap();
        let names: Vec<&str> = table.records.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, ["Infinity", "007", "true"]);
        assert_eq!(table.records[1].kind.as_deref(), Some("NaN"));

        assert_eq!(table.records[0].id, Some(1));
        assert_eq!(table.records[0].rating_score, Some(85.0));
        assert_eq!(
            table.records[0].submission_date,
            NaiveDate::from_ymd_opt(2024, 5, 2)
        );
        assert_eq!(table.records[1].rating_score, Some(70.5));
        assert_eq!(table.records[2].rating_score, None);
    }

    fn write_workbook(path: &Path) -> Result<(), rust_xlsxwriter::XlsxError> {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let date_format = Format::new().set_num_format("dd/mm/yyyy");
        let mut workbook = Workbook::new();

        let reports = workbook.add_worksheet();
        reports.set_name("Relatórios de Crédito")?;
        for (col, header) in ["##", "Relatórios Enviados", "Data de Envio", "Rating - X/100"]
            .into_iter()
            .enumerate()
        {
            reports.write_string(0, col as u16, header)?;
        }
        reports.write_number(1, 0, 1)?;
        reports.write_string(1, 1, "Alpha")?;
        reports.write_datetime_with_format(1, 2, &ExcelDateTime::from_ymd(2024, 3, 15)?, &date_format)?;
        reports.write_number(1, 3, 85)?;
        reports.write_number(2, 0, 2)?;
        reports.write_string(2, 1, "Beta")?;
        reports.write_number(2, 3, 62.5)?;

        let summary = workbook.add_worksheet();
        summary.set_name("Resumo")?;
        summary.write_string(0, 0, "Total")?;

        workbook.save(path)
    }

    #[test]
    fn loads_configured_workbook_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.xlsx");
        write_workbook(&path).unwrap();

        let table = load_file(&path, &DashboardConfig::default()).unwrap();
        assert_eq!(table.len(), 2);

        let alpha = &table.records[0];
        assert_eq!(alpha.id, Some(1));
        assert_eq!(alpha.company_name, "Alpha");
        assert_eq!(alpha.submission_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(alpha.rating_score, Some(85.0));
        assert_eq!(alpha.rating_band, RatingBand::High);

        let beta = &table.records[1];
        assert_eq!(beta.submission_date, None);
        assert_eq!(beta.rating_band, RatingBand::Low);
    }

    #[test]
    fn missing_sheet_lists_available_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.xlsx");
        write_workbook(&path).unwrap();

        let config = DashboardConfig {
            sheet_name: "Planilha1".to_string(),
            ..DashboardConfig::default()
        };
        match load_file(&path, &config) {
            Err(LoadError::MissingSheet { sheet, available }) => {
                assert_eq!(sheet, "Planilha1");
                assert_eq!(available, ["Relatórios de Crédito", "Resumo"]);
            }
            other => panic!("expected MissingSheet, got {other:?}"),
        }
    }
}
