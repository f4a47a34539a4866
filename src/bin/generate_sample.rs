use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::print_batches;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

const COMPANIES: &[&str] = &[
    "Aurora Energia",
    "Banco Litoral",
    "Cerrado Agro",
    "Delta Logística",
    "Estrela Saneamento",
    "Fênix Varejo",
    "Granito Construções",
    "Horizonte Telecom",
    "Ipê Papel e Celulose",
    "Jatobá Mineração",
];

const OPINIONS: &[&str] = &[
    "Positivo",
    "Positivo com ressalvas",
    "Neutro",
    "Negativo",
    "Risco de default",
    "Requer atenção",
    "Em análise",
];

const CONCLUSION_PARTS: &[&str] = &[
    "Geração de caixa consistente nos últimos exercícios.",
    "Alavancagem acima da média do setor, com vencimentos concentrados no curto prazo.",
    "Estrutura de garantias adequada ao volume emitido.",
    "Dependência relevante de um único cliente na composição da receita.",
    "Governança corporativa em evolução, com conselho parcialmente independente.",
    "Covenants financeiros cumpridos com folga no último trimestre.",
];

const HEADERS: [&str; 8] = [
    "##",
    "Nome da Empresa na Base",
    "Relatórios Enviados",
    "Empresa / Emissão",
    "Data de Envio",
    "Rating - X/100",
    "Opinião - Independente de pontuação de Rating",
    "Conclusão",
];

struct Row {
    id: i64,
    base_name: String,
    report: Option<String>,
    kind: &'static str,
    date: Option<NaiveDate>,
    rating: Option<f64>,
    opinion: Option<&'static str>,
    conclusion: Option<String>,
}

fn generate_rows(rng: &mut SimpleRng, n: usize) -> Vec<Row> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid start date");
    (0..n)
        .map(|i| {
            let company = *rng.pick(COMPANIES);
            let kind = if rng.next_f64() < 0.6 { "Empresa" } else { "Emissão" };
            let report = match kind {
                "Emissão" => Some(format!("{company} - Debênture {}", i % 3 + 1)),
                _ if rng.next_f64() < 0.5 => Some(company.to_string()),
                _ => None,
            };
            let date = (rng.next_f64() < 0.9)
                .then(|| start + Duration::days((rng.next_u64() % 365) as i64));
            let rating = (rng.next_f64() < 0.85).then(|| (40.0 + rng.next_f64() * 55.0).round());
            let opinion = (rng.next_f64() < 0.9).then(|| *rng.pick(OPINIONS));
            let conclusion = (rng.next_f64() < 0.8).then(|| {
                let parts = 1 + (rng.next_u64() % 5) as usize;
                (0..parts)
                    .map(|_| *rng.pick(CONCLUSION_PARTS))
                    .collect::<Vec<_>>()
                    .join(" ")
            });

            Row {
                id: i as i64 + 1,
                base_name: company.to_string(),
                report,
                kind,
                date,
                rating,
                opinion,
                conclusion,
            }
        })
        .collect()
}

fn write_csv(rows: &[Row], path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record(HEADERS)?;
    for r in rows {
        writer.write_record([
            r.id.to_string(),
            r.base_name.clone(),
            r.report.clone().unwrap_or_default(),
            r.kind.to_string(),
            r.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            r.rating.map(|v| v.to_string()).unwrap_or_default(),
            r.opinion.unwrap_or_default().to_string(),
            r.conclusion.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn build_batch(rows: &[Row]) -> Result<RecordBatch> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");

    let schema = Arc::new(Schema::new(vec![
        Field::new(HEADERS[0], DataType::Int64, false),
        Field::new(HEADERS[1], DataType::Utf8, false),
        Field::new(HEADERS[2], DataType::Utf8, true),
        Field::new(HEADERS[3], DataType::Utf8, false),
        Field::new(HEADERS[4], DataType::Date32, true),
        Field::new(HEADERS[5], DataType::Float64, true),
        Field::new(HEADERS[6], DataType::Utf8, true),
        Field::new(HEADERS[7], DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.base_name))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.report.as_deref()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.kind))),
            Arc::new(Date32Array::from_iter(rows.iter().map(|r| {
                r.date.map(|d| (d - epoch).num_days() as i32)
            }))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.rating))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.opinion))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.conclusion.as_deref()))),
        ],
    )
    .context("building record batch")?;
    Ok(batch)
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng, 40);

    std::fs::create_dir_all("data").context("creating data directory")?;

    let csv_path = "data/base_credito.csv";
    write_csv(&rows, csv_path)?;

    let batch = build_batch(&rows)?;
    let parquet_path = "data/base_credito.parquet";
    let file = std::fs::File::create(parquet_path)
        .with_context(|| format!("creating {parquet_path}"))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    print_batches(&[batch.slice(0, 5)])?;
    println!(
        "Wrote {} evaluations to {csv_path} and {parquet_path}",
        rows.len()
    );
    Ok(())
}
