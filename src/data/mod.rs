/// Data layer: core types, loading, normalization, caching and filtering.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read one sheet → RawSheet
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  resolve columns, backfill names, derive bands/opinions
///   └───────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ CreditTable  │  Vec<CreditRecord>, cached per source file
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  kind / opinion / band / period → filtered indices
///   └──────────┘
/// ```

pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
