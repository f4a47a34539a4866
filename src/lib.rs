//! Credit evaluation reports: load a spreadsheet of ratings, normalize it into
//! [`data::model::CreditTable`], filter it, and summarise the visible records.

pub mod color;
pub mod config;
pub mod data;
pub mod report;
pub mod state;
pub mod ui;
