//! # Sheet Summary
//!
//! Turns loosely structured tabular input, such as a spreadsheet upload or a
//! block of pasted text, into a clean rectangular table and builds ad-hoc
//! group-by/sum summaries over it.
//!
//! ## Features
//!
//! - **Spreadsheet input**: First sheet of Excel (`.xls`, `.xlsx`, `.xlsm`) and OpenDocument
//!   (`.ods`) files, detected from the file content
//! - **Pasted text**: Tab, comma, or whitespace separated values, with the delimiter detected
//!   from the text
//! - **Cleaning**: Sparse rows, empty columns, and the sparse rows around the data block are
//!   removed
//! - **Positional schema**: Columns are named `Col_0`, `Col_1`, ... by position, no header row
//!   is assumed
//! - **Numeric coercion**: Text columns become numeric when most of their values are numbers
//! - **Summaries**: Group by any columns, sum numeric ones, and divide two sums
//!
//! ## Pipeline
//!
//! [`parse`] → [`clean`] → [`simplify`] → [`coerce_numeric`] produce the working table,
//! [`normalize`] runs all four. [`summarize`] derives summaries from the working table.
//! [`Session`] keeps the working table between requests.
pub mod config;
pub mod error;
mod helpers;
pub mod pipeline;
pub mod session;
pub mod spreadsheet;
pub mod table;

pub use config::Config;
pub use error::ErrorKind;
pub use error::SheetError;
pub use helpers::xml::XmlError;
pub use pipeline::clean;
pub use pipeline::coerce_numeric;
pub use pipeline::column_total;
pub use pipeline::normalize;
pub use pipeline::parse;
pub use pipeline::simplify;
pub use pipeline::summarize;
pub use pipeline::summary::ColumnSelection;
pub use pipeline::summary::SummaryError;
pub use pipeline::summary::SummarySpec;
pub use pipeline::summary::SummaryTable;
pub use pipeline::Source;
pub use session::Session;
pub use table::Cell;
pub use table::ColumnKind;
pub use table::Table;
