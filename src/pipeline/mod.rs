//! # Normalization Pipeline
//!
//! parse → clean → simplify → coerce_numeric turns raw input into a working
//! table; summarize derives group-by summaries from it. Every stage is a pure
//! function from one table value to another.
use crate::config::Config;
use crate::error::SheetError;
use crate::table::Table;

mod cleaner;
mod coercer;
mod parser;
mod simplifier;
pub mod summary;
mod text;

pub use cleaner::clean;
pub use coercer::coerce_numeric;
pub use parser::parse;
pub use simplifier::simplify;
pub use summary::column_total;
pub use summary::summarize;
pub use text::Delimiter;

/// Raw input handed to [`parse`].
#[derive(Copy, Clone, Debug)]
pub enum Source<'a> {
    /// Spreadsheet file content (`.xlsx`, `.xlsm`, `.ods`)
    Spreadsheet(&'a [u8]),
    /// Pasted delimited text
    Text(&'a str),
    /// Delimited text in an unknown encoding
    TextBytes(&'a [u8]),
}

/// Runs parse, clean, simplify and coerce_numeric in order.
///
/// Returns `Ok(None)` when the input holds nothing to process.
pub fn normalize(source: Source<'_>, config: &Config) -> Result<Option<Table>, SheetError> {
    let Some(raw) = parse(source, config)? else {
        tracing::debug!("input holds no data");
        return Ok(None);
    };
    let cleaned = clean(&raw, config);
    let simplified = simplify(&cleaned);
    let coerced = coerce_numeric(&simplified, config);
    tracing::debug!(
        rows = coerced.row_count(),
        columns = coerced.column_count(),
        numeric = coerced.numeric_columns().len(),
        "normalized table"
    );
    Ok(Some(coerced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use crate::table::ColumnKind;

    #[test]
    fn normalizes_pasted_report() {
        let text = "Quarterly report,,,\n\nregion,units,price,note\nnorth,\"1,200\",2.5,\nsouth,300,n/a,late\n,,,\ntotal,1500,,\n";
        let table = normalize(Source::Text(text), &Config::default()).unwrap().unwrap();
        assert_eq!(table.columns(), ["Col_0", "Col_1", "Col_2", "Col_3"]);
        assert_eq!(
            table.rows()[0],
            vec![Cell::from("region"), Cell::Empty, Cell::Empty, Cell::from("note")]
        );
        assert_eq!(
            table.rows()[1],
            vec![Cell::from("north"), Cell::Number(1200.0), Cell::Number(2.5), Cell::Empty]
        );
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_kind(1), ColumnKind::Numeric);
        assert_eq!(table.column_kind(3), ColumnKind::Text);
    }

    #[test]
    fn nothing_to_normalize() {
        assert!(normalize(Source::Text("\n \n"), &Config::default()).unwrap().is_none());
    }
}
