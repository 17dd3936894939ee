//! Delimited text: tab, comma, or whitespace separated values.
use crate::config::Config;
use crate::error::SheetError;
use crate::table::Cell;
use crate::table::Table;
use csv::ReaderBuilder;
use csv::Trim;
use regex::Regex;

/// Field separator chosen for a block of text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
    Whitespace,
}

impl Delimiter {
    /// Picks the separator by priority: any tab, else any comma, else runs of
    /// whitespace.
    pub fn detect(text: &str) -> Self {
        if text.contains('\t') {
            Delimiter::Tab
        } else if text.contains(',') {
            Delimiter::Comma
        } else {
            Delimiter::Whitespace
        }
    }
}

/// Parses `text` into a table without a header row.
///
/// Returns `Ok(None)` when the text is blank or yields no rows.
pub(crate) fn parse_text(text: &str, config: &Config) -> Result<Option<Table>, SheetError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let delimiter = Delimiter::detect(text);
    let records = match delimiter {
        Delimiter::Tab => split_quoted(text, b'\t')?,
        Delimiter::Comma => split_quoted(text, b',')?,
        Delimiter::Whitespace => split_whitespace(text),
    };
    let rows: Vec<Vec<Cell>> = records
        .into_iter()
        .filter(|fields| !fields.iter().all(|field| field.trim().is_empty()))
        .map(|fields| fields.into_iter().map(|field| to_cell(field, config)).collect())
        .collect();
    tracing::debug!(?delimiter, rows = rows.len(), "parsed delimited text");
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(Table::from_rows(rows)))
}

fn to_cell(field: String, config: &Config) -> Cell {
    if config.is_null(&field) {
        Cell::Empty
    } else {
        Cell::Text(field)
    }
}

/// Splits on a single-byte delimiter, honouring double-quoted fields.
fn split_quoted(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>, SheetError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_owned).collect());
    }
    Ok(records)
}

fn split_whitespace(text: &str) -> Vec<Vec<String>> {
    let separator = Regex::new(r"\s+").expect("Hardcode regex pattern");
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| separator.split(line).map(str::to_owned).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Table> {
        parse_text(text, &Config::default()).unwrap()
    }

    #[test]
    fn delimiter_priority() {
        assert_eq!(Delimiter::detect("a\tb,c d"), Delimiter::Tab);
        assert_eq!(Delimiter::detect("a,b c"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a b   c"), Delimiter::Whitespace);
    }

    #[test]
    fn tabs_beat_commas() {
        let table = parse("1,5\tx\n2\ty").unwrap();
        assert_eq!(table.columns(), ["Col_0", "Col_1"]);
        assert_eq!(table.rows()[0], vec![Cell::from("1,5"), Cell::from("x")]);
        assert_eq!(table.rows()[1], vec![Cell::from("2"), Cell::from("y")]);
    }

    #[test]
    fn commas_with_quotes() {
        let table = parse("name,note\n\"Smith, J\",\"two\nlines\"\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[1], vec![Cell::from("Smith, J"), Cell::from("two\nlines")]);
    }

    #[test]
    fn whitespace_runs() {
        let table = parse("  a   1\n\n b\t\n").unwrap();
        // A tab is present, so the tab path wins here
        assert_eq!(table.rows()[0], vec![Cell::from("  a   1"), Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::from(" b"), Cell::Empty]);

        let table = parse("  a   1  \n\n b 2   3\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], vec![Cell::from("a"), Cell::from("1"), Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::from("b"), Cell::from("2"), Cell::from("3")]);
    }

    #[test]
    fn short_rows_are_padded() {
        let table = parse("a,b,c\nd\ne,f").unwrap();
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.rows()[1], vec![Cell::from("d"), Cell::Empty, Cell::Empty]);
        assert_eq!(table.rows()[2], vec![Cell::from("e"), Cell::from("f"), Cell::Empty]);
    }

    #[test]
    fn null_literals_become_empty() {
        let table = parse("a,NA,\nN/A,  ,x").unwrap();
        assert_eq!(table.rows()[0], vec![Cell::from("a"), Cell::Empty, Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::Empty, Cell::Empty, Cell::from("x")]);
    }

    #[test]
    fn blank_text_is_no_data() {
        assert!(parse("").is_none());
        assert!(parse(" \n\t \n").is_none());
    }
}
