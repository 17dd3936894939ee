use crate::config::Config;
use crate::table::Cell;
use crate::table::ColumnKind;
use crate::table::Table;

/// Turns text columns into numeric ones when enough of their values read as
/// numbers. Numeric columns are left alone.
pub fn coerce_numeric(table: &Table, config: &Config) -> Table {
    let mut coerced = table.clone();
    for index in 0..table.column_count() {
        if table.column_kind(index) != ColumnKind::Text {
            continue;
        }
        let converted: Vec<Option<f64>> = table
            .column(index)
            .map(|cell| to_number(cell, config.thousands_separator))
            .collect();
        let non_empty = table.row_count() - table.empty_count(index);
        let numbers = converted.iter().filter(|value| value.is_some()).count();
        if numbers == 0 || (numbers as f64) < config.numeric_ratio * non_empty as f64 {
            continue;
        }
        tracing::debug!(
            column = %table.columns()[index],
            numbers,
            non_empty,
            "coerced column to numbers"
        );
        let cells = converted.into_iter().map(|value| value.map_or(Cell::Empty, Cell::Number)).collect();
        coerced = coerced.with_column(index, cells);
    }
    coerced
}

fn to_number(cell: &Cell, thousands_separator: char) -> Option<f64> {
    match cell {
        Cell::Number(value) => Some(*value),
        Cell::Text(text) => parse_number(text, thousands_separator),
        Cell::Empty => None,
    }
}

/// Reads `text` as a finite number once grouping characters are removed.
pub(crate) fn parse_number(text: &str, thousands_separator: char) -> Option<f64> {
    let digits: String = text.trim().chars().filter(|&c| c != thousands_separator).collect();
    digits.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[&str]) -> Table {
        Table::from_rows(
            values
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        vec![Cell::Empty]
                    } else {
                        vec![Cell::from(*value)]
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn parses_grouped_numbers() {
        assert_eq!(parse_number(" 1,234.5 ", ','), Some(1234.5));
        assert_eq!(parse_number("-7", ','), Some(-7.0));
        assert_eq!(parse_number("1e3", ','), Some(1000.0));
        assert_eq!(parse_number("inf", ','), None);
        assert_eq!(parse_number("NaN", ','), None);
        assert_eq!(parse_number("12 apples", ','), None);
    }

    #[test]
    fn half_convertible_is_converted() {
        let coerced = coerce_numeric(&column(&["1", "x", "2,000", "y"]), &Config::default());
        assert_eq!(
            coerced.rows(),
            [vec![Cell::Number(1.0)], vec![Cell::Empty], vec![Cell::Number(2000.0)], vec![Cell::Empty]]
        );
        assert_eq!(coerced.column_kind(0), ColumnKind::Numeric);
    }

    #[test]
    fn quarter_convertible_stays_text() {
        let table = column(&["1", "x", "y", "z", ""]);
        assert_eq!(coerce_numeric(&table, &Config::default()), table);
    }

    #[test]
    fn columns_are_independent() {
        let table = Table::from_rows(vec![
            vec![Cell::from("a"), Cell::from("3"), Cell::Number(1.0)],
            vec![Cell::from("b"), Cell::from("4.5"), Cell::Empty],
        ]);
        let coerced = coerce_numeric(&table, &Config::default());
        assert_eq!(coerced.column_kind(0), ColumnKind::Text);
        assert_eq!(coerced.column(1).cloned().collect::<Vec<_>>(), [Cell::Number(3.0), Cell::Number(4.5)]);
        assert_eq!(coerced.column(2).cloned().collect::<Vec<_>>(), [Cell::Number(1.0), Cell::Empty]);
    }

    #[test]
    fn numeric_cells_in_text_column_count() {
        let table = Table::from_rows(vec![vec![Cell::Number(5.0)], vec![Cell::from("x")]]);
        let coerced = coerce_numeric(&table, &Config::default());
        assert_eq!(coerced.rows(), [vec![Cell::Number(5.0)], vec![Cell::Empty]]);
    }

    #[test]
    fn idempotent() {
        let once = coerce_numeric(&column(&["1", "x", "2", "3"]), &Config::default());
        assert_eq!(coerce_numeric(&once, &Config::default()), once);
    }
}
