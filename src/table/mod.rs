//! # Table Model
//!
//! The rectangular value every pipeline stage consumes and produces. A table
//! is never mutated in place by the pipeline: each stage builds a new one.
use std::fmt::Display;

mod cell;

pub use cell::Cell;

/// Classification of a column, derived from its contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Only numbers and empty cells
    Numeric,
    /// At least one text cell
    Text,
}

/// A rectangular grid of cells with one identifier per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Positional identifier of the column at `index`.
pub fn column_name(index: usize) -> String {
    format!("Col_{index}")
}

impl Table {
    /// Builds a table from raw rows, padding short rows with empty cells up to
    /// the widest row and assigning positional identifiers.
    pub fn from_rows(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Table {
            columns: (0..width).map(column_name).collect(),
            rows,
        }
    }

    /// Builds a table from identifiers and rows whose widths already agree.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Table { columns, rows }
    }

    /// Column identifiers, left to right.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, top to bottom.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column named `id`.
    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == id)
    }

    /// Iterates the cells of the column at `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Number of empty cells in the column at `index`.
    pub(crate) fn empty_count(&self, index: usize) -> usize {
        self.column(index).filter(|cell| cell.is_empty()).count()
    }

    /// Classifies the column at `index`.
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        if self.column(index).any(Cell::is_text) {
            ColumnKind::Text
        } else {
            ColumnKind::Numeric
        }
    }

    /// Identifiers of the numeric columns, the candidates for summation.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(index, _)| self.column_kind(*index) == ColumnKind::Numeric)
            .map(|(_, id)| id.as_str())
            .collect()
    }

    /// Keeps only the rows whose index satisfies `keep`, in order.
    pub(crate) fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(usize, &[Cell]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(index, row)| keep(*index, row))
            .map(|(_, row)| row.clone())
            .collect();
        Table::from_parts(self.columns.clone(), rows)
    }

    /// Keeps only the columns at `indexes`, preserving their identifiers.
    pub(crate) fn select_columns(&self, indexes: &[usize]) -> Table {
        let columns = indexes.iter().map(|&index| self.columns[index].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&index| row[index].clone()).collect())
            .collect();
        Table::from_parts(columns, rows)
    }

    /// Replaces the identifiers, keeping the cells.
    pub(crate) fn with_columns(self, columns: Vec<String>) -> Table {
        Table::from_parts(columns, self.rows)
    }

    /// Replaces the column at `index` with `cells`.
    pub(crate) fn with_column(mut self, index: usize, cells: Vec<Cell>) -> Table {
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row[index] = cell;
        }
        self
    }
}

impl Display for Table {
    /// Renders the table as left-aligned, space-separated columns under a
    /// header line of identifiers.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, id)| {
                rendered
                    .iter()
                    .map(|row| row[index].chars().count())
                    .chain(std::iter::once(id.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_line(f, self.columns.iter().map(String::as_str), &widths)?;
        for row in &rendered {
            write_line(f, row.iter().map(String::as_str), &widths)?;
        }
        Ok(())
    }
}

fn write_line<'a>(
    f: &mut std::fmt::Formatter<'_>,
    values: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> std::fmt::Result {
    let line = values
        .zip(widths.iter().copied())
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_pads_to_widest() {
        let table = Table::from_rows(vec![
            vec![Cell::from("a")],
            vec![Cell::from("b"), Cell::Number(1.0), Cell::Number(2.0)],
            vec![],
        ]);
        assert_eq!(table.columns(), ["Col_0", "Col_1", "Col_2"]);
        assert!(table.rows().iter().all(|row| row.len() == 3));
        assert_eq!(table.rows()[0][2], Cell::Empty);
        assert_eq!(table.rows()[2], vec![Cell::Empty; 3]);
    }

    #[test]
    fn column_kinds() {
        let table = Table::from_rows(vec![
            vec![Cell::from("x"), Cell::Number(1.0), Cell::Empty],
            vec![Cell::Number(2.0), Cell::Empty, Cell::Empty],
        ]);
        assert_eq!(table.column_kind(0), ColumnKind::Text);
        assert_eq!(table.column_kind(1), ColumnKind::Numeric);
        assert_eq!(table.numeric_columns(), vec!["Col_1", "Col_2"]);
    }

    #[test]
    fn display_aligns_columns() {
        let table = Table::from_rows(vec![
            vec![Cell::from("alpha"), Cell::Number(1.0)],
            vec![Cell::from("b"), Cell::Number(22.5)],
        ]);
        let expected = "Col_0  Col_1\nalpha  1\nb      22.5\n";
        assert_eq!(table.to_string(), expected);
    }
}
