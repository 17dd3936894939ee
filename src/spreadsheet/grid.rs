use crate::config::Config;
use crate::error::SheetError;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Cell;
use crate::table::Table;

/// Largest bounding box, in cells, a sheet may span before it is laid out
/// densely.
pub(crate) const MAX_GRID_CELLS: usize = 10_000_000;

/// Non-empty cells of one sheet collected in reading order, together with
/// the bounding box they occupy.
#[derive(Debug)]
pub(crate) struct Grid<'a> {
    config: &'a Config,
    cells: Vec<(usize, usize, Cell)>,
    row_lower_bound: Option<usize>,
    row_upper_bound: Option<usize>,
    col_lower_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl<'a> Grid<'a> {
    pub(crate) fn new(config: &'a Config) -> Grid<'a> {
        Grid {
            config,
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Records a cell at `row`, `col`.
    pub(crate) fn push(&mut self, row: usize, col: usize, cell: Cell) -> Result<(), SheetError> {
        self.push_repeated(row, col, 1, 1, cell)
    }

    /// Records `cell` over `rows` × `cols` positions starting at `row`, `col`.
    ///
    /// Empty cells and text matching a null literal only matter through the
    /// bounds of the others and are skipped.
    ///
    /// # Errors
    /// * `CellOutOfRange` - the block reaches past the sheet limits
    /// * `SheetTooLarge` - the bounding box would exceed [`MAX_GRID_CELLS`]
    pub(crate) fn push_repeated(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
        cell: Cell,
    ) -> Result<(), SheetError> {
        let is_null = match &cell {
            Cell::Empty => true,
            Cell::Text(text) => self.config.is_null(text),
            Cell::Number(_) => false,
        };
        if is_null {
            return Ok(());
        }

        let out_of_range = || SpreadsheetError::CellOutOfRange {
            row: row.saturating_add(1),
            col: col.saturating_add(1),
        };
        let last_row = row
            .checked_add(rows.max(1) - 1)
            .filter(|last| *last < MAX_ROWS)
            .ok_or_else(out_of_range)?;
        let last_col = col
            .checked_add(cols.max(1) - 1)
            .filter(|last| *last < MAX_COLUMNS)
            .ok_or_else(out_of_range)?;

        let row_lower = self.row_lower_bound.map_or(row, |lower| lower.min(row));
        let row_upper = self.row_upper_bound.map_or(last_row, |upper| upper.max(last_row));
        let col_lower = self.col_lower_bound.map_or(col, |lower| lower.min(col));
        let col_upper = self.col_upper_bound.map_or(last_col, |upper| upper.max(last_col));
        let area = (row_upper - row_lower + 1).saturating_mul(col_upper - col_lower + 1);
        if area > MAX_GRID_CELLS {
            return Err(SpreadsheetError::SheetTooLarge(MAX_GRID_CELLS).into());
        }

        self.row_lower_bound = Some(row_lower);
        self.row_upper_bound = Some(row_upper);
        self.col_lower_bound = Some(col_lower);
        self.col_upper_bound = Some(col_upper);
        for row in row..=last_row {
            for col in col..=last_col {
                self.cells.push((row, col, cell.clone()));
            }
        }
        Ok(())
    }

    /// Lays the cells out as a dense table covering the bounding box. A cell
    /// written twice keeps its last value.
    pub(crate) fn into_table(self) -> Table {
        let (Some(row_lower), Some(row_upper), Some(col_lower), Some(col_upper)) = (
            self.row_lower_bound,
            self.row_upper_bound,
            self.col_lower_bound,
            self.col_upper_bound,
        ) else {
            return Table::default();
        };
        let width = col_upper - col_lower + 1;
        let mut rows = vec![vec![Cell::Empty; width]; row_upper - row_lower + 1];
        for (row, col, cell) in self.cells {
            rows[row - row_lower][col - col_lower] = cell;
        }
        Table::from_rows(rows)
    }
}
