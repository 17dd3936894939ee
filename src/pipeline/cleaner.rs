use crate::config::Config;
use crate::table::Cell;
use crate::table::Table;

/// Strips sparse rows, empty columns, and the sparse rows around the data
/// block.
///
/// Rows are filtered before columns, so a dropped row never counts toward a
/// column's emptiness. The leading and trailing trims run last and keep the
/// table as it is when no row has enough values to anchor them. Columns are
/// not checked again after the trims: a column whose values all sat in the
/// trimmed rows survives here empty and is left for `simplify` to drop.
pub fn clean(table: &Table, config: &Config) -> Table {
    let rows_kept = table.retain_rows(|_, row| empty_ratio(row) < config.row_null_threshold);

    let columns: Vec<usize> = (0..rows_kept.column_count())
        .filter(|&index| rows_kept.empty_count(index) < rows_kept.row_count())
        .collect();
    let columns_kept = rows_kept.select_columns(&columns);

    let is_anchor = |row: &[Cell]| {
        row.iter().filter(|cell| !cell.is_empty()).count() >= config.min_anchor_values
    };
    let first = columns_kept.rows().iter().position(|row| is_anchor(row.as_slice()));
    let last = columns_kept.rows().iter().rposition(|row| is_anchor(row.as_slice()));
    let cleaned = match (first, last) {
        (Some(first), Some(last)) => {
            columns_kept.retain_rows(|index, _| (first..=last).contains(&index))
        }
        _ => columns_kept,
    };

    tracing::debug!(
        rows_in = table.row_count(),
        columns_in = table.column_count(),
        rows_out = cleaned.row_count(),
        columns_out = cleaned.column_count(),
        "cleaned table"
    );
    cleaned
}

/// Fraction of empty cells in `row`. A row without cells counts as empty.
fn empty_ratio(row: &[Cell]) -> f64 {
    if row.is_empty() {
        return 1.0;
    }
    let empty = row.iter().filter(|cell| cell.is_empty()).count();
    empty as f64 / row.len() as f64
}
