use crate::table::column_name;
use crate::table::Table;

/// Drops every fully empty column and renames the survivors `Col_0..Col_n`
/// by position.
pub fn simplify(table: &Table) -> Table {
    let kept: Vec<usize> = (0..table.column_count())
        .filter(|&index| table.row_count() > 0 && table.empty_count(index) < table.row_count())
        .collect();
    let columns = (0..kept.len()).map(column_name).collect();
    let simplified = table.select_columns(&kept).with_columns(columns);
    tracing::debug!(
        dropped = table.column_count() - simplified.column_count(),
        columns = simplified.column_count(),
        "simplified schema"
    );
    simplified
}
