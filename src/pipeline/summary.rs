//! # Summary Engine
//!
//! Group-by/sum over a normalized table with an optional ratio of two summed
//! columns. Requests are validated against the table first; a rejected
//! request leaves nothing behind and can be retried with new selections.
use crate::config::Config;
use crate::error::SheetError;
use crate::table::Cell;
use crate::table::Table;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Select at least one column to group by")]
    EmptyGroupColumns,

    #[error("Select at least one column to sum")]
    EmptySumColumns,

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' cannot be both grouped and summed")]
    OverlappingColumn(String),

    #[error("Column '{column}' is not numeric: row {row} holds '{value}'")]
    NonNumericColumn { column: String, row: usize, value: String },

    #[error("No table has been loaded")]
    NoWorkingTable,
}

impl SummaryError {
    /// Returns true if the request was well formed but names a column whose
    /// contents cannot be summed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SummaryError::NonNumericColumn { .. })
    }
}

/// An ordered set of column identifiers. Repeated identifiers are kept once,
/// at their first position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSelection(Vec<String>);

impl ColumnSelection {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = ColumnSelection::default();
        for id in ids {
            selection.push(id);
        }
        selection
    }

    /// Appends `id` unless it is already selected.
    pub fn push<S: Into<String>>(&mut self, id: S) {
        let id = id.into();
        if !self.contains(&id) {
            self.0.push(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|selected| selected == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ColumnSelection::new(iter)
    }
}

/// A summary request: which columns form the group key, which are summed,
/// and optionally which two summed columns are divided.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummarySpec {
    pub group: ColumnSelection,
    pub sum: ColumnSelection,
    pub ratio: Option<(String, String)>,
}

impl SummarySpec {
    pub fn new(group: ColumnSelection, sum: ColumnSelection) -> Self {
        SummarySpec { group, sum, ratio: None }
    }

    pub fn with_ratio<N: Into<String>, D: Into<String>>(mut self, numerator: N, denominator: D) -> Self {
        self.ratio = Some((numerator.into(), denominator.into()));
        self
    }

    /// The ratio pair, if both members are summed columns.
    fn effective_ratio(&self) -> Option<(&str, &str)> {
        let (numerator, denominator) = self.ratio.as_ref()?;
        if self.sum.contains(numerator) && self.sum.contains(denominator) {
            Some((numerator.as_str(), denominator.as_str()))
        } else {
            None
        }
    }
}

/// Name of the column holding `numerator / denominator`.
pub fn ratio_column_name(numerator: &str, denominator: &str) -> String {
    format!("{numerator}_div_{denominator}")
}

/// Result of [`summarize`]: one row per distinct group key, plus the grand
/// total of every summed column.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryTable {
    table: Table,
    totals: Vec<(String, f64)>,
}

impl SummaryTable {
    /// Group columns, then summed columns, then the ratio column if requested.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Grand total of each summed column, in selection order.
    pub fn totals(&self) -> &[(String, f64)] {
        &self.totals
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Groups the rows of `table` and sums the selected columns per group.
///
/// Empty cells count as zero in sums. Empty group-key values form a group of
/// their own. Groups are ordered by key: numbers ascending, then text, then
/// empty values. A zero denominator yields NaN in the ratio column.
pub fn summarize(table: &Table, spec: &SummarySpec, config: &Config) -> Result<SummaryTable, SheetError> {
    let (group_indexes, sum_indexes) = resolve(table, spec)?;
    let values = sum_values(table, &sum_indexes)?;

    let keys: Vec<Vec<&Cell>> = table
        .rows()
        .iter()
        .map(|row| group_indexes.iter().map(|&index| &row[index]).collect())
        .collect();
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&left, &right| compare_keys(&keys[left], &keys[right]));

    let mut groups: Vec<(usize, Vec<f64>)> = Vec::new();
    for row in order {
        match groups.last_mut() {
            Some((first, sums)) if compare_keys(&keys[*first], &keys[row]) == Ordering::Equal => {
                for (sum, value) in sums.iter_mut().zip(&values[row]) {
                    *sum += value;
                }
            }
            _ => groups.push((row, values[row].clone())),
        }
    }

    let ratio = spec.effective_ratio().and_then(|(numerator, denominator)| {
        let position = |id: &str| spec.sum.ids().iter().position(|selected| selected == id);
        Some((position(numerator)?, position(denominator)?))
    });

    let mut columns: Vec<String> = spec.group.ids().iter().chain(spec.sum.ids()).cloned().collect();
    if let Some((numerator, denominator)) = spec.effective_ratio() {
        columns.push(ratio_column_name(numerator, denominator));
    }

    let rows: Vec<Vec<Cell>> = groups
        .iter()
        .map(|(first, sums)| {
            let mut row: Vec<Cell> = keys[*first].iter().map(|&cell| cell.clone()).collect();
            row.extend(sums.iter().map(|&sum| Cell::Number(config.round(sum))));
            if let Some((numerator, denominator)) = ratio {
                row.push(Cell::Number(divide(sums[numerator], sums[denominator], config)));
            }
            row
        })
        .collect();

    let offset = spec.group.ids().len();
    let totals = spec
        .sum
        .ids()
        .iter()
        .enumerate()
        .map(|(position, id)| {
            let total = rows.iter().filter_map(|row| row[offset + position].as_number()).sum::<f64>();
            (id.clone(), config.round(total))
        })
        .collect();

    tracing::debug!(groups = rows.len(), columns = columns.len(), "summarized table");
    Ok(SummaryTable {
        table: Table::from_parts(columns, rows),
        totals,
    })
}

/// Grand total of the column named `id`, empty cells counting as zero.
pub fn column_total(table: &Table, id: &str, config: &Config) -> Result<f64, SheetError> {
    let index = table
        .column_index(id)
        .ok_or_else(|| SummaryError::UnknownColumn(id.to_owned()))?;
    let values = sum_values(table, &[index])?;
    Ok(config.round(values.iter().map(|row| row[0]).sum::<f64>()))
}

/// Validates the selections and maps them to column positions.
fn resolve(table: &Table, spec: &SummarySpec) -> Result<(Vec<usize>, Vec<usize>), SummaryError> {
    if spec.group.is_empty() {
        return Err(SummaryError::EmptyGroupColumns);
    }
    if spec.sum.is_empty() {
        return Err(SummaryError::EmptySumColumns);
    }
    let lookup = |id: &String| table.column_index(id).ok_or_else(|| SummaryError::UnknownColumn(id.clone()));
    let group = spec.group.ids().iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
    let sum = spec.sum.ids().iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
    if let Some(id) = spec.sum.ids().iter().find(|id| spec.group.contains(id)) {
        return Err(SummaryError::OverlappingColumn(id.clone()));
    }
    Ok((group, sum))
}

/// Reads the summed columns of every row as numbers, empty cells as zero.
fn sum_values(table: &Table, indexes: &[usize]) -> Result<Vec<Vec<f64>>, SummaryError> {
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            indexes
                .iter()
                .map(|&index| match &cells[index] {
                    Cell::Number(value) => Ok(*value),
                    Cell::Empty => Ok(0.0),
                    Cell::Text(text) => Err(SummaryError::NonNumericColumn {
                        column: table.columns()[index].clone(),
                        row,
                        value: text.clone(),
                    }),
                })
                .collect()
        })
        .collect()
}

fn compare_keys(left: &[&Cell], right: &[&Cell]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(left, right)| left.natural_cmp(right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn divide(numerator: f64, denominator: f64, config: &Config) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        config.round(numerator / denominator)
    }
}
