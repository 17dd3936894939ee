//! Policy values steering the normalization heuristics.
use std::collections::HashSet;

/// Field values read as missing, in delimited text and spreadsheet cells alike.
const DEFAULT_NULLS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Heuristic thresholds and parsing options shared by the pipeline stages.
#[derive(Clone, Debug)]
pub struct Config {
    /// Rows whose fraction of empty cells reaches this value are dropped.
    pub row_null_threshold: f64,

    /// Minimum non-empty cells for a row to anchor the leading/trailing trim.
    pub min_anchor_values: usize,

    /// Fraction of non-empty values that must parse as numbers for a text
    /// column to become numeric.
    pub numeric_ratio: f64,

    /// Grouping character stripped before parsing numbers.
    pub thousands_separator: char,

    /// Decimal places kept in aggregated output.
    pub decimals: i32,

    /// Text fields read as empty cells (compared after trimming).
    pub nulls: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            row_null_threshold: 0.8,
            min_anchor_values: 3,
            numeric_ratio: 0.5,
            thousands_separator: ',',
            decimals: 2,
            nulls: DEFAULT_NULLS.iter().map(|null| null.to_string()).collect(),
        }
    }
}

impl Config {
    /// Returns true if `field` stands for a missing value.
    pub(crate) fn is_null(&self, field: &str) -> bool {
        let field = field.trim();
        field.is_empty() || self.nulls.contains(field)
    }

    /// Rounds `value` to the configured number of decimal places.
    pub(crate) fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimals);
        (value * factor).round() / factor
    }
}
