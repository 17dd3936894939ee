use std::cmp::Ordering;
use std::fmt::Display;

/// A single scalar entry of a table.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    /// Missing value, distinct from empty text
    #[default]
    Empty,
    /// Free text
    Text(String),
    /// Numeric value
    Number(f64),
}

impl Cell {
    /// Returns true if the cell holds no value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Returns true if the cell holds text.
    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// Returns the number held by the cell, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text held by the cell, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Orders cells the way group keys are sorted: numbers ascending, then
    /// text lexicographically, then empty cells.
    pub fn natural_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(left), Cell::Number(right)) => {
                if left == right {
                    Ordering::Equal
                } else {
                    left.total_cmp(right)
                }
            }
            (Cell::Text(left), Cell::Text(right)) => left.cmp(right),
            (Cell::Empty, Cell::Empty) => Ordering::Equal,
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(_), Cell::Empty) => Ordering::Less,
            (Cell::Empty, Cell::Text(_)) => Ordering::Greater,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(value) => write!(f, "{}", value),
            Cell::Number(value) if value.is_nan() => write!(f, "NaN"),
            // Whole numbers print without a fractional part
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Cell::Number(value) => write!(f, "{}", value),
        }
    }
}
