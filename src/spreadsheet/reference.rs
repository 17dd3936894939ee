//! Excel-style cell references ("B3") and their 0-based (row, col) indexes.

/// Rows of the largest sheet Excel can hold (1048576).
pub(crate) const MAX_ROWS: usize = 1 << 20;
/// Columns of the largest sheet Excel can hold (16384, "XFD").
pub(crate) const MAX_COLUMNS: usize = 1 << 14;

/// Converts column letters ("A", "AB") to a 0-based column index.
///
/// Letters past "XFD" are rejected.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters
        .bytes()
        .try_fold(0usize, |acc, byte| {
            let byte = byte.to_ascii_uppercase();
            if !byte.is_ascii_uppercase() {
                return None;
            }
            acc.checked_mul(26)?.checked_add((byte - b'A') as usize + 1)
        })
        .map(|number| number - 1)
        .filter(|index| *index < MAX_COLUMNS)
}

/// Converts a 1-based row number ("3") to a 0-based row index.
///
/// Numbers past 1048576 are rejected.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
}

/// Splits a reference like "B3" (or "$B$3") into 0-based (row, col).
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let col = col_to_index(&reference[..split])?;
    let row = row_to_index(&reference[split..])?;
    Some((row, col))
}
