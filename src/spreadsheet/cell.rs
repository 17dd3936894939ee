use crate::table::Cell;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use iso8601_duration::Duration as IsoDuration;

/// How the raw value of a spreadsheet cell is to be read.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean stored as "1"/"0" (or "true"/"false")
    Boolean,
    /// Plain number
    Number,
    /// Serial day number formatted as a date
    Date,
    /// Serial day number with a time fraction
    DateTime,
    /// Serial fraction of a day
    Time,
    /// ISO 8601 date or date-time text
    IsoDateTime,
    /// ISO 8601 duration text (OpenDocument time cells)
    IsoDuration,
    /// Text stored in the cell itself
    InlineString,
    /// Index into the shared string table
    SharedString,
    /// Error value such as `#N/A`
    Error,
}

impl CellType {
    /// Classifies a built-in number format id.
    pub(crate) fn from_builtin_format(id: usize) -> Self {
        match id {
            14..=17 => Self::Date,
            18..=21 | 45..=47 => Self::Time,
            22 => Self::DateTime,
            _ => Self::Number,
        }
    }

    /// Classifies a custom number format code by scanning for date and time
    /// tokens outside literals, escapes, and bracketed sections.
    pub(crate) fn from_format_code(code: &str) -> Self {
        let mut escaped = false;
        let mut literal = false;
        let mut bracket = false;
        let mut date = false;
        let mut time = false;
        for character in code.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match character {
                '\\' | '_' if !literal => escaped = true,
                '"' if !bracket => literal = !literal,
                '[' if !literal => bracket = true,
                ']' if bracket => bracket = false,
                _ if literal || bracket => (),
                'y' | 'Y' | 'd' | 'D' => date = true,
                'h' | 'H' | 's' | 'S' => time = true,
                _ => (),
            }
        }
        match (date, time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::Number,
        }
    }
}

/// Converts a raw cell value to a table cell.
///
/// Shared-string cells must already have been resolved to their text. Values
/// that cannot be read as their declared type are kept as text.
pub(crate) fn to_table_cell(kind: CellType, value: &str, is_1904: bool) -> Cell {
    let as_text = || {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_owned())
        }
    };
    match kind {
        CellType::Empty | CellType::Error => Cell::Empty,
        CellType::Boolean => match value.trim() {
            "1" | "true" => Cell::from("TRUE"),
            "0" | "false" => Cell::from("FALSE"),
            _ => as_text(),
        },
        CellType::Number => value.trim().parse::<f64>().map(Cell::Number).unwrap_or_else(|_| as_text()),
        CellType::Date | CellType::DateTime | CellType::Time => value
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|serial| serial_to_text(kind, serial, is_1904))
            .map(Cell::Text)
            .unwrap_or_else(as_text),
        CellType::IsoDateTime => {
            let text = value.trim().replace('T', " ");
            if text.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(text)
            }
        }
        CellType::IsoDuration => duration_to_text(value).map(Cell::Text).unwrap_or_else(as_text),
        CellType::InlineString | CellType::SharedString => as_text(),
    }
}

/// Formats a serial day number as ISO date, time, or date-time text.
fn serial_to_text(kind: CellType, serial: f64, is_1904: bool) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        // Serial 60 is the non-existent 1900-02-29 carried over from Lotus 1-2-3
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(days + offset))?;
    let millis = (serial.fract() * 86_400_000f64).round() as i64;
    let datetime: NaiveDateTime = date.and_hms_opt(0, 0, 0)? + Duration::milliseconds(millis);
    let text = match kind {
        CellType::Date => datetime.format("%Y-%m-%d").to_string(),
        CellType::Time => datetime.format("%H:%M:%S").to_string(),
        _ => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    Some(text)
}

/// Formats an ISO 8601 duration such as `PT12H30M05S` as `12:30:05`.
fn duration_to_text(value: &str) -> Option<String> {
    let duration = value.trim().parse::<IsoDuration>().ok()?;
    let hours = (duration.day * 24.0 + duration.hour) as i64;
    let minutes = duration.minute as i64;
    let seconds = duration.second.round() as i64;
    Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}
