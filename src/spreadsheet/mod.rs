//! # Spreadsheet Containers
//!
//! Decodes the first sheet of an in-memory spreadsheet file into an untyped
//! table. Office Open XML workbooks (`.xlsx`, `.xlsm`), OpenDocument
//! spreadsheets (`.ods`) and legacy Excel workbooks (`.xls`) are recognized
//! by their content, not by a file name. No header row is assumed: the first
//! row of the sheet is data.
use crate::config::Config;
use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::helpers::cfb::Cfb;
use crate::helpers::zip::ZipHelper;
use crate::table::Table;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

mod cell;
mod grid;
mod ods;
mod reference;
mod xls;
mod xlsx;

pub use xls::XlsError;

/// Leading bytes of a ZIP local file header.
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
/// Leading bytes of an empty ZIP archive.
const EMPTY_ZIP_SIGNATURE: &[u8] = b"PK\x05\x06";
/// Leading bytes of an OLE compound file (legacy `.xls`, encrypted workbooks).
const COMPOUND_FILE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unrecognized spreadsheet format")]
    UnknownFormat,

    #[error("Password-protected spreadsheets are not supported")]
    Encrypted,

    #[error("Missing part '{0}' in spreadsheet container")]
    MissingPart(String),

    #[error("Workbook contains no worksheet")]
    NoSheets,

    #[error("Shared string index {0} out of range")]
    SharedStringOutOfRange(usize),

    #[error("Invalid cell reference '{0}'")]
    InvalidReference(String),

    /// Position is 1-based
    #[error("Cell at row {row}, column {col} lies outside the sheet limits")]
    CellOutOfRange { row: usize, col: usize },

    #[error("Sheet spans more than {0} cells")]
    SheetTooLarge(usize),
}

/// Container formats recognized by [`read_first_sheet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Ods,
    Xls,
}

/// Decodes the first sheet of `bytes`.
///
/// Text cells equal to one of `config`'s null literals are read as empty.
///
/// # Returns
/// * `Ok(Some(table))` - The first sheet's non-empty bounding box
/// * `Ok(None)` - The input is blank or the first sheet holds no values
/// * `Err` - The bytes are not a readable spreadsheet
pub fn read_first_sheet(bytes: &[u8], config: &Config) -> Result<Option<Table>, SheetError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let (format, table) = if bytes.starts_with(COMPOUND_FILE_SIGNATURE) {
        let cfb = Cfb::new(&mut Cursor::new(bytes)).with_prefix("Read compound file")?;
        (SpreadsheetFormat::Xls, xls::read_first_sheet(&cfb, config)?)
    } else if bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(EMPTY_ZIP_SIGNATURE) {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        read_zip_container(&mut zip, config)?
    } else {
        return Err(SpreadsheetError::UnknownFormat.into());
    };
    tracing::debug!(
        ?format,
        rows = table.row_count(),
        columns = table.column_count(),
        "decoded first sheet"
    );
    Ok(Some(table).filter(|table| !table.is_empty()))
}

/// Tells xlsx from ods by the parts the archive holds and reads the first
/// sheet.
fn read_zip_container<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    config: &Config,
) -> Result<(SpreadsheetFormat, Table), SheetError> {
    if zip.contains("xl/workbook.xml") {
        Ok((SpreadsheetFormat::Xlsx, xlsx::read_first_sheet(zip, config)?))
    } else if ods::is_ods(zip)? {
        Ok((SpreadsheetFormat::Ods, ods::read_first_sheet(zip, config)?))
    } else {
        Err(SpreadsheetError::UnknownFormat.into())
    }
}
