//! Legacy Excel workbooks (`.xls`): the BIFF8 Workbook stream of a compound
//! file, first worksheet only.

use crate::config::Config;
use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_table_cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use std::collections::HashMap;
use thiserror::Error;

// BIFF8 record type identifiers
const FORMULA: u16 = 6; // Formula cell with its cached result
const EOF: u16 = 10; // End of a substream
const DATE1904: u16 = 34; // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47; // Workbook is encrypted
const CODE_PAGE: u16 = 66; // Encoding of 8-bit strings
const BOUND_SHEET8: u16 = 133; // Sheet name, type and substream position
const MUL_RK: u16 = 189; // Run of RK numbers in one row
const XF: u16 = 224; // Cell format, referencing a number format
const SST: u16 = 252; // Shared string table
const LABEL_SST: u16 = 253; // Text cell referencing the shared string table
const NUMBER: u16 = 515; // Floating point cell
const LABEL: u16 = 516; // Text cell with the string inline
const BOOL_ERR: u16 = 517; // Boolean or error cell
const STRING: u16 = 519; // String result of the preceding formula
const ARRAY: u16 = 545; // Array formula, may precede STRING
const TABLE: u16 = 566; // Data table formula, may precede STRING
const RK: u16 = 638; // Compressed number cell
const SHARED_FORMULA: u16 = 1212; // Shared formula, may precede STRING
const FORMAT: u16 = 1054; // Custom number format
const BOF: u16 = 2057; // Start of a substream

/// `dt` of a BOUND_SHEET8 record naming a worksheet (not a chart or macro sheet).
const WORKSHEET: u8 = 0;

/// Streams of an Office Open XML workbook that was encrypted into a compound file.
const ENCRYPTION_STREAMS: [&str; 2] = ["EncryptionInfo", "EncryptedPackage"];

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// Workbook-wide data from the globals substream.
#[derive(Debug, Default)]
struct Globals {
    is_1904: bool,
    shared_strings: Vec<String>,
    /// Cell type of each XF index
    number_formats: Vec<CellType>,
    /// Stream position of the first worksheet's BOF record
    first_sheet: Option<usize>,
}

impl Globals {
    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }
}

/// Reads the first worksheet of the workbook held in `cfb`.
///
/// # Arguments
/// * `cfb` - The compound file the bytes were recognized as
/// * `config` - Supplies the null literals dropped from text cells
///
/// # Returns
/// * `Result<Table, SheetError>` - The first worksheet's bounding box, or
///   `Encrypted` for password-protected workbooks of either generation
pub(crate) fn read_first_sheet(cfb: &Cfb, config: &Config) -> Result<Table, SheetError> {
    if ENCRYPTION_STREAMS.iter().any(|name| cfb.exists(name)) {
        return Err(SpreadsheetError::Encrypted.into());
    }
    let stream = match cfb.read("Workbook")? {
        Some(stream) => stream,
        None => cfb
            .read("Book")?
            .ok_or_else(|| SpreadsheetError::MissingPart("Workbook".to_owned()))?,
    };
    let mut reader = Biff8Reader::new(stream);
    let globals = load_globals(&mut reader).with_prefix("Read workbook globals")?;
    let pointer = globals.first_sheet.ok_or(SpreadsheetError::NoSheets)?;
    tracing::debug!(
        pointer,
        formats = globals.number_formats.len(),
        shared_strings = globals.shared_strings.len(),
        "reading xls worksheet"
    );
    let grid = read_cells(&mut reader, pointer, &globals, config).with_prefix("Read worksheet")?;
    Ok(grid.into_table())
}

/// Walks the globals substream up to its EOF record.
///
/// Collects the date system, string encoding, number formats, shared
/// strings and the position of the first worksheet. A FILEPASS record means
/// the rest of the stream is encrypted.
fn load_globals(reader: &mut Biff8Reader) -> Result<Globals, SheetError> {
    let mut globals = Globals::default();
    let mut custom_formats = HashMap::<u16, CellType>::new();
    let mut format_ids = Vec::<u16>::new();
    match_biff8_record!(reader => {
        EOF => break,
        FILE_PASS => Err(SpreadsheetError::Encrypted)?,
        DATE1904 => globals.is_1904 = reader.read_u16()? == 1,
        CODE_PAGE => {
            let code_page = reader.read_u16()?;
            reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
        }
        FORMAT => {
            let id = reader.read_u16()?;
            let code = reader.read_xl_unicode_string()?;
            custom_formats.insert(id, CellType::from_format_code(&code));
        }
        XF => {
            reader.skip(2)?;
            format_ids.push(reader.read_u16()?);
        }
        SST => globals.shared_strings = load_shared_strings(reader)?,
        BOUND_SHEET8 => {
            let pointer = reader.read_usize()?;
            reader.skip(1)?;
            let sheet_type = reader.read_u8()?;
            let name = reader.read_short_xl_unicode_string()?;
            if globals.first_sheet.is_none() && sheet_type == WORKSHEET {
                tracing::debug!(sheet = %name, "found first xls worksheet");
                globals.first_sheet = Some(pointer);
            }
        }
    });
    globals.number_formats = format_ids
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .copied()
                .unwrap_or_else(|| CellType::from_builtin_format(id as usize))
        })
        .collect();
    Ok(globals)
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, SheetError> {
    let mut shared_strings = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// Reads the cell records of the worksheet substream starting at `pointer`.
///
/// # Arguments
/// * `reader` - Reader over the whole Workbook stream
/// * `pointer` - Stream position of the worksheet's BOF record
/// * `globals` - Formats and shared strings the cells refer to
/// * `config` - Null literals for the grid
///
/// # Returns
/// * `Result<Grid, SheetError>` - Every non-empty cell up to the substream's
///   EOF record
fn read_cells<'a>(
    reader: &mut Biff8Reader,
    pointer: usize,
    globals: &Globals,
    config: &'a Config,
) -> Result<Grid<'a>, SheetError> {
    let mut grid = Grid::new(config);
    reader.goto(pointer);
    reader.next()?;
    while let Some(tag) = reader.next()? {
        match tag {
            BOF | EOF => break,
            MUL_RK => {
                let row = reader.read_u16()? as usize;
                let first_col = reader.read_u16()? as usize;
                let last_col = reader.get_u16_back(2)? as usize;
                for col in first_col..=last_col {
                    let index = reader.read_u16()? as usize;
                    let number = reader.read_rk_number()?;
                    let cell = to_table_cell(globals.number_format(index), &number.to_string(), globals.is_1904);
                    grid.push(row, col, cell)?;
                }
            }
            BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                let row = reader.read_u16()? as usize;
                let col = reader.read_u16()? as usize;
                let (kind, value) = match tag {
                    BOOL_ERR => read_bool_or_error_cell(reader)?,
                    NUMBER => read_number_cell(reader, globals)?,
                    RK => read_rk_cell(reader, globals)?,
                    LABEL_SST => read_label_sst_cell(reader, globals)?,
                    LABEL => read_label_cell(reader)?,
                    _ => read_formula_cell(reader, globals)?,
                };
                grid.push(row, col, to_table_cell(kind, &value, globals.is_1904))?;
            }
            _ => (),
        }
    }
    Ok(grid)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), SheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    Ok(if is_error {
        (CellType::Error, String::new())
    } else {
        (CellType::Boolean, value.to_string())
    })
}

fn read_number_cell(reader: &mut Biff8Reader, globals: &Globals) -> Result<(CellType, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((globals.number_format(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader, globals: &Globals) -> Result<(CellType, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((globals.number_format(index), value.to_string()))
}

/// Resolves a LABELSST record against the shared string table.
fn read_label_sst_cell(reader: &mut Biff8Reader, globals: &Globals) -> Result<(CellType, String), SheetError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    let text = globals
        .shared_strings
        .get(index)
        .ok_or(SpreadsheetError::SharedStringOutOfRange(index))?;
    Ok((CellType::SharedString, text.to_owned()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), SheetError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((CellType::InlineString, value))
}

/// Reads the cached result of a FORMULA record.
///
/// The 8-byte result is a float unless its top two bytes are `FFFF`; then
/// its first byte tags a string (held in the following STRING record), a
/// boolean, an error or an empty string.
///
/// # Returns
/// * `Result<(CellType, String), SheetError>` - The result's type and raw
///   value, or `FormulaValueError` for an unknown tag or a missing STRING
fn read_formula_cell(reader: &mut Biff8Reader, globals: &Globals) -> Result<(CellType, String), SheetError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    match formula & 0xFF {
        _ if is_number => Ok((globals.number_format(index), f64::from_bits(formula).to_string())),
        0 => {
            while let Some(tag) = reader.next()? {
                match tag {
                    STRING => return Ok((CellType::InlineString, reader.read_xl_unicode_string()?)),
                    SHARED_FORMULA | ARRAY | TABLE => continue,
                    _ => break,
                }
            }
            Err(XlsError::FormulaValueError(formula))?
        }
        1 => {
            let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
            Ok((CellType::Boolean, value.to_owned()))
        }
        2 => Ok((CellType::Error, String::new())),
        3 => Ok((CellType::InlineString, String::new())),
        _ => Err(XlsError::FormulaValueError(formula))?,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::biff8::tests::compressed_string;
    use crate::helpers::biff8::tests::record;
    use crate::helpers::biff8::tests::unicode_string;
    use crate::helpers::compound_file_fixture;
    use crate::spreadsheet::reference::MAX_COLUMNS;
    use crate::table::Cell;
    use std::io::Cursor;

    fn bof(dt: u16) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[..2].copy_from_slice(&0x0600u16.to_le_bytes());
        data[2..4].copy_from_slice(&dt.to_le_bytes());
        record(BOF, &data)
    }

    fn cell(kind: u16, row: u16, col: u16, xf: u16, value: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        for field in [row, col, xf] {
            data.extend(field.to_le_bytes());
        }
        data.extend_from_slice(value);
        record(kind, &data)
    }

    fn formula(row: u16, col: u16, result: [u8; 8]) -> Vec<u8> {
        let mut value = result.to_vec();
        value.extend([0u8; 8]);
        cell(FORMULA, row, col, 0, &value)
    }

    fn xf(format: u16) -> Vec<u8> {
        let mut data = vec![0u8; 20];
        data[2..4].copy_from_slice(&format.to_le_bytes());
        record(XF, &data)
    }

    fn shared_strings(strings: &[Vec<u8>]) -> Vec<u8> {
        let mut data = (strings.len() as u32).to_le_bytes().to_vec();
        data.extend((strings.len() as u32).to_le_bytes());
        for string in strings {
            data.extend(string);
        }
        record(SST, &data)
    }

    /// Lays out a Workbook stream: the globals substream with one
    /// BOUND_SHEET8 record per sheet, then each sheet's substream.
    pub(crate) fn workbook_stream(globals: &[Vec<u8>], sheets: &[(&str, u8, Vec<u8>)]) -> Vec<u8> {
        let substreams: Vec<Vec<u8>> = sheets
            .iter()
            .map(|(_, _, cells)| {
                let mut substream = bof(0x0010);
                substream.extend_from_slice(cells);
                substream.extend(record(EOF, &[]));
                substream
            })
            .collect();
        let build = |pointers: &[u32]| {
            let mut stream = bof(0x0005);
            for global in globals {
                stream.extend_from_slice(global);
            }
            for ((name, sheet_type, _), pointer) in sheets.iter().zip(pointers) {
                let mut data = pointer.to_le_bytes().to_vec();
                data.extend([0, *sheet_type, name.len() as u8, 0]);
                data.extend(name.bytes());
                stream.extend(record(BOUND_SHEET8, &data));
            }
            stream.extend(record(EOF, &[]));
            stream
        };
        let mut position = build(vec![0u32; sheets.len()].as_slice()).len() as u32;
        let pointers: Vec<u32> = substreams
            .iter()
            .map(|substream| {
                let pointer = position;
                position += substream.len() as u32;
                pointer
            })
            .collect();
        let mut stream = build(pointers.as_slice());
        for substream in substreams {
            stream.extend(substream);
        }
        stream
    }

    fn workbook_globals() -> Vec<Vec<u8>> {
        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(compressed_string("yyyy\\-mm\\-dd"));
        vec![
            record(CODE_PAGE, &1200u16.to_le_bytes()),
            record(FORMAT, &format),
            xf(0),
            xf(164),
            shared_strings(&[
                compressed_string("Region"),
                unicode_string("東京"),
                compressed_string("NA"),
            ]),
        ]
    }

    pub(crate) fn workbook_fixture() -> Vec<u8> {
        let mut cells = Vec::new();
        cells.extend(cell(LABEL_SST, 0, 0, 0, &0u32.to_le_bytes()));
        cells.extend(cell(NUMBER, 0, 1, 0, &2.5f64.to_le_bytes()));
        cells.extend(cell(RK, 1, 0, 0, &((7u32 << 2) | 0x02).to_le_bytes()));
        cells.extend(cell(LABEL_SST, 1, 1, 0, &1u32.to_le_bytes()));
        cells.extend(cell(NUMBER, 1, 2, 1, &45292f64.to_le_bytes()));
        cells.extend(cell(BOOL_ERR, 2, 0, 0, &[1, 0]));
        cells.extend(cell(LABEL, 2, 1, 0, &unicode_string("café")));
        cells.extend(cell(BOOL_ERR, 2, 2, 0, &[0x2A, 1]));
        let mut mul_rk = Vec::new();
        for field in [3u16, 0] {
            mul_rk.extend(field.to_le_bytes());
        }
        for rk in [(7u32 << 2) | 0x02, 0x3FF8_0000] {
            mul_rk.extend(0u16.to_le_bytes());
            mul_rk.extend(rk.to_le_bytes());
        }
        mul_rk.extend(1u16.to_le_bytes());
        cells.extend(record(MUL_RK, &mul_rk));
        cells.extend(formula(3, 2, 10f64.to_le_bytes()));
        cells.extend(formula(4, 0, [0, 0, 0, 0, 0, 0, 0xFF, 0xFF]));
        cells.extend(record(STRING, &unicode_string("total")));
        cells.extend(cell(LABEL_SST, 4, 1, 0, &2u32.to_le_bytes()));
        cells.extend(formula(4, 2, [1, 0, 1, 0, 0, 0, 0xFF, 0xFF]));

        let other = cell(NUMBER, 0, 0, 0, &99f64.to_le_bytes());
        let stream = workbook_stream(
            &workbook_globals(),
            &[("Chart1", 2, Vec::new()), ("Data", WORKSHEET, cells), ("Other", WORKSHEET, other)],
        );
        compound_file_fixture(&[("Workbook", stream.as_slice())])
    }

    fn read(bytes: Vec<u8>) -> Result<Table, SheetError> {
        let cfb = Cfb::new(&mut Cursor::new(bytes))?;
        read_first_sheet(&cfb, &Config::default())
    }

    fn single_sheet(cells: Vec<u8>) -> Vec<u8> {
        let stream = workbook_stream(&workbook_globals(), &[("Data", WORKSHEET, cells)]);
        compound_file_fixture(&[("Workbook", stream.as_slice())])
    }

    #[test]
    fn reads_first_worksheet() {
        let table = read(workbook_fixture()).unwrap();
        assert_eq!(
            table.rows(),
            [
                vec![Cell::from("Region"), Cell::Number(2.5), Cell::Empty],
                vec![Cell::Number(7.0), Cell::from("東京"), Cell::from("2024-01-01")],
                vec![Cell::from("TRUE"), Cell::from("café"), Cell::Empty],
                vec![Cell::Number(7.0), Cell::Number(1.5), Cell::Number(10.0)],
                vec![Cell::from("total"), Cell::Empty, Cell::from("TRUE")],
            ]
        );
    }

    #[test]
    fn rejects_encrypted_workbooks() {
        let mut globals = workbook_globals();
        globals.insert(0, record(FILE_PASS, &[1, 0, 1, 0]));
        let stream = workbook_stream(&globals, &[("Data", WORKSHEET, Vec::new())]);
        let error = read(compound_file_fixture(&[("Workbook", stream.as_slice())])).unwrap_err();
        assert!(error.to_string().contains("Password-protected"));

        let bytes = compound_file_fixture(&[
            ("EncryptionInfo", [4u8, 0, 4, 0].as_slice()),
            ("EncryptedPackage", [0u8; 16].as_slice()),
        ]);
        let error = read(bytes).unwrap_err();
        assert!(matches!(error, SheetError::SpreadsheetError(SpreadsheetError::Encrypted)));
    }

    #[test]
    fn requires_a_workbook_stream_and_worksheet() {
        let error = read(compound_file_fixture(&[("WordDocument", b"text".as_slice())])).unwrap_err();
        assert!(matches!(error, SheetError::SpreadsheetError(SpreadsheetError::MissingPart(_))));

        let stream = workbook_stream(&workbook_globals(), &[("Chart1", 2, Vec::new())]);
        let error = read(compound_file_fixture(&[("Workbook", stream.as_slice())])).unwrap_err();
        assert!(matches!(error, SheetError::SpreadsheetError(SpreadsheetError::NoSheets)));
    }

    #[test]
    fn rejects_bad_cells() {
        let error = read(single_sheet(cell(LABEL_SST, 0, 0, 0, &9u32.to_le_bytes()))).unwrap_err();
        assert!(error.to_string().contains("Shared string index 9 out of range"));

        let wide = cell(NUMBER, 0, MAX_COLUMNS as u16, 0, &1f64.to_le_bytes());
        let error = read(single_sheet(wide)).unwrap_err();
        assert!(error.to_string().contains("outside the sheet limits"));

        let mut truncated = cell(NUMBER, 0, 0, 0, &1f64.to_le_bytes());
        truncated.truncate(truncated.len() - 4);
        truncated[2] -= 4;
        assert!(read(single_sheet(truncated)).is_err());

        let orphan = formula(0, 0, [0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        let error = read(single_sheet(orphan)).unwrap_err();
        assert!(error.to_string().contains("Invalid Formula value"));
    }
}
