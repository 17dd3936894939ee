//! OpenDocument spreadsheets (`.ods`): first table only.

use crate::config::Config;
use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::to_table_cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

pub(crate) const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
const CONTENT: &str = "content.xml";
const MANIFEST: &str = "META-INF/manifest.xml";

const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
const COVERED_TABLE_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
const SPACE: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");
const MANIFEST_ENCRYPTION: QName = QName(b"manifest:encryption-data");

/// Longest run of spaces a single `<text:s>` may expand to.
const MAX_SPACE_RUN: usize = 1 << 16;

/// Returns true if the archive's `mimetype` part names an ODS document.
///
/// # Returns
/// * `Result<bool, SheetError>` - False when there is no `mimetype` part or
///   it names another OpenDocument type
pub(crate) fn is_ods<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, SheetError> {
    let Some(mut part) = zip.part("mimetype")? else {
        return Ok(false);
    };
    let mut mime = String::new();
    part.read_to_string(&mut mime)?;
    Ok(mime.trim() == MIME_TYPE)
}

/// Reads the first table of the document held in `zip`.
///
/// # Arguments
/// * `zip` - The archive, already recognized by [`is_ods`]
/// * `config` - Supplies the null literals dropped from text cells
///
/// # Returns
/// * `Result<Table, SheetError>` - The bounding box of the first table's
///   non-empty cells, or `Encrypted` if the manifest declares encryption
pub(crate) fn read_first_sheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    config: &Config,
) -> Result<Table, SheetError> {
    if is_encrypted(zip).with_prefix("Read manifest")? {
        return Err(SpreadsheetError::Encrypted.into());
    }
    let grid = read_cells(zip, config).with_prefix("Read content")?;
    Ok(grid.into_table())
}

/// Returns true if the manifest declares encryption data for any entry.
fn is_encrypted<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, SheetError> {
    let Some(mut reader) = zip.xml_reader(MANIFEST)? else {
        return Ok(false);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == MANIFEST_ENCRYPTION => return Ok(true),
    });
    Ok(false)
}

/// Walks content.xml up to the end of the first table, expanding repeated
/// rows and columns of non-empty cells.
///
/// Repeats of empty cells only advance the position, so the trailing
/// padding producers write out to the sheet limits costs nothing. A
/// repeated non-empty cell reaching past the limits is an error.
///
/// # Returns
/// * `Result<Grid, SheetError>` - The collected cells, or `CellOutOfRange` /
///   `SheetTooLarge` when repeats blow up the sheet
fn read_cells<'a, RS: Read + Seek>(zip: &mut ZipArchive<RS>, config: &'a Config) -> Result<Grid<'a>, SheetError> {
    let mut reader = zip
        .xml_reader(CONTENT)?
        .ok_or_else(|| SpreadsheetError::MissingPart(CONTENT.to_owned()))?;
    let mut grid = Grid::new(config);
    let mut in_table = false;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut rows_repeated = 1usize;
    let mut cols_repeated = 1usize;
    let mut kind = CellType::Empty;
    let mut value = String::new();
    let mut in_text = false;
    let mut in_annotation = false;
    let mut paragraphs = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if !in_table && event.name() == TABLE => {
            tracing::debug!(
                name = %event.get_attribute_value("table:name")?.unwrap_or_default(),
                "reading ods table"
            );
            in_table = true;
        }
        Event::End(event) if in_table && event.name() == TABLE => break,
        Event::Start(event) if in_table && event.name() == TABLE_ROW => {
            rows_repeated = event
                .parse_attribute_value::<usize>("table:number-rows-repeated")?
                .unwrap_or(1)
                .max(1);
            col = 0;
        }
        Event::End(event) if in_table && event.name() == TABLE_ROW => row = row.saturating_add(rows_repeated),
        Event::Start(event) if in_table && (event.name() == TABLE_CELL || event.name() == COVERED_TABLE_CELL) => {
            cols_repeated = event
                .parse_attribute_value::<usize>("table:number-columns-repeated")?
                .unwrap_or(1)
                .max(1);
            value.clear();
            paragraphs = 0;
            in_text = false;
            let is_error = event
                .get_attribute_value("calcext:value-type")?
                .is_some_and(|value_type| value_type == "error");
            kind = match event.get_attribute_value("office:value-type")?.as_deref() {
                _ if is_error => CellType::Error,
                Some("boolean") => CellType::Boolean,
                Some("date") => CellType::IsoDateTime,
                Some("time") => CellType::IsoDuration,
                Some("string") => CellType::InlineString,
                Some(_) => CellType::Number,
                None => CellType::Empty,
            };
            let attribute = match kind {
                CellType::Boolean => Some("office:boolean-value"),
                CellType::IsoDateTime => Some("office:date-value"),
                CellType::IsoDuration => Some("office:time-value"),
                CellType::Number => Some("office:value"),
                _ => None,
            };
            if let Some(attribute) = attribute {
                if let Some(data) = event.get_attribute_value(attribute)? {
                    value.push_str(&data);
                }
            }
            // Older producers keep string content in office:string-value
            if kind == CellType::InlineString {
                if let Some(data) = event.get_attribute_value("office:string-value")? {
                    value.push_str(&data);
                    kind = CellType::SharedString;
                }
            }
        }
        Event::End(event) if in_table && (event.name() == TABLE_CELL || event.name() == COVERED_TABLE_CELL) => {
            let cell = to_table_cell(kind, &value, false);
            grid.push_repeated(row, col, rows_repeated, cols_repeated, cell)?;
            col = col.saturating_add(cols_repeated);
            kind = CellType::Empty;
            in_text = false;
        }
        Event::Start(event) if kind == CellType::InlineString && event.name() == ANNOTATION => in_annotation = true,
        Event::End(event) if in_annotation && event.name() == ANNOTATION => in_annotation = false,
        Event::Start(event) if kind == CellType::InlineString && !in_annotation && event.name() == PARAGRAPH => {
            if paragraphs > 0 {
                value.push('\n');
            }
            paragraphs += 1;
            in_text = true;
        }
        Event::End(event) if in_text && event.name() == PARAGRAPH => in_text = false,
        Event::Start(event) if in_text && event.name() == SPACE => {
            let count = event.parse_attribute_value::<usize>("text:c")?.unwrap_or(1).min(MAX_SPACE_RUN);
            value.extend(std::iter::repeat(' ').take(count));
        }
        Event::Start(event) if in_text && event.name() == TAB => value.push('\t'),
        Event::Start(event) if in_text && event.name() == LINE_BREAK => value.push('\n'),
        Event::Text(event) if in_text => value.push_bytes_text(&event)?,
        Event::GeneralRef(event) if in_text => value.push_bytes_ref(&event)?,
    });
    Ok(grid)
}
