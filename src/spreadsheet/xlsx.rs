//! Office Open XML workbooks (`.xlsx`, `.xlsm`): first worksheet only.

use crate::config::Config;
use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::to_table_cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELATIONSHIPS: &str = "xl/_rels/workbook.xml.rels";
const STYLES: &str = "xl/styles.xml";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_CELL_FORMATS: QName = QName(b"cellXfs");
const TAG_CELL_FORMAT: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_RUN: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Reads the first worksheet of the workbook held in `zip`.
///
/// # Arguments
/// * `zip` - The archive, already known to hold `xl/workbook.xml`
/// * `config` - Supplies the null literals dropped from text cells
///
/// # Returns
/// * `Result<Table, SheetError>` - The bounding box of the first worksheet's
///   non-empty cells; empty if it holds none
pub(crate) fn read_first_sheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    config: &Config,
) -> Result<Table, SheetError> {
    let (sheet_path, is_1904) = load_workbook(zip).with_prefix("Read workbook")?;
    let formats = load_cell_formats(zip).with_prefix("Read styles")?;
    let shared_strings = load_shared_strings(zip).with_prefix("Read shared strings")?;
    tracing::debug!(
        sheet = %sheet_path,
        formats = formats.len(),
        shared_strings = shared_strings.len(),
        "reading xlsx worksheet"
    );
    let grid = read_cells(zip, &sheet_path, &formats, &shared_strings, is_1904, config)
        .with_prefix(&format!("Read worksheet '{}'", sheet_path))?;
    Ok(grid.into_table())
}

/// Maps relationship ids to worksheet part paths.
///
/// Relationships without a `Type` are kept, since some producers omit it.
///
/// # Returns
/// * `Result<HashMap<String, String>, SheetError>` - Id to part path; empty
///   when the workbook has no relationships part
fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
) -> Result<HashMap<String, String>, SheetError> {
    let mut relationships = HashMap::new();
    let Some(mut reader) = zip.xml_reader(WORKBOOK_RELATIONSHIPS)? else {
        return Ok(relationships);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            let is_worksheet = kind.map_or(true, |kind| kind.ends_with("/worksheet"));
            if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                relationships.insert(id.into_owned(), to_part_path(&target));
            }
        }
    });
    Ok(relationships)
}

/// Finds the part path of the first worksheet and whether dates use the
/// 1904 system.
///
/// # Returns
/// * `Result<(String, bool), SheetError>` - The worksheet path and the
///   1904 flag, `MissingPart` without a workbook part, or `NoSheets` when the
///   first `<sheet>` resolves to no worksheet
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(String, bool), SheetError> {
    let relationships = load_relationships(zip)?;
    let mut reader = zip
        .xml_reader(WORKBOOK)?
        .ok_or_else(|| SpreadsheetError::MissingPart(WORKBOOK.to_owned()))?;
    let mut first_sheet = None::<String>;
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event
                .get_attribute_value("date1904")?
                .is_some_and(|value| value == "1" || value == "true");
        }
        Event::Start(event) if first_sheet.is_none() && event.name() == TAG_SHEET => {
            // The id attribute is namespaced (r:id) under varying prefixes
            for attribute in event.attributes() {
                let attribute = attribute?;
                if attribute.key.local_name().as_ref() == b"id" {
                    let id = attribute.unescape_value()?;
                    first_sheet = relationships.get(&*id).cloned();
                }
            }
        }
    });
    // Workbooks without relationships still name their first sheet sheet1.xml
    let path = first_sheet
        .or_else(|| relationships.is_empty().then(|| "xl/worksheets/sheet1.xml".to_owned()))
        .ok_or(SpreadsheetError::NoSheets)?;
    Ok((path, is_1904))
}

/// Reads the cell format table of styles.xml as one `CellType` per format
/// index.
///
/// Custom `numFmt` codes take precedence over the built-in ids they reuse.
///
/// # Returns
/// * `Result<Vec<CellType>, SheetError>` - Indexed by a cell's `s`
///   attribute; empty when the workbook carries no styles part
fn load_cell_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<CellType>, SheetError> {
    let Some(mut reader) = zip.xml_reader(STYLES)? else {
        return Ok(Vec::new());
    };
    let mut custom_formats = HashMap::<usize, CellType>::new();
    let mut format_ids = Vec::<usize>::new();
    let mut in_custom_formats = false;
    let mut in_cell_formats = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if event.name() == TAG_CELL_FORMATS => in_cell_formats = true,
        Event::End(event) if event.name() == TAG_CELL_FORMATS => in_cell_formats = false,
        Event::Start(event) if in_custom_formats && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<usize>("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let (Some(id), Some(code)) = (id, code) {
                custom_formats.insert(id, CellType::from_format_code(&code));
            }
        }
        Event::Start(event) if in_cell_formats && event.name() == TAG_CELL_FORMAT => {
            format_ids.push(event.parse_attribute_value::<usize>("numFmtId")?.unwrap_or(0));
        }
    });
    Ok(format_ids
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .copied()
                .unwrap_or_else(|| CellType::from_builtin_format(id))
        })
        .collect())
}

/// Reads the shared string table, one entry per `<si>` in document order.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, SheetError> {
    let mut shared_strings = Vec::new();
    let Some(mut reader) = zip.xml_reader(SHARED_STRINGS)? else {
        return Ok(shared_strings);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Walks the worksheet part and collects every non-empty cell.
///
/// Rows and cells without an `r` attribute follow the previous one. An `r`
/// that is present must be a valid reference within the sheet limits.
///
/// # Arguments
/// * `path` - Part path of the worksheet inside `zip`
/// * `formats` - Cell type of each style index, from [`load_cell_formats`]
/// * `shared_strings` - Targets of `t="s"` cells
/// * `is_1904` - Whether date serials count from 1904
/// * `config` - Null literals for the grid
///
/// # Returns
/// * `Result<Grid, SheetError>` - The collected cells, or
///   `InvalidReference` / `SharedStringOutOfRange` for a malformed sheet
fn read_cells<'a, RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
    formats: &[CellType],
    shared_strings: &[String],
    is_1904: bool,
    config: &'a Config,
) -> Result<Grid<'a>, SheetError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
    let mut grid = Grid::new(config);
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::Empty;
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            if let Some(number) = event.get_attribute_value("r")? {
                next_row = row_to_index(&number)
                    .ok_or_else(|| SpreadsheetError::InvalidReference(number.into_owned()))?;
            }
            next_col = 0;
        }
        Event::End(event) if event.name() == TAG_ROW => next_row = next_row.saturating_add(1),
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = match event.get_attribute_value("r")? {
                Some(reference) => reference_to_index(&reference)
                    .ok_or_else(|| SpreadsheetError::InvalidReference(reference.into_owned()))?,
                None => (next_row, next_col),
            };
            next_col = col.saturating_add(1);
            value.clear();
            kind = match event.get_attribute_value("t")?.as_deref() {
                Some("s") => CellType::SharedString,
                Some("inlineStr") | Some("str") => CellType::InlineString,
                Some("b") => CellType::Boolean,
                Some("d") => CellType::IsoDateTime,
                Some("e") => CellType::Error,
                _ => CellType::Number,
            };
            if kind == CellType::Number {
                if let Some(style) = event.parse_attribute_value::<usize>("s")? {
                    kind = formats.get(style).copied().unwrap_or(CellType::Number);
                }
            }
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = read_string(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = read_string(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            let cell = if kind == CellType::SharedString && !value.trim().is_empty() {
                let index = value.trim().parse::<usize>()?;
                let text = shared_strings
                    .get(index)
                    .ok_or(SpreadsheetError::SharedStringOutOfRange(index))?;
                to_table_cell(kind, text, is_1904)
            } else {
                to_table_cell(kind, &value, is_1904)
            };
            grid.push(row, col, cell)?;
            kind = CellType::Empty;
            value.clear();
        }
    });
    Ok(grid)
}

/// Collects the text up to the closing `end_tag`.
///
/// # Arguments
/// * `reader` - Positioned just after the start of `end_tag`
/// * `end_tag` - Element whose end stops the read (`si`, `is` or `v`)
/// * `all_text` - Keep every text node, as inside `<v>`; otherwise only
///   visible `<t>` runs count and phonetic runs are skipped
///
/// # Returns
/// * `Result<String, SheetError>` - The concatenated text with entities
///   resolved
fn read_string<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    all_text: bool,
) -> Result<String, SheetError> {
    let mut text = String::new();
    let mut in_phonetic = false;
    let mut in_text = all_text;
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_RUN => in_phonetic = true,
        Event::End(event) if event.name() == TAG_PHONETIC_RUN => in_phonetic = false,
        Event::Start(event) if !in_phonetic && event.name() == TAG_TEXT => in_text = true,
        Event::End(event) if !all_text && event.name() == TAG_TEXT => in_text = false,
        Event::Text(event) if in_text => text.push_bytes_text(&event)?,
        Event::CData(event) if in_text => text.push_str(&String::from_utf8_lossy(&event)),
        Event::GeneralRef(event) if in_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Resolves a relationship target to a part path inside the archive.
fn to_part_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::zip_fixture;
    use crate::table::Cell;
    use std::io::Cursor;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr date1904="false"/>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Other" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
  <cellStyleXfs count="1"><xf numFmtId="0"/></cellStyleXfs>
  <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="3"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>Region</t></si>
  <si><r><t>Nor</t></r><r><t>th</t></r></si>
  <si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si>
</sst>"#;

    const SHEET1_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="2">
      <c r="B2" t="s"><v>0</v></c>
      <c r="C2" t="inlineStr"><is><t>Sales &amp; Costs</t></is></c>
      <c r="D2" t="b"><v>1</v></c>
    </row>
    <row r="3">
      <c r="B3" t="s"><v>1</v></c>
      <c r="C3" s="2"><v>1200.5</v></c>
      <c r="D3" s="1"><v>45292</v></c>
      <c r="E3" t="e"><v>#N/A</v></c>
    </row>
    <row r="4">
      <c r="B4" t="s"><v>2</v></c>
      <c r="C4" t="str"><f>A1</f><v>formula text</v></c>
      <c r="D4"/>
    </row>
  </sheetData>
</worksheet>"#;

    const SHEET2_XML: &str = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>99</v></c></row></sheetData></worksheet>"#;

    pub(crate) fn workbook_fixture() -> Vec<u8> {
        zip_fixture(&[
            ("[Content_Types].xml", "<Types/>"),
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/styles.xml", STYLES_XML),
            ("xl/sharedStrings.xml", SHARED_STRINGS_XML),
            ("xl/worksheets/sheet1.xml", SHEET1_XML),
            ("xl/worksheets/sheet2.xml", SHEET2_XML),
        ])
    }

    #[test]
    fn reads_first_sheet_only() {
        let bytes = workbook_fixture();
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let table = read_first_sheet(&mut zip, &Config::default()).unwrap();

        // The error cell in column E is empty, so the box spans B2:D4
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 3);
        assert_eq!(
            table.rows()[0],
            vec![Cell::from("Region"), Cell::from("Sales & Costs"), Cell::from("TRUE")]
        );
        assert_eq!(
            table.rows()[1],
            vec![Cell::from("North"), Cell::Number(1200.5), Cell::from("2024-01-01")]
        );
        assert_eq!(
            table.rows()[2],
            vec![Cell::from("東京"), Cell::from("formula text"), Cell::Empty]
        );
    }

    #[test]
    fn cells_without_references() {
        let sheet = r#"<worksheet><sheetData>
            <row><c t="inlineStr"><is><t>a</t></is></c><c><v>1</v></c></row>
            <row><c t="inlineStr"><is><t>b</t></is></c><c><v>2</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = zip_fixture(&[
            ("xl/workbook.xml", r#"<workbook><sheets><sheet name="S" r:id="rId1"/></sheets></workbook>"#),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let table = read_first_sheet(&mut zip, &Config::default()).unwrap();
        assert_eq!(
            table.rows(),
            [
                vec![Cell::from("a"), Cell::Number(1.0)],
                vec![Cell::from("b"), Cell::Number(2.0)],
            ]
        );
    }

    #[test]
    fn missing_worksheet_part() {
        let bytes = zip_fixture(&[
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
        ]);
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let error = read_first_sheet(&mut zip, &Config::default()).unwrap_err();
        assert!(error.to_string().contains("xl/worksheets/sheet1.xml"));
    }

    fn read_sheet(sheet: &str) -> Result<Table, SheetError> {
        let bytes = zip_fixture(&[
            ("xl/workbook.xml", r#"<workbook><sheets><sheet name="S" r:id="rId1"/></sheets></workbook>"#),
            ("xl/sharedStrings.xml", r#"<sst><si><t>NA</t></si><si><t>x</t></si></sst>"#),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let mut zip = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        read_first_sheet(&mut zip, &Config::default())
    }

    #[test]
    fn rejects_references_past_sheet_limits() {
        let error = read_sheet(
            r#"<worksheet><sheetData><row><c r="AAAAAAAAAAAAAAAAAAAA1"><v>1</v></c></row></sheetData></worksheet>"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("Invalid cell reference 'AAAAAAAAAAAAAAAAAAAA1'"));

        let error = read_sheet(
            r#"<worksheet><sheetData><row>
                <c r="A1"><v>1</v></c><c r="A99999999999"><v>2</v></c>
            </row></sheetData></worksheet>"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("Invalid cell reference 'A99999999999'"));

        let error = read_sheet(
            r#"<worksheet><sheetData><row r="1048577"><c><v>1</v></c></row></sheetData></worksheet>"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("Invalid cell reference '1048577'"));
    }

    #[test]
    fn rejects_malformed_references() {
        for reference in ["", "B", "12", "1A", "B-3", "B3C"] {
            let sheet = format!(
                r#"<worksheet><sheetData><row><c r="{reference}"><v>1</v></c></row></sheetData></worksheet>"#
            );
            let error = read_sheet(&sheet).unwrap_err();
            assert!(error.to_string().contains("Invalid cell reference"), "{reference}: {error}");
        }
        let error = read_sheet(r#"<worksheet><sheetData><row r="x"><c><v>1</v></c></row></sheetData></worksheet>"#)
            .unwrap_err();
        assert!(error.to_string().contains("Invalid cell reference 'x'"));
    }

    #[test]
    fn bounding_box_larger_than_grid_limit() {
        let error = read_sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1"><v>1</v></c></row>
                <row r="1048576"><c r="XFD1048576"><v>2</v></c></row>
            </sheetData></worksheet>"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("Sheet spans more than"));
    }

    #[test]
    fn backwards_and_repeated_references() {
        let table = read_sheet(
            r#"<worksheet><sheetData>
                <row r="3"><c r="B3"><v>3</v></c><c r="A3"><v>4</v></c></row>
                <row r="1"><c r="A1"><v>1</v></c><c r="A1"><v>2</v></c></row>
            </sheetData></worksheet>"#,
        )
        .unwrap();
        assert_eq!(
            table.rows(),
            [
                vec![Cell::Number(2.0), Cell::Empty],
                vec![Cell::Empty, Cell::Empty],
                vec![Cell::Number(4.0), Cell::Number(3.0)],
            ]
        );
    }

    #[test]
    fn null_literals_read_as_empty() {
        let table = read_sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="inlineStr"><is><t>N/A</t></is></c><c r="B1" t="s"><v>1</v></c></row>
                <row r="2"><c r="A2" t="s"><v>0</v></c><c r="B2"><v>5</v></c></row>
            </sheetData></worksheet>"#,
        )
        .unwrap();
        // Both null texts drop out of the bounding box, leaving column B only
        assert_eq!(table.rows(), [vec![Cell::from("x")], vec![Cell::Number(5.0)]]);
    }

    #[test]
    fn part_paths() {
        assert_eq!(to_part_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_part_path("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(to_part_path("xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
    }
}
