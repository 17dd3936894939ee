use crate::config::Config;
use crate::error::SheetError;
use crate::helpers::decode::decode_text;
use crate::pipeline::text::parse_text;
use crate::pipeline::Source;
use crate::spreadsheet;
use crate::table::Table;

/// Converts raw input into an untyped table with no header row.
///
/// Returns `Ok(None)` when there is nothing to process: blank input, a sheet
/// without values, or text that yields no rows.
pub fn parse(source: Source<'_>, config: &Config) -> Result<Option<Table>, SheetError> {
    match source {
        Source::Spreadsheet(bytes) => spreadsheet::read_first_sheet(bytes, config),
        Source::Text(text) => parse_text(text, config),
        Source::TextBytes(bytes) => {
            let (text, encoding) = decode_text(bytes);
            tracing::debug!(encoding = encoding.name(), "decoded text input");
            parse_text(&text, config)
        }
    }
}
