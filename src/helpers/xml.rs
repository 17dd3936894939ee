//! Streaming XML access for the spreadsheet container parts.
//! Wraps quick-xml with the reader settings the parts need and small helpers
//! for attributes and text content.

use crate::error::SheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading text and attributes of container parts.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    UnknownEntity(String),

    #[error("Invalid value '{value}' for attribute '{name}'")]
    InvalidAttributeValue { name: String, value: String },
}

/// Event reader that reuses one buffer across events.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader over `source`.
    ///
    /// Comment and end-name checks are off, empty elements are expanded into
    /// a start and an end event, and text is never trimmed so that cell
    /// values keep their spaces.
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // <c/> and <c></c> must look the same to the cell state machines
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event.
    ///
    /// # Returns
    /// * `Ok(Some(event))` - The next event, borrowing the shared buffer
    /// * `Ok(None)` - End of document
    /// * `Err` - The XML is malformed
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookup on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped value of the attribute `name`.
    ///
    /// # Arguments
    /// * `name` - Qualified attribute name, prefix included (`table:name`)
    ///
    /// # Returns
    /// * `Result<Option<Cow<str>>, SheetError>` - The value, None if the
    ///   attribute is absent, or an error for a malformed attribute
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError>;

    /// Value of the attribute `name` parsed as `T` after trimming.
    ///
    /// # Arguments
    /// * `name` - Qualified attribute name
    ///
    /// # Returns
    /// * `Result<Option<T>, SheetError>` - The parsed value, None if the
    ///   attribute is absent, or `InvalidAttributeValue` if it does not parse
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError> {
        match self.get_attribute_value(name)? {
            Some(value) => value.trim().parse().map(Some).map_err(|_| {
                XmlError::InvalidAttributeValue {
                    name: name.to_owned(),
                    value: value.to_string(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }
}

/// Accumulates character data from text and reference events.
pub(crate) trait XmlTextHelper {
    /// Appends the content of a text event, line endings normalized.
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), SheetError>;

    /// Appends the character a reference event stands for.
    ///
    /// Predefined entities and decimal or hex character references resolve;
    /// a code point that is no valid `char` is dropped.
    ///
    /// # Returns
    /// * `Result<(), SheetError>` - `UnknownEntity` for any other named
    ///   entity, or a number error for a malformed character reference
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetError>;
}

impl XmlTextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), SheetError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::UnknownEntity(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Loops over the events of an `XmlReader`, dispatching to the given match
/// arms; unmatched events are skipped and the loop ends at end of document.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::name::QName;

    fn read_text(xml: &str) -> Result<String, SheetError> {
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_bytes_text(&event)?,
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        Ok(text)
    }

    #[test]
    fn resolves_references() {
        assert_eq!(read_text("<t>a &amp; b &#65;&#x42;</t>").unwrap(), "a & b AB");
    }

    #[test]
    fn rejects_unknown_entity() {
        assert!(read_text("<t>&bogus;</t>").is_err());
    }

    #[test]
    fn reads_attributes() -> Result<(), SheetError> {
        let mut reader = XmlReader::new(r#"<row r="12" spans="x"/>"#.as_bytes());
        let mut seen = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"row") => {
                assert_eq!(event.parse_attribute_value::<usize>("r").unwrap(), Some(12));
                assert_eq!(event.get_attribute_value("missing").unwrap(), None);
                assert!(event.parse_attribute_value::<usize>("spans").is_err());
                seen = true;
            }
        });
        assert!(seen);
        Ok(())
    }
}
