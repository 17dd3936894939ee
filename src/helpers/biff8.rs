//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Record reader for the Workbook stream of Excel 97-2003 (.xls) files.
//! Record data split over CONTINUE records is read as one logical record.

use crate::error::SheetError;
use crate::helpers::bytes::to_u16;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader over the records of a BIFF8 stream.
pub(crate) struct Biff8Reader {
    /// Encoding of 8-bit strings, from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    /// Next record header position in buffer
    pointer: usize,
    /// Data ranges (start, end) of the current record and its continuations
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Moves to the next record and returns its type.
    ///
    /// # Returns
    /// * `Ok(Some(kind))` - The record type; its data is read with the
    ///   `read_*` methods
    /// * `Ok(None)` - No complete record header is left
    pub(crate) fn next(&mut self) -> Result<Option<u16>, SheetError> {
        if self.pointer.saturating_add(4) > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    /// Records the data range of the record header at `pointer`, clamped to
    /// the end of the stream.
    fn push_chunk(&mut self) -> Result<(), SheetError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        self.pointer = lower + size;
        self.chunks.push((lower, upper));
        Ok(())
    }

    /// Positions the reader at the record header at `pointer`.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// Reads exactly `length` bytes, returning an error if insufficient data
    fn read_extract(&mut self, length: usize) -> Result<&[u8], SheetError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes without crossing into the next chunk.
    /// Returns the data slice and actual number of bytes read
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some(&(lower, upper)) = self.chunks.get(self.index) {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source.saturating_add(length));
            let size = target - source;
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SheetError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_extract(N)?);
        Ok(array)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), SheetError> {
        self.read_extract(length).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SheetError> {
        self.read_array::<1>().map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SheetError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SheetError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, SheetError> {
        self.read_u32().map(|value| value as usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SheetError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, SheetError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Gets a 16-bit unsigned integer `offset` bytes before the end of the
    /// current record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, SheetError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, SheetError> {
        if index.saturating_add(2) <= self.buffer.len() {
            Ok(to_u16(&self.buffer, index))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Reads an RK number, the compressed form Excel uses for integers and
    /// floats with a truncated mantissa.
    ///
    /// # Returns
    /// * `Result<f64, SheetError>` - The decoded value, already divided by
    ///   100 when the RK value carries the percentage flag
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, SheetError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value >> 2) as u64) << 34)
        };
        Ok(if is_percentage { number / 100.0 } else { number })
    }

    /// Reads a short Unicode string (1-byte length prefix)
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, SheetError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a Unicode string (2-byte length prefix)
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, SheetError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a shared-string-table entry, which may carry rich text runs and
    /// phonetic data and may continue into the next CONTINUE record.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, SheetError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            // A continued string restarts with its own flags byte
            actual = self.read_string_into(expected, false, &mut string)?;
        }
        Ok(string)
    }

    /// Appends up to `chars` characters to `content` and returns how many
    /// were read before the end of the current chunk.
    fn read_string_into(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<usize, SheetError> {
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let expected = if is_high_byte { chars << 1 } else { chars };
        let rich_string_count = if is_extend && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_count = if is_extend && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let encoding = self.encoding;
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _) = UTF_16LE.decode_without_bom_handling(bytes);
            content.push_str(&string);
        } else if encoding == UTF_16LE {
            // Compressed UTF-16: each byte is the low half of a code unit
            content.extend(bytes.iter().map(|byte| *byte as char));
        } else {
            let (string, _) = encoding.decode_without_bom_handling(bytes);
            content.push_str(&string);
        }
        // Skip rgRun
        self.skip(4 * rich_string_count)?;
        // Skip ExtRst
        self.skip(phonetic_count)?;
        Ok(if is_high_byte { actual >> 1 } else { actual })
    }
}

/// Loops over the records of a `Biff8Reader`, dispatching on the record type;
/// unmatched records are skipped and the loop ends with the stream.
#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
