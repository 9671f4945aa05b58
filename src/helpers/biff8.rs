//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Record reader for the `Workbook` stream of Excel 97-2003 (.xls) files,
//! transparently joining CONTINUE records onto the record they extend

use crate::error::InventoryError;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub(crate) enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader for BIFF8 records
pub(crate) struct Biff8Reader {
    buffer: Vec<u8>,
    pointer: usize,              // Next record position in buffer
    chunks: Vec<(usize, usize)>, // Current record chunks (start, end)
    index: usize,                // Current chunk index
    offset: usize,               // Offset within current chunk
}

impl Biff8Reader {
    /// Creates a new BIFF8 reader over a workbook stream
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Reads the next record type and prepares for reading record data.
    /// Returns None when no more records are available
    pub(crate) fn next(&mut self) -> Result<Option<u16>, InventoryError> {
        if self.pointer + 4 <= self.buffer.len() {
            self.index = 0;
            self.offset = 0;
            self.chunks.clear();

            let kind = self.get_u16_at(self.pointer)?;
            self.push_chunk()?;
            while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
                self.push_chunk()?;
            }

            Ok(Some(kind))
        } else {
            Ok(None)
        }
    }

    /// Registers the record body at the current pointer and moves past it
    fn push_chunk(&mut self) -> Result<(), InventoryError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        self.pointer = lower + size;
        self.chunks.push((lower, upper));
        Ok(())
    }

    /// Moves the reader to the record at a stream offset
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Reads exactly `length` bytes, returning an error if insufficient data
    fn read_exact(&mut self, length: usize) -> Result<&[u8], InventoryError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes from the current chunk of the record.
    /// Returns the data slice and actual number of bytes read
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            let size = target - source;
            if target == upper {
                self.index += 1;
                self.offset = 0;
            } else {
                self.offset += size;
            }
            return (&self.buffer[source..target], size);
        }
        (&[], 0)
    }

    /// Skips `length` bytes
    pub(crate) fn skip(&mut self, length: usize) -> Result<(), InventoryError> {
        let mut remaining = length;
        while remaining > 0 {
            let (_, size) = self.read(remaining);
            if size == 0 && self.index >= self.chunks.len() {
                Err(Biff8Error::NoEnoughDataError(length))?
            }
            remaining -= size;
        }
        Ok(())
    }

    /// Reads a single byte
    pub(crate) fn read_u8(&mut self) -> Result<u8, InventoryError> {
        self.read_exact(1).map(|data| data[0])
    }

    /// Reads a 16-bit unsigned integer
    pub(crate) fn read_u16(&mut self) -> Result<u16, InventoryError> {
        self.read_exact(2).map(to_u16)
    }

    /// Gets a 16-bit unsigned integer located `offset` bytes before the end of the record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, InventoryError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    /// Gets a 16-bit unsigned integer from an absolute stream position
    fn get_u16_at(&self, index: usize) -> Result<u16, InventoryError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Reads a 32-bit unsigned integer
    pub(crate) fn read_u32(&mut self) -> Result<u32, InventoryError> {
        self.read_exact(4).map(to_u32)
    }

    /// Reads a usize value stored as 32 bits
    pub(crate) fn read_usize(&mut self) -> Result<usize, InventoryError> {
        self.read_exact(4).map(to_usize)
    }

    /// Reads a 64-bit unsigned integer
    pub(crate) fn read_u64(&mut self) -> Result<u64, InventoryError> {
        self.read_exact(8).map(to_u64)
    }

    /// Reads a 64-bit floating point number
    pub(crate) fn read_f64(&mut self) -> Result<f64, InventoryError> {
        self.read_exact(8).map(to_f64)
    }

    /// Reads an RK number (compressed numeric format).
    /// RK numbers store either a 30-bit integer or the high bits of a double,
    /// optionally scaled by 100
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, InventoryError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let mut number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
        };
        if is_percentage {
            number /= 100.0;
        }
        Ok(number)
    }

    /// Reads a short Unicode string (1-byte length prefix)
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, InventoryError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a Unicode string (2-byte length prefix)
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, InventoryError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a rich extended Unicode string (shared string table entries).
    /// A string split by a CONTINUE record restarts with a fresh option byte
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, InventoryError> {
        let mut string = String::new();
        let expected = self.read_u16()? as usize;
        let (mut actual, trailer) = self.read_string_part(expected, true, &mut string)?;
        while actual < expected {
            let (more, _) = self.read_string_part(expected - actual, false, &mut string)?;
            if more == 0 {
                Err(Biff8Error::NoEnoughDataError(expected - actual))?
            }
            actual += more;
        }
        self.skip(trailer.0)?;
        self.skip(trailer.1)?;
        Ok(string)
    }

    /// Reads a complete string, including any run and phonetic trailers
    fn read_string_into(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<usize, InventoryError> {
        let (actual, (runs, phonetic)) = self.read_string_part(chars, is_extend, content)?;
        self.skip(runs)?;
        self.skip(phonetic)?;
        Ok(actual)
    }

    /// Reads as many characters as the current chunk holds.
    /// Returns the characters read and the byte sizes of the run and phonetic
    /// trailers that follow the complete string
    fn read_string_part(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<(usize, (usize, usize)), InventoryError> {
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let runs = if is_extend && (flag & 0x8) > 0 {
            4 * self.read_u16()? as usize
        } else {
            0
        };
        let phonetic = if is_extend && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let expected = if is_high_byte { chars << 1 } else { chars };
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _) = UTF_16LE.decode_without_bom_handling(bytes);
            content.push_str(&string);
        } else {
            content.extend(bytes.iter().map(|byte| *byte as char));
        }
        let actual = if is_high_byte { actual >> 1 } else { actual };
        Ok((actual, (runs, phonetic)))
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn reads_records_and_strings() {
        let mut body = vec![5, 0, 0];
        body.extend_from_slice(b"hosts");
        let mut data = record(0x0204, &body);
        data.extend(record(0x000A, &[]));

        let mut reader = Biff8Reader::new(data);
        assert_eq!(reader.next().ok().flatten(), Some(0x0204));
        assert_eq!(reader.read_xl_unicode_string().ok().as_deref(), Some("hosts"));
        assert_eq!(reader.next().ok().flatten(), Some(0x000A));
        assert_eq!(reader.next().ok().flatten(), None);
    }

    #[test]
    fn decodes_high_byte_strings() {
        let mut body = vec![4, 0, 1];
        for unit in "db\u{e9}1".encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        let mut reader = Biff8Reader::new(record(0x0204, &body));
        assert_eq!(reader.next().ok().flatten(), Some(0x0204));
        assert_eq!(reader.read_xl_unicode_string().ok().as_deref(), Some("db\u{e9}1"));
    }

    #[test]
    fn joins_continue_records() {
        let mut first = vec![5, 0, 0];
        first.extend_from_slice(b"web");
        let mut second = vec![0];
        second.extend_from_slice(b"01");
        let mut data = record(0x00FC, &first);
        data.extend(record(CONTINUE, &second));

        let mut reader = Biff8Reader::new(data);
        assert_eq!(reader.next().ok().flatten(), Some(0x00FC));
        assert_eq!(reader.read_xl_unicode_rich_extended_string().ok().as_deref(), Some("web01"));
    }

    #[test]
    fn decodes_rk_numbers() {
        let integer = (402u32 << 2) | 0x02;
        let mut reader = Biff8Reader::new(record(0x027E, &integer.to_le_bytes()));
        assert_eq!(reader.next().ok().flatten(), Some(0x027E));
        assert_eq!(reader.read_rk_number().ok(), Some(402.0));
    }

    #[test]
    fn short_records_are_errors() {
        let mut reader = Biff8Reader::new(record(0x0203, &[1, 2]));
        assert_eq!(reader.next().ok().flatten(), Some(0x0203));
        assert!(reader.read_f64().is_err());
    }
}
