//! Cursor-based binary codec.
//!
//! All multi-byte values are little-endian. Variable-length values carry an
//! `i32` length prefix:
//!
//! | Type    | Encoding                                         |
//! |---------|--------------------------------------------------|
//! | `u8`    | 1 byte                                           |
//! | `bool`  | 1 byte, non-zero reads as `true`                 |
//! | `i32`   | 4 bytes                                          |
//! | string  | `i32` count of UTF-16 code units, 2 bytes each   |
//! | bytes   | `i32` byte count, then the raw bytes             |
//!
//! Writers never grow the buffer: a value that does not fit is an error and
//! the cursor is left where it was.

use crate::ProtocolError;

/// Writes values into a fixed-size buffer, advancing a cursor.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn reserve(&mut self, needed: usize) -> Result<&mut [u8], ProtocolError> {
        let remaining = self.buf.len() - self.pos;
        if needed > remaining {
            return Err(ProtocolError::BufferOverflow { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&mut self.buf[start..start + needed])
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.write_u8(u8::from(value))
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a UTF-16 string. The empty string is a bare zero count.
    pub fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        let units = value.encode_utf16().count();
        let needed = 4 + units * 2;
        let remaining = self.buf.len() - self.pos;
        if needed > remaining {
            return Err(ProtocolError::BufferOverflow { needed, remaining });
        }
        let count = i32::try_from(units).map_err(|_| {
            ProtocolError::BufferOverflow { needed, remaining }
        })?;
        self.write_i32(count)?;
        for unit in value.encode_utf16() {
            self.reserve(2)?.copy_from_slice(&unit.to_le_bytes());
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        let needed = 4 + value.len();
        let remaining = self.buf.len() - self.pos;
        if needed > remaining {
            return Err(ProtocolError::BufferOverflow { needed, remaining });
        }
        let len = i32::try_from(value.len()).map_err(|_| {
            ProtocolError::BufferOverflow { needed, remaining }
        })?;
        self.write_i32(len)?;
        self.reserve(value.len())?.copy_from_slice(value);
        Ok(())
    }
}

/// Reads values out of a byte slice, advancing a cursor.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::UnexpectedEof { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&self.buf[start..start + needed])
    }

    fn take_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let units = self.take_len()?;
        let raw = self.take(units.saturating_mul(2))?;
        let code_units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&code_units).map_err(|_| ProtocolError::InvalidString)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.take_len()?;
        Ok(self.take(len)?.to_vec())
    }
}
