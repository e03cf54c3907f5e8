// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Big-endian cursor primitives shared by every frame in the protocol.
//!
//! All multi-byte integers travel most-significant-byte first. Strings are
//! u32-length-prefixed UTF-8; the length [`STRING_ABSENT`] encodes "no
//! string", which is distinct from an empty one.

use thiserror::Error;

/// Length prefix marking an absent (null) string field.
pub const STRING_ABSENT: u32 = 0x7fff_ffff;

/// Errors produced while decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The frame ended before the field did.
    #[error("[WIRE_TRUNCATED] needed {needed} more bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the current field still required.
        needed: usize,
        /// Bytes left in the frame.
        remaining: usize,
    },
    /// A string field held invalid UTF-8.
    #[error("[WIRE_BAD_UTF8] string field is not valid utf-8")]
    BadUtf8,
    /// Frame began with the wrong magic for its direction.
    #[error("[WIRE_BAD_MAGIC] got {got:#010x}, expected {expected:#010x}")]
    BadMagic {
        /// Magic found on the wire.
        got: u32,
        /// Magic this direction requires.
        expected: u32,
    },
    /// Opcode tag not in the catalog.
    #[error("[WIRE_UNKNOWN_OPCODE] opcode {0}")]
    UnknownOpcode(u8),
    /// Event code not in the catalog.
    #[error("[WIRE_UNKNOWN_EVENT] event code {0}")]
    UnknownEvent(u32),
    /// A discrete field held a value outside its catalog.
    #[error("[WIRE_BAD_VALUE] {field} = {value}")]
    BadValue {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
    },
    /// A string field was absent where the protocol requires one.
    #[error("[WIRE_MISSING_STRING] {0} is required")]
    MissingString(&'static str),
}

/// Sequential big-endian reader over a borrowed frame.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Wrap a byte slice; the cursor starts at offset zero.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left between the cursor and the end of the frame.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current cursor offset from the start of the frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read one unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a big-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian f64.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        let b = self.take(8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read `N` consecutive f32 values.
    pub fn read_f32s<const N: usize>(&mut self) -> Result<[f32; N], WireError> {
        let mut out = [0.0_f32; N];
        for slot in &mut out {
            *slot = self.read_f32()?;
        }
        Ok(out)
    }

    /// Read `N` consecutive f64 values.
    pub fn read_f64s<const N: usize>(&mut self) -> Result<[f64; N], WireError> {
        let mut out = [0.0_f64; N];
        for slot in &mut out {
            *slot = self.read_f64()?;
        }
        Ok(out)
    }

    /// Read a raw byte span of length `n`.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.take(n)
    }

    /// Read a length-prefixed string; the sentinel length decodes to `None`.
    pub fn read_string(&mut self) -> Result<Option<String>, WireError> {
        let len = self.read_u32()?;
        if len == STRING_ABSENT {
            return Ok(None);
        }
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(|s| Some(s.to_owned()))
            .map_err(|_| WireError::BadUtf8)
    }

    /// Read a string that the protocol does not allow to be absent.
    pub fn read_required_string(&mut self, field: &'static str) -> Result<String, WireError> {
        self.read_string()?.ok_or(WireError::MissingString(field))
    }
}

/// Append-only big-endian writer building one frame.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Start an empty frame.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Start an empty frame with `cap` bytes reserved.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a big-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian u64.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian f32.
    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian f64.
    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a raw byte span.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a length-prefixed string.
    #[allow(clippy::cast_possible_truncation)] // wire strings are far below 4GiB
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append a possibly-absent string (absent encodes as the sentinel).
    pub fn write_opt_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.write_string(s),
            None => self.write_u32(STRING_ABSENT),
        }
    }

    /// Finish the frame and hand back its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn integers_round_trip() {
        let mut w = WireWriter::new();
        w.write_u8(0xab);
        w.write_u16(0x1234);
        w.write_u32(0xdead_beef);
        w.write_u64(0x0102_0304_0506_0708);
        let bytes = w.into_bytes();
        assert_eq!(bytes, hex::decode("ab1234deadbeef0102030405060708").unwrap());

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn floats_round_trip() {
        let mut w = WireWriter::new();
        w.write_f32(1.5);
        w.write_f64(-0.25);
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -0.25);
    }

    #[test]
    fn f32_wire_bytes_are_big_endian() {
        let mut w = WireWriter::new();
        w.write_f32(1.0);
        assert_eq!(w.into_bytes(), hex::decode("3f800000").unwrap());
    }

    #[test]
    fn strings_round_trip() {
        let mut w = WireWriter::new();
        w.write_string("floor-grid");
        w.write_string("");
        w.write_opt_string(None);
        w.write_string("päivä");
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string().unwrap().as_deref(), Some("floor-grid"));
        assert_eq!(r.read_string().unwrap().as_deref(), Some(""));
        assert_eq!(r.read_string().unwrap(), None);
        assert_eq!(r.read_string().unwrap().as_deref(), Some("päivä"));
    }

    #[test]
    fn absent_sentinel_is_not_a_giant_string() {
        let mut w = WireWriter::new();
        w.write_u32(STRING_ABSENT);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), None);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn required_string_rejects_sentinel() {
        let mut w = WireWriter::new();
        w.write_opt_string(None);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(
            r.read_required_string("layer"),
            Err(WireError::MissingString("layer"))
        );
    }

    #[test]
    fn truncated_reads_error_out() {
        let mut r = WireReader::new(&[0x01, 0x02]);
        assert_eq!(
            r.read_u32(),
            Err(WireError::Truncated {
                needed: 4,
                remaining: 2
            })
        );
        // The failed read must not move the cursor.
        assert_eq!(r.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn oversized_string_length_is_truncation_not_allocation() {
        let mut w = WireWriter::new();
        w.write_u32(10_000);
        w.write_bytes(b"short");
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(
            r.read_string(),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut w = WireWriter::new();
        w.write_u32(2);
        w.write_bytes(&[0xff, 0xfe]);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string(), Err(WireError::BadUtf8));
    }

    #[test]
    fn fixed_arrays_round_trip() {
        let mut w = WireWriter::new();
        for v in [1.0_f32, 2.0, 3.0, 4.0] {
            w.write_f32(v);
        }
        for v in [9.0_f64, 8.0, 7.0] {
            w.write_f64(v);
        }
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_f32s::<4>().unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(r.read_f64s::<3>().unwrap(), [9.0, 8.0, 7.0]);
    }
}
