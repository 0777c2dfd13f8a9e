// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Functions for writing `format` structures to a byte sink. Every typed
//! field goes through a `FixedWidthValue`, so an out of range value is caught
//! before any of its bytes reach the output.

use std::io::Write;

use crate::error::ElfResult;
use crate::value::{Endian, FixedWidthValue, Width};

/// Anything with a fixed size on-disk record.
pub trait Encode {
    /// Size of the encoded record in bytes.
    const SIZE: usize;

    /// Writes the record. Exactly `SIZE` bytes are written on success.
    fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()>;

    fn encode(&self) -> ElfResult<Vec<u8>> {
        let mut w = ElfWriter::new(Vec::with_capacity(Self::SIZE));
        self.encode_to(&mut w)?;
        Ok(w.into_inner())
    }
}

const ZEROES: [u8; 4096] = [0; 4096];

/// A byte sink that knows its target byte order and how many bytes have gone
/// through it.
pub struct ElfWriter<W> {
    back:          W,
    endian:        Endian,
    pos:           u64,
}

impl<W: Write> ElfWriter<W> {
    /// Creates a little-endian writer.
    pub fn new(back: W) -> ElfWriter<W> {
        ElfWriter::with_endian(back, Endian::Little)
    }

    pub fn with_endian(back: W, endian: Endian) -> ElfWriter<W> {
        ElfWriter {
            back:    back,
            endian:  endian,
            pos:     0,
        }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> W {
        self.back
    }

    pub fn write_value(&mut self, v: FixedWidthValue) -> ElfResult<()> {
        v.with_endian(self.endian).write_to(&mut self.back)?;
        self.pos += v.width().bytes() as u64;
        Ok(())
    }

    pub fn write_u8 (&mut self, v: u8)  -> ElfResult<()> { self.write_value(FixedWidthValue::byte(v)) }
    pub fn write_u16(&mut self, v: u16) -> ElfResult<()> { self.write_value(FixedWidthValue::half(v)) }
    pub fn write_u32(&mut self, v: u32) -> ElfResult<()> { self.write_value(FixedWidthValue::word(v)) }
    pub fn write_u64(&mut self, v: u64) -> ElfResult<()> { self.write_value(FixedWidthValue::xword(v)) }
    pub fn write_i32(&mut self, v: i32) -> ElfResult<()> { self.write_value(FixedWidthValue::sword(v)) }
    pub fn write_i64(&mut self, v: i64) -> ElfResult<()> { self.write_value(FixedWidthValue::sxword(v)) }

    /// Writes a count or index that is stored as `usize` in memory but must
    /// fit a narrower field on disk.
    pub fn write_count(&mut self, v: usize, width: Width) -> ElfResult<()> {
        self.write_value(FixedWidthValue::new(v as i128, width, false))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> ElfResult<()> {
        self.back.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// Zero fills up to the absolute offset `at`. Does nothing if the writer
    /// is already there or past it.
    pub fn pad_to(&mut self, at: u64) -> ElfResult<()> {
        while self.pos < at {
            let n = (at - self.pos).min(ZEROES.len() as u64) as usize;
            self.write_bytes(&ZEROES[..n])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElfErrorKind;

    #[test]
    fn test_position_tracks_writes() {
        let mut w = ElfWriter::new(Vec::new());
        w.write_u8(1).unwrap();
        w.write_u16(2).unwrap();
        w.write_u32(3).unwrap();
        w.write_u64(4).unwrap();
        w.write_bytes(b"abc").unwrap();
        assert_eq!(w.position(), 1 + 2 + 4 + 8 + 3);
        assert_eq!(w.into_inner().len(), 18);
    }

    #[test]
    fn test_pad_to() {
        let mut w = ElfWriter::new(Vec::new());
        w.write_u8(0xaa).unwrap();
        w.pad_to(8).unwrap();
        w.pad_to(4).unwrap();
        assert_eq!(w.into_inner(), vec![0xaa, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_pad_across_chunks() {
        let mut w = ElfWriter::new(Vec::new());
        w.write_u8(0xaa).unwrap();
        w.pad_to(10_000).unwrap();
        assert_eq!(w.position(), 10_000);

        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 10_000);
        assert!(bytes[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_count_overflow() {
        let mut w = ElfWriter::new(Vec::new());
        let e = w.write_count(0x10000, Width::Half).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::EncodingOverflow);
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn test_big_endian_writer() {
        let mut w = ElfWriter::with_endian(Vec::new(), Endian::Big);
        w.write_u16(0x0102).unwrap();
        w.write_i32(-2).unwrap();
        assert_eq!(w.into_inner(), vec![1, 2, 0xff, 0xff, 0xff, 0xfe]);
    }
}
