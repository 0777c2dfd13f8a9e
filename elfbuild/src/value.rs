// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Fixed width integers, the primitive every ELF structure is made of.
//!
//! A `FixedWidthValue` remembers how wide its field is on disk, whether the
//! field is signed, and which byte order to write it in. The numeric value is
//! kept in an `i128` so that every 64-bit signed and unsigned value can be
//! represented and range checked against its field before anything is
//! written. Values that do not fit are an error, never silently truncated.

use std::hash::{Hash, Hasher};
use std::io;
use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{ElfError, ElfErrorKind, ElfResult};

/// Width of a field on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Half,
    Word,
    XWord,
}

impl Width {
    /// Number of bytes a field of this width occupies.
    pub fn bytes(self) -> usize {
        match self {
            Width::Byte  => 1,
            Width::Half  => 2,
            Width::Word  => 4,
            Width::XWord => 8,
        }
    }

    fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// Byte order of an encoded value. Images built by this crate are always
/// little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
pub struct FixedWidthValue {
    value:         i128,
    width:         Width,
    signed:        bool,
    endian:        Endian,
}

impl FixedWidthValue {
    /// Creates a little-endian value. Range is not checked until the value
    /// is encoded, see `check`.
    pub fn new(value: i128, width: Width, signed: bool) -> FixedWidthValue {
        FixedWidthValue {
            value:   value,
            width:   width,
            signed:  signed,
            endian:  Endian::Little,
        }
    }

    pub fn unsigned(value: u64, width: Width) -> FixedWidthValue {
        FixedWidthValue::new(value as i128, width, false)
    }

    pub fn signed(value: i64, width: Width) -> FixedWidthValue {
        FixedWidthValue::new(value as i128, width, true)
    }

    pub fn byte(value: u8) -> FixedWidthValue {
        FixedWidthValue::unsigned(value as u64, Width::Byte)
    }

    /// `Elf64_Half`
    pub fn half(value: u16) -> FixedWidthValue {
        FixedWidthValue::unsigned(value as u64, Width::Half)
    }

    /// `Elf64_Word`
    pub fn word(value: u32) -> FixedWidthValue {
        FixedWidthValue::unsigned(value as u64, Width::Word)
    }

    /// `Elf64_Sword`
    pub fn sword(value: i32) -> FixedWidthValue {
        FixedWidthValue::signed(value as i64, Width::Word)
    }

    /// `Elf64_Xword`
    pub fn xword(value: u64) -> FixedWidthValue {
        FixedWidthValue::unsigned(value, Width::XWord)
    }

    /// `Elf64_Sxword`
    pub fn sxword(value: i64) -> FixedWidthValue {
        FixedWidthValue::signed(value, Width::XWord)
    }

    /// `Elf64_Addr`
    pub fn addr(value: u64) -> FixedWidthValue {
        FixedWidthValue::unsigned(value, Width::XWord)
    }

    /// `Elf64_Off`
    pub fn off(value: u64) -> FixedWidthValue {
        FixedWidthValue::unsigned(value, Width::XWord)
    }

    pub fn with_endian(mut self, endian: Endian) -> FixedWidthValue {
        self.endian = endian;
        self
    }

    pub fn value(&self) -> i128 { self.value }
    pub fn width(&self) -> Width { self.width }
    pub fn is_signed(&self) -> bool { self.signed }
    pub fn endian(&self) -> Endian { self.endian }

    /// Smallest value representable in this field.
    pub fn min(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.width.bits() - 1))
        } else {
            0
        }
    }

    /// Largest value representable in this field.
    pub fn max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.width.bits() - 1)) - 1
        } else {
            (1i128 << self.width.bits()) - 1
        }
    }

    /// Fails with `EncodingOverflow` if the value is outside `min()..=max()`.
    pub fn check(&self) -> ElfResult<()> {
        if self.value < self.min() || self.value > self.max() {
            return Err(ElfError::new(
                ElfErrorKind::EncodingOverflow,
                "value does not fit field width",
            ).with_detail(format!(
                "{} is outside {}..={} for a {}-byte {} field",
                self.value, self.min(), self.max(), self.width.bytes(),
                if self.signed { "signed" } else { "unsigned" },
            )));
        }

        Ok(())
    }

    /// Writes exactly `width` bytes to the given output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> ElfResult<()> {
        self.check()?;

        match self.endian {
            Endian::Little => self.put::<LittleEndian, W>(w)?,
            Endian::Big    => self.put::<BigEndian, W>(w)?,
        }

        Ok(())
    }

    pub fn encode(&self) -> ElfResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.width.bytes());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Inverse of `encode`. `bytes` must be exactly `width` bytes long.
    pub fn decode(bytes: &[u8], width: Width, signed: bool, endian: Endian)
        -> ElfResult<FixedWidthValue> {
        if bytes.len() != width.bytes() {
            return Err(ElfError::new(
                ElfErrorKind::InvalidLength,
                "wrong number of bytes for field width",
            ).with_detail(format!(
                "expected {}, got {}", width.bytes(), bytes.len(),
            )));
        }

        let value = match endian {
            Endian::Little => FixedWidthValue::get::<LittleEndian>(bytes, width, signed),
            Endian::Big    => FixedWidthValue::get::<BigEndian>(bytes, width, signed),
        };

        Ok(FixedWidthValue::new(value, width, signed).with_endian(endian))
    }

    // range has already been checked, so the `as` casts only drop sign
    // extension bits.
    fn put<B: ByteOrder, W: Write>(&self, w: &mut W) -> io::Result<()> {
        let v = self.value;

        match (self.width, self.signed) {
            (Width::Byte,  false) => w.write_u8(v as u8),
            (Width::Byte,  true)  => w.write_i8(v as i8),
            (Width::Half,  false) => w.write_u16::<B>(v as u16),
            (Width::Half,  true)  => w.write_i16::<B>(v as i16),
            (Width::Word,  false) => w.write_u32::<B>(v as u32),
            (Width::Word,  true)  => w.write_i32::<B>(v as i32),
            (Width::XWord, false) => w.write_u64::<B>(v as u64),
            (Width::XWord, true)  => w.write_i64::<B>(v as i64),
        }
    }

    fn get<B: ByteOrder>(bytes: &[u8], width: Width, signed: bool) -> i128 {
        match (width, signed) {
            (Width::Byte,  false) => bytes[0] as i128,
            (Width::Byte,  true)  => bytes[0] as i8 as i128,
            (Width::Half,  false) => B::read_u16(bytes) as i128,
            (Width::Half,  true)  => B::read_i16(bytes) as i128,
            (Width::Word,  false) => B::read_u32(bytes) as i128,
            (Width::Word,  true)  => B::read_i32(bytes) as i128,
            (Width::XWord, false) => B::read_u64(bytes) as i128,
            (Width::XWord, true)  => B::read_i64(bytes) as i128,
        }
    }
}

/// Values compare by number only. Width, signedness and byte order are
/// representation details.
impl PartialEq for FixedWidthValue {
    fn eq(&self, other: &FixedWidthValue) -> bool {
        self.value == other.value
    }
}

impl Eq for FixedWidthValue { }

impl Hash for FixedWidthValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTHS: [Width; 4] = [Width::Byte, Width::Half, Width::Word, Width::XWord];

    #[test]
    fn test_encode_is_exactly_width_bytes() {
        for &w in WIDTHS.iter() {
            for &signed in [false, true].iter() {
                let v = FixedWidthValue::new(1, w, signed);
                assert_eq!(v.encode().unwrap().len(), w.bytes());
            }
        }
    }

    #[test]
    fn test_boundaries_round_trip() {
        for &w in WIDTHS.iter() {
            for &signed in [false, true].iter() {
                let proto = FixedWidthValue::new(0, w, signed);
                let samples = [proto.min(), proto.max(), 0, 1, proto.max() / 3];

                for &s in samples.iter() {
                    let v = FixedWidthValue::new(s, w, signed);
                    let bytes = v.encode().unwrap();
                    let back = FixedWidthValue::decode(&bytes, w, signed, Endian::Little).unwrap();
                    assert_eq!(back.value(), s);
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        for &w in WIDTHS.iter() {
            for &signed in [false, true].iter() {
                let proto = FixedWidthValue::new(0, w, signed);

                let above = FixedWidthValue::new(proto.max() + 1, w, signed);
                assert_eq!(above.encode().unwrap_err().kind(), ElfErrorKind::EncodingOverflow);

                let below = FixedWidthValue::new(proto.min() - 1, w, signed);
                assert_eq!(below.encode().unwrap_err().kind(), ElfErrorKind::EncodingOverflow);
            }
        }
    }

    #[test]
    fn test_wide_values_are_little_endian() {
        let v = FixedWidthValue::xword(0x0102030405060708);
        assert_eq!(v.encode().unwrap(), vec![8, 7, 6, 5, 4, 3, 2, 1]);

        let v = FixedWidthValue::half(0x3e);
        assert_eq!(v.encode().unwrap(), vec![0x3e, 0x00]);
    }

    #[test]
    fn test_negative_is_twos_complement() {
        assert_eq!(FixedWidthValue::sword(-2).encode().unwrap(), vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(FixedWidthValue::sxword(-1).encode().unwrap(), vec![0xff; 8]);
    }

    #[test]
    fn test_unsigned_max_u64() {
        let v = FixedWidthValue::addr(u64::max_value());
        assert_eq!(v.encode().unwrap(), vec![0xff; 8]);

        let back = FixedWidthValue::decode(&[0xff; 8], Width::XWord, false, Endian::Little).unwrap();
        assert_eq!(back.value(), u64::max_value() as i128);
    }

    #[test]
    fn test_big_endian() {
        let v = FixedWidthValue::word(0x11223344).with_endian(Endian::Big);
        let bytes = v.encode().unwrap();
        assert_eq!(bytes, vec![0x11, 0x22, 0x33, 0x44]);

        let back = FixedWidthValue::decode(&bytes, Width::Word, false, Endian::Big).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_equality_ignores_representation() {
        assert_eq!(FixedWidthValue::half(7), FixedWidthValue::sxword(7));
        assert!(FixedWidthValue::byte(7) != FixedWidthValue::byte(8));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let e = FixedWidthValue::decode(&[0, 0, 0], Width::Word, false, Endian::Little).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::InvalidLength);
    }
}
