// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! String tables hold null-terminated character sequences. Section and
//! symbol names are stored as byte offsets into one of these.
//!
//! The first byte of a table is always NUL, so offset 0 names the empty
//! string and means "no name". Every string added afterwards gets its own
//! storage, even if an identical string is already present.

use std::io::Write;

use tracing::trace;

use crate::error::{ElfError, ElfErrorKind, ElfResult};
use crate::value::{FixedWidthValue, Width};
use crate::writer::ElfWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    /// Entries in insertion order. Entry 0 is the implicit empty string.
    strings:       Vec<String>,
    /// Byte offset of each entry, parallel to `strings`.
    offsets:       Vec<u32>,
    /// Total encoded size, terminators included.
    size:          usize,
}

impl StringTable {
    pub fn new() -> StringTable {
        StringTable {
            strings:  vec![String::new()],
            offsets:  vec![0],
            size:     1,
        }
    }

    /// Appends a string and returns the offset of its first byte. The offset
    /// is always at least 1.
    pub fn add_string(&mut self, s: &str) -> ElfResult<u32> {
        if s.as_bytes().contains(&0) {
            return Err(ElfError::new(
                ElfErrorKind::InteriorNul,
                "string table entries cannot contain NUL",
            ).with_detail(format!("{:?}", s)));
        }

        // st_name and sh_name are 32-bit, so the offset has to fit.
        FixedWidthValue::new(self.size as i128, Width::Word, false).check()?;

        let offset = self.size as u32;
        self.strings.push(s.to_string());
        self.offsets.push(offset);
        self.size += s.len() + 1;

        trace!(string = s, offset, "add string");
        Ok(offset)
    }

    /// Looks up the string that starts at `offset`. Offsets that point into
    /// the middle of an entry are not resolved.
    pub fn get(&self, offset: u32) -> Option<&str> {
        match self.offsets.binary_search(&offset) {
            Ok(i) => Some(&self.strings[i][..]),
            Err(_) => None,
        }
    }

    /// Offset of the first entry equal to `s`. The empty string is always
    /// found at 0.
    pub fn find(&self, s: &str) -> Option<u32> {
        self.iter().find(|&(_, x)| x == s).map(|(off, _)| off)
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Number of entries, the implicit empty string included.
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.offsets.iter().cloned().zip(self.strings.iter().map(|s| &s[..]))
    }

    pub fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        for s in self.strings.iter() {
            w.write_bytes(s.as_bytes())?;
            w.write_u8(0)?;
        }
        Ok(())
    }

    pub fn encode(&self) -> ElfResult<Vec<u8>> {
        let mut w = ElfWriter::new(Vec::with_capacity(self.size));
        self.encode_to(&mut w)?;
        Ok(w.into_inner())
    }
}

impl Default for StringTable {
    fn default() -> StringTable {
        StringTable::new()
    }
}
