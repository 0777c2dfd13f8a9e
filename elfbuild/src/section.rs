// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Section headers and the section header table.
//!
//! Every section in a file has exactly one header describing it. The order of
//! headers in the table is the order they were added, and that order is
//! what other structures refer to: `sh_link`, `st_shndx` and `e_shstrndx`
//! are all indexes into it. Index 0 is reserved and always holds an inactive
//! all-zero header.

use std::collections::HashMap;
use std::io::Write;

use bitflags::bitflags;
use tracing::trace;

use crate::error::{ElfError, ElfErrorKind, ElfResult};
use crate::format::*;
use crate::writer::{ElfWriter, Encode};

/// A section header's `sh_type`, which decides the section's semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    /// Inactive header with no associated section.
    Null,
    /// Information defined by the program.
    ProgBits,
    /// A symbol table for link editing.
    SymTab,
    /// A string table.
    StrTab,
    /// Relocation entries with explicit addends.
    Rela,
    /// A symbol hash table.
    Hash,
    /// Dynamic linking information.
    Dynamic,
    Note,
    /// Like `ProgBits`, but occupies no space in the file.
    NoBits,
    /// Relocation entries without explicit addends.
    Rel,
    /// Reserved, unspecified semantics.
    ShLib,
    /// Minimal symbol table for dynamic linking.
    DynSym,
    /// `SHT_LOOS..=SHT_HIOS`
    Os(u32),
    /// `SHT_LOPROC..=SHT_HIPROC`
    Proc(u32),
    /// `SHT_LOUSER..=SHT_HIUSER`
    User(u32),
    /// Unknown section type; value copied literally
    Unknown(u32),
}

impl SectionType {
    pub fn from_raw(raw: u32) -> SectionType {
        match raw {
            SHT_NULL     => SectionType::Null,
            SHT_PROGBITS => SectionType::ProgBits,
            SHT_SYMTAB   => SectionType::SymTab,
            SHT_STRTAB   => SectionType::StrTab,
            SHT_RELA     => SectionType::Rela,
            SHT_HASH     => SectionType::Hash,
            SHT_DYNAMIC  => SectionType::Dynamic,
            SHT_NOTE     => SectionType::Note,
            SHT_NOBITS   => SectionType::NoBits,
            SHT_REL      => SectionType::Rel,
            SHT_SHLIB    => SectionType::ShLib,
            SHT_DYNSYM   => SectionType::DynSym,
            SHT_LOOS..=SHT_HIOS     => SectionType::Os(raw),
            SHT_LOPROC..=SHT_HIPROC => SectionType::Proc(raw),
            SHT_LOUSER..=SHT_HIUSER => SectionType::User(raw),
            _ => SectionType::Unknown(raw),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            SectionType::Null     => SHT_NULL,
            SectionType::ProgBits => SHT_PROGBITS,
            SectionType::SymTab   => SHT_SYMTAB,
            SectionType::StrTab   => SHT_STRTAB,
            SectionType::Rela     => SHT_RELA,
            SectionType::Hash     => SHT_HASH,
            SectionType::Dynamic  => SHT_DYNAMIC,
            SectionType::Note     => SHT_NOTE,
            SectionType::NoBits   => SHT_NOBITS,
            SectionType::Rel      => SHT_REL,
            SectionType::ShLib    => SHT_SHLIB,
            SectionType::DynSym   => SHT_DYNSYM,
            SectionType::Os(x)      => x,
            SectionType::Proc(x)    => x,
            SectionType::User(x)    => x,
            SectionType::Unknown(x) => x,
        }
    }

    /// Fails if the raw value would be read back as a different variant,
    /// such as `Os(1)`, which is really `ProgBits`.
    pub fn check(self) -> ElfResult<()> {
        if SectionType::from_raw(self.raw()) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "section type out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

bitflags! {
    /// `sh_flags`. Bits without a name are kept as-is.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        /// Writable during process execution.
        const WRITE     = SHF_WRITE;
        /// Occupies memory during process execution.
        const ALLOC     = SHF_ALLOC;
        /// Contains executable machine instructions.
        const EXECINSTR = SHF_EXECINSTR;
        const MASKOS    = SHF_MASKOS;
        const MASKPROC  = SHF_MASKPROC;
    }
}

/// ELF64 section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeaderEntry {
    /// Offset of the section's name in the section name string table.
    pub name:          u32,

    pub typ:           SectionType,

    pub flags:         SectionFlags,

    /// Address of the section's first byte in memory, or 0 if the section
    /// does not appear in the memory image.
    pub addr:          u64,

    /// File offset of the section's first byte. For `NoBits` sections this is
    /// only the conceptual placement.
    pub offset:        u64,

    /// Size in bytes. A `NoBits` section may have a non-zero size and still
    /// occupy no file space.
    pub size:          u64,

    /// Section header table index link, interpreted per type:
    ///
    /// - `SymTab`, `DynSym`, `Dynamic` -- the associated string table
    /// - `Hash`, `Rel`, `Rela` -- the associated symbol table
    /// - other -- `SHN_UNDEF`
    pub link:          u32,

    /// Extra information, interpreted per type:
    ///
    /// - `Rel`, `Rela` -- the section the relocations apply to
    /// - `SymTab`, `DynSym` -- one greater than the index of the last local
    ///   symbol
    /// - other -- 0
    pub info:          u32,

    /// 0 or 1 for no constraint, otherwise a power of two that `addr` must
    /// be a multiple of.
    pub addralign:     u64,

    /// Size of each entry for sections holding a table of fixed-size
    /// records, otherwise 0.
    pub entsize:       u64,
}

impl SectionHeaderEntry {
    /// The reserved header at index 0.
    pub fn null() -> SectionHeaderEntry {
        SectionHeaderEntry::new(SectionType::Null)
    }

    pub fn new(typ: SectionType) -> SectionHeaderEntry {
        SectionHeaderEntry {
            name:       0,
            typ:        typ,
            flags:      SectionFlags::empty(),
            addr:       0,
            offset:     0,
            size:       0,
            link:       0,
            info:       0,
            addralign:  0,
            entsize:    0,
        }
    }

    pub fn with_flags(mut self, flags: SectionFlags) -> SectionHeaderEntry {
        self.flags = flags;
        self
    }

    pub fn with_addr(mut self, addr: u64) -> SectionHeaderEntry {
        self.addr = addr;
        self
    }

    pub fn with_size(mut self, size: u64) -> SectionHeaderEntry {
        self.size = size;
        self
    }

    pub fn with_link(mut self, link: u32) -> SectionHeaderEntry {
        self.link = link;
        self
    }

    pub fn with_info(mut self, info: u32) -> SectionHeaderEntry {
        self.info = info;
        self
    }

    pub fn with_align(mut self, addralign: u64) -> SectionHeaderEntry {
        self.addralign = addralign;
        self
    }

    pub fn with_entsize(mut self, entsize: u64) -> SectionHeaderEntry {
        self.entsize = entsize;
        self
    }

    /// Whether the section's contents take up bytes in the file.
    pub fn occupies_file(&self) -> bool {
        match self.typ {
            SectionType::Null | SectionType::NoBits => false,
            _ => true,
        }
    }

    /// Checks the section type and the alignment constraints on `addralign`
    /// and `addr`.
    pub fn validate(&self) -> ElfResult<()> {
        self.typ.check()?;

        if self.addralign > 1 && !self.addralign.is_power_of_two() {
            return Err(ElfError::new(
                ElfErrorKind::InvalidAlignment,
                "section alignment is not a power of two",
            ).with_detail(format!("{}", self.addralign)));
        }

        if self.addralign > 1 && self.addr % self.addralign != 0 {
            return Err(ElfError::new(
                ElfErrorKind::InvalidAlignment,
                "section address is not aligned",
            ).with_detail(format!("{:#x} with alignment {}", self.addr, self.addralign)));
        }

        Ok(())
    }
}

impl Default for SectionHeaderEntry {
    fn default() -> SectionHeaderEntry {
        SectionHeaderEntry::null()
    }
}

impl Encode for SectionHeaderEntry {
    const SIZE: usize = ELF64_SHDR_SIZE;

    fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        w.write_u32(self.name)?;
        w.write_u32(self.typ.raw())?;
        w.write_u64(self.flags.bits())?;
        w.write_u64(self.addr)?;
        w.write_u64(self.offset)?;
        w.write_u64(self.size)?;
        w.write_u32(self.link)?;
        w.write_u32(self.info)?;
        w.write_u64(self.addralign)?;
        w.write_u64(self.entsize)?;
        Ok(())
    }
}

/// An object file's section header table lets one locate all the file's
/// sections. Sections are looked up by name; names are unique.
#[derive(Debug, Clone)]
pub struct SectionHeaderTable {
    entries:       Vec<SectionHeaderEntry>,
    names:         Vec<Option<String>>,
    by_name:       HashMap<String, usize>,

    /// Links recorded by name, applied by `resolve_links`.
    links:         Vec<(usize, String)>,
}

impl SectionHeaderTable {
    pub fn new() -> SectionHeaderTable {
        SectionHeaderTable {
            entries:  vec![SectionHeaderEntry::null()],
            names:    vec![None],
            by_name:  HashMap::new(),
            links:    Vec::new(),
        }
    }

    /// Appends a section header and returns its index. Fails if a section
    /// with the same name already exists; nothing is overwritten.
    pub fn add_entry(&mut self, name: &str, entry: SectionHeaderEntry) -> ElfResult<usize> {
        self.check_entry(name, &entry)?;

        let index = self.entries.len();
        trace!(name, index, typ = ?entry.typ, "add section header");

        self.entries.push(entry);
        self.names.push(Some(name.to_string()));
        self.by_name.insert(name.to_string(), index);
        Ok(index)
    }

    /// Fails the same way `add_entry` would, without adding anything.
    pub fn check_entry(&self, name: &str, entry: &SectionHeaderEntry) -> ElfResult<()> {
        if self.by_name.contains_key(name) {
            return Err(ElfError::new(
                ElfErrorKind::DuplicateSectionName,
                "section name already in use",
            ).with_detail(name.to_string()));
        }

        entry.validate()
    }

    /// Records that `from`'s `sh_link` must hold the index of `to`. The link
    /// is applied by `resolve_links`, so `to` may be added later.
    pub fn link_by_name(&mut self, from: &str, to: &str) -> ElfResult<()> {
        let index = self.require(from)?;
        self.links.retain(|&(i, _)| i != index);
        self.links.push((index, to.to_string()));
        Ok(())
    }

    /// Applies every link recorded by `link_by_name`.
    pub fn resolve_links(&mut self) -> ElfResult<()> {
        for &(from, ref to) in self.links.iter() {
            let target = match self.by_name.get(to) {
                Some(&i) => i,
                None => return Err(ElfError::new(
                    ElfErrorKind::UnknownSection,
                    "link target section does not exist",
                ).with_detail(to.clone())),
            };
            self.entries[from].link = target as u32;
        }
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).cloned()
    }

    /// Like `index_of`, but a missing name is an `UnknownSection` error.
    pub fn require(&self, name: &str) -> ElfResult<usize> {
        match self.index_of(name) {
            Some(i) => Ok(i),
            None => Err(ElfError::new(
                ElfErrorKind::UnknownSection,
                "no section with that name",
            ).with_detail(name.to_string())),
        }
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        match self.names.get(index) {
            Some(&Some(ref s)) => Some(&s[..]),
            _ => None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&SectionHeaderEntry> {
        self.entries.get(index)
    }

    /// Mutable access to a header. The reserved header at index 0 is not
    /// handed out.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SectionHeaderEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get_mut(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&SectionHeaderEntry> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Number of headers, the reserved one included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SectionHeaderEntry> {
        self.entries.iter()
    }

    /// Re-checks every header, for use after headers were changed through
    /// `get_mut`.
    pub fn validate(&self) -> ElfResult<()> {
        for e in self.entries.iter() {
            e.validate()?;
        }
        Ok(())
    }

    /// Size of the encoded table in bytes.
    pub fn encoded_len(&self) -> usize {
        self.entries.len() * SectionHeaderEntry::SIZE
    }

    pub fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        for e in self.entries.iter() {
            e.encode_to(w)?;
        }
        Ok(())
    }

    pub fn encode(&self) -> ElfResult<Vec<u8>> {
        let mut w = ElfWriter::new(Vec::with_capacity(self.encoded_len()));
        self.encode_to(&mut w)?;
        Ok(w.into_inner())
    }
}

impl Default for SectionHeaderTable {
    fn default() -> SectionHeaderTable {
        SectionHeaderTable::new()
    }
}
