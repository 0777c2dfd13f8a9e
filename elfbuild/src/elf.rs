// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Top level structure for an ELF file under construction, and the code to
//! lay it out and save it.
//!
//! An `ElfImage` always carries a `.symtab` and a `.strtab` section; they are
//! registered when the image is created, in that order, right after the
//! reserved null section. The string table holds both section and symbol
//! names, and `e_shstrndx` points at it.
//!
//! Building an image goes through three states. While strings, sections and
//! symbols are being added the image is *building* and its header does not
//! describe its tables. `finalize` computes every count and file offset from
//! the live tables, after which the image is *finalized* and can be
//! serialized any number of times. Any change moves it back to building.
//!
//! The file is laid out in this order, with no program header table:
//!
//! ```text
//! ELF header | section headers | .symtab | .strtab | section contents...
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{ElfError, ElfErrorKind, ElfResult};
use crate::format::ELF64_EHDR_SIZE;
use crate::header::{FileType, Header, Machine, OsAbi};
use crate::section::{SectionHeaderEntry, SectionHeaderTable, SectionType};
use crate::strtab::StringTable;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{FixedWidthValue, Width};
use crate::writer::{ElfWriter, Encode};

/// Name of the symbol table section every image carries.
pub const SYMTAB_NAME: &str = ".symtab";

/// Name of the string table section every image carries.
pub const STRTAB_NAME: &str = ".strtab";

/// Header settings for a new image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub file_type:     FileType,
    pub machine:       Machine,
    pub os_abi:        OsAbi,
    pub entry:         u64,
    pub flags:         u32,
}

impl ImageConfig {
    pub fn with_file_type(mut self, file_type: FileType) -> ImageConfig {
        self.file_type = file_type;
        self
    }

    pub fn with_machine(mut self, machine: Machine) -> ImageConfig {
        self.machine = machine;
        self
    }

    pub fn with_os_abi(mut self, os_abi: OsAbi) -> ImageConfig {
        self.os_abi = os_abi;
        self
    }

    pub fn with_entry(mut self, entry: u64) -> ImageConfig {
        self.entry = entry;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> ImageConfig {
        self.flags = flags;
        self
    }
}

impl Default for ImageConfig {
    /// A System V shared object for x86-64 with no entry point.
    fn default() -> ImageConfig {
        ImageConfig {
            file_type:  FileType::SharedObject,
            machine:    Machine::X86_64,
            os_abi:     OsAbi::SysV,
            entry:      0,
            flags:      0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Building,
    Finalized,
}

#[derive(Debug)]
pub struct ElfImage {
    header:        Header,
    sections:      SectionHeaderTable,
    strings:       StringTable,
    symbols:       SymbolTable,

    /// Contents of sections added with `add_section_with_data`, by section
    /// index.
    contents:      BTreeMap<usize, Vec<u8>>,

    state:         State,

    /// Total file size computed by the last `finalize`.
    file_size:     u64,
}

impl ElfImage {
    /// Creates an image with the default configuration.
    pub fn new() -> ElfResult<ElfImage> {
        ElfImage::with_config(ImageConfig::default())
    }

    /// Creates an image holding the null section, `.symtab`, `.strtab` and the
    /// reserved undefined symbol.
    pub fn with_config(config: ImageConfig) -> ElfResult<ElfImage> {
        let mut header = Header::new();
        header.typ = config.file_type;
        header.machine = config.machine;
        header.entry = config.entry;
        header.flags = config.flags;
        header.set_os_abi(config.os_abi);

        let mut image = ElfImage {
            header:     header,
            sections:   SectionHeaderTable::new(),
            strings:    StringTable::new(),
            symbols:    SymbolTable::new(),
            contents:   BTreeMap::new(),
            state:      State::Building,
            file_size:  0,
        };

        let symtab = SectionHeaderEntry::new(SectionType::SymTab)
            .with_align(8)
            .with_entsize(Symbol::SIZE as u64);
        image.add_section(SYMTAB_NAME, symtab)?;
        image.sections.link_by_name(SYMTAB_NAME, STRTAB_NAME)?;

        let strtab = SectionHeaderEntry::new(SectionType::StrTab)
            .with_align(1);
        image.add_section(STRTAB_NAME, strtab)?;

        Ok(image)
    }

    pub fn header(&self) -> &Header { &self.header }
    pub fn sections(&self) -> &SectionHeaderTable { &self.sections }
    pub fn strings(&self) -> &StringTable { &self.strings }
    pub fn symbols(&self) -> &SymbolTable { &self.symbols }

    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Mutable access to the header. The image must be finalized again
    /// before it is serialized.
    pub fn header_mut(&mut self) -> &mut Header {
        self.touch();
        &mut self.header
    }

    /// Mutable access to a section header. The image must be finalized again
    /// before it is serialized.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut SectionHeaderEntry> {
        self.touch();
        match self.sections.index_of(name) {
            Some(i) => self.sections.get_mut(i),
            None => None,
        }
    }

    /// Adds a string to the string table and returns its offset.
    pub fn add_string(&mut self, s: &str) -> ElfResult<u32> {
        self.touch();
        self.strings.add_string(s)
    }

    /// Adds a section header. `name` is registered in the string table and
    /// its offset stored in the header. The section's file offset is
    /// computed by `finalize`; with no contents, a section that occupies file
    /// space ends up with size 0. Returns the section's index.
    pub fn add_section(&mut self, name: &str, mut entry: SectionHeaderEntry) -> ElfResult<usize> {
        self.sections.check_entry(name, &entry)?;
        self.touch();

        entry.name = self.strings.add_string(name)?;
        self.sections.add_entry(name, entry)
    }

    /// Adds a section header along with the bytes of the section. The
    /// section's file offset and size are computed by `finalize`. Sections
    /// that occupy no file space, such as `NoBits`, keep their declared size
    /// and the bytes are never written.
    pub fn add_section_with_data(&mut self, name: &str, entry: SectionHeaderEntry, data: Vec<u8>)
        -> ElfResult<usize> {
        let occupies_file = entry.occupies_file();
        let index = self.add_section(name, entry)?;
        if !occupies_file && !data.is_empty() {
            debug!(name, bytes = data.len(), "dropping contents of section with no file space");
        }
        self.contents.insert(index, data);
        Ok(index)
    }

    /// Records that section `from`'s `sh_link` holds the index of `to`.
    /// Resolved during `finalize`.
    pub fn link_sections(&mut self, from: &str, to: &str) -> ElfResult<()> {
        self.sections.link_by_name(from, to)?;
        self.touch();
        Ok(())
    }

    /// Adds a symbol. A non-empty `name` is registered in the string table
    /// and its offset stored in the symbol. Returns the symbol's index.
    pub fn add_symbol(&mut self, name: &str, mut symbol: Symbol) -> ElfResult<usize> {
        self.symbols.check_symbol(name, &symbol)?;
        self.touch();

        if !name.is_empty() {
            symbol.name = self.strings.add_string(name)?;
        }
        self.symbols.add_symbol(name, symbol)
    }

    fn touch(&mut self) {
        self.state = State::Building;
    }

    /// Lays out the file and brings the header in line with the tables.
    /// Calling it again without changes gives the same result.
    ///
    /// Every section after the null one gets a file offset, in index order,
    /// aligned to its `sh_addralign`. Sections that occupy file space get
    /// the size of their contents, which is 0 if none were given.
    pub fn finalize(&mut self) -> ElfResult<()> {
        self.touch();

        self.sections.validate()?;
        self.sections.resolve_links()?;

        let symtab = self.sections.require(SYMTAB_NAME)?;
        let strtab = self.sections.require(STRTAB_NAME)?;

        let first_global = self.symbols.first_global();
        FixedWidthValue::new(first_global as i128, Width::Word, false).check()?;
        if let Some(e) = self.sections.get_mut(symtab) {
            e.info = first_global as u32;
        }

        let shoff = ELF64_EHDR_SIZE as u64;
        let mut pos = shoff + self.sections.encoded_len() as u64;

        for index in 1..self.sections.len() {
            let data_len = if index == symtab {
                self.symbols.encoded_len()
            } else if index == strtab {
                self.strings.len()
            } else {
                self.contents.get(&index).map_or(0, |d| d.len())
            };

            if let Some(e) = self.sections.get_mut(index) {
                e.offset = align_up(pos, e.addralign)?;
                if e.occupies_file() {
                    e.size = data_len as u64;
                    pos = match e.offset.checked_add(e.size) {
                        Some(end) => end,
                        None => return Err(too_large(e.offset)),
                    };
                }
            }
        }

        if pos > isize::MAX as u64 {
            return Err(too_large(pos));
        }

        self.header.set_section_header_offset(shoff);
        self.header.finalize(self.sections.len(), strtab)?;

        debug!(
            sections = self.sections.len(),
            symbols = self.symbols.len(),
            strtab_index = strtab,
            shoff,
            file_size = pos,
            "finalized image"
        );

        self.file_size = pos;
        self.state = State::Finalized;
        Ok(())
    }

    /// Produces the file. Fails with `NotFinalized` if the image changed
    /// since the last `finalize`, or was never finalized.
    pub fn serialize(&self) -> ElfResult<Vec<u8>> {
        if self.state != State::Finalized {
            return Err(ElfError::new(
                ElfErrorKind::NotFinalized,
                "image must be finalized before it is serialized",
            ));
        }

        let mut buf = Vec::new();
        let reserved = usize::try_from(self.file_size)
            .ok()
            .and_then(|n| buf.try_reserve_exact(n).ok());
        if reserved.is_none() {
            return Err(too_large(self.file_size));
        }

        let symtab = self.sections.require(SYMTAB_NAME)?;
        let strtab = self.sections.require(STRTAB_NAME)?;

        let mut w = ElfWriter::new(buf);

        self.header.encode_to(&mut w)?;
        self.sections.encode_to(&mut w)?;

        for (index, e) in self.sections.iter().enumerate().skip(1) {
            if !e.occupies_file() {
                continue;
            }

            w.pad_to(e.offset)?;
            if index == symtab {
                self.symbols.encode_to(&mut w)?;
            } else if index == strtab {
                self.strings.encode_to(&mut w)?;
            } else if let Some(data) = self.contents.get(&index) {
                w.write_bytes(data)?;
            }
        }

        debug_assert_eq!(w.position(), self.file_size);
        debug!(bytes = w.position(), "serialized image");

        Ok(w.into_inner())
    }

    /// Serializes the image in memory, then writes it to `sink` in one go.
    pub fn write_to<W: Write>(&self, mut sink: W) -> ElfResult<()> {
        let bytes = self.serialize()?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        debug!(bytes = bytes.len(), "wrote image");
        Ok(())
    }

    /// Creates or truncates the file at `path` and writes the image to it.
    /// Nothing is created if the image is not finalized.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> ElfResult<()> {
        let bytes = self.serialize()?;
        let mut f = BufWriter::new(File::create(path.as_ref())?);
        f.write_all(&bytes)?;
        f.flush()?;
        debug!(bytes = bytes.len(), path = %path.as_ref().display(), "wrote image to file");
        Ok(())
    }
}

/// Rounds `pos` up to a multiple of `align`, which is 0 or a power of two.
fn align_up(pos: u64, align: u64) -> ElfResult<u64> {
    if align <= 1 {
        return Ok(pos);
    }
    match pos.checked_add(align - 1) {
        Some(x) => Ok(x & !(align - 1)),
        None => Err(too_large(pos)),
    }
}

fn too_large(at: u64) -> ElfError {
    ElfError::new(
        ElfErrorKind::EncodingOverflow,
        "image is too large to lay out in memory",
    ).with_detail(format!("{:#x}", at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionFlags;
    use crate::symbol::{SectionRef, SymbolBinding, SymbolType};

    #[test]
    fn test_new_image_has_predefined_sections() {
        let image = ElfImage::new().unwrap();
        let sections = image.sections();

        assert_eq!(sections.len(), 3);
        assert_eq!(sections.index_of(SYMTAB_NAME), Some(1));
        assert_eq!(sections.index_of(STRTAB_NAME), Some(2));
        assert_eq!(sections.get(1).unwrap().typ, SectionType::SymTab);
        assert_eq!(sections.get(1).unwrap().entsize, 24);
        assert_eq!(sections.get(2).unwrap().typ, SectionType::StrTab);

        assert_eq!(image.strings().get(sections.get(1).unwrap().name), Some(".symtab"));
        assert_eq!(image.strings().get(sections.get(2).unwrap().name), Some(".strtab"));
        assert_eq!(image.symbols().len(), 1);
        assert!(!image.is_finalized());
    }

    #[test]
    fn test_finalize_layout() {
        let mut image = ElfImage::new().unwrap();
        image.finalize().unwrap();

        let h = image.header();
        assert_eq!(h.section_header_offset(), 64);
        assert_eq!(h.section_count(), 3);
        assert_eq!(h.string_table_index(), 2);

        let symtab = image.sections().get(1).unwrap();
        assert_eq!(symtab.offset, 64 + 3 * 64);
        assert_eq!(symtab.size, 24);
        assert_eq!(symtab.link, 2);
        assert_eq!(symtab.info, 1);

        let strtab = image.sections().get(2).unwrap();
        assert_eq!(strtab.offset, symtab.offset + 24);
        assert_eq!(strtab.size, image.strings().len() as u64);
    }

    #[test]
    fn test_serialize_requires_finalize() {
        let mut image = ElfImage::new().unwrap();
        assert_eq!(image.serialize().unwrap_err().kind(), ElfErrorKind::NotFinalized);

        image.finalize().unwrap();
        image.serialize().unwrap();

        image.add_string("late").unwrap();
        assert_eq!(image.serialize().unwrap_err().kind(), ElfErrorKind::NotFinalized);

        image.finalize().unwrap();
        image.header_mut().entry = 0x1000;
        assert_eq!(image.serialize().unwrap_err().kind(), ElfErrorKind::NotFinalized);
    }

    #[test]
    fn test_failed_add_leaves_tables_alone() {
        let mut image = ElfImage::new().unwrap();
        let strings_before = image.strings().len();

        let e = image.add_section(SYMTAB_NAME, SectionHeaderEntry::new(SectionType::ProgBits));
        assert_eq!(e.unwrap_err().kind(), ElfErrorKind::DuplicateSectionName);

        let bad = SectionHeaderEntry::new(SectionType::ProgBits).with_align(3);
        assert_eq!(image.add_section(".text", bad).unwrap_err().kind(), ElfErrorKind::InvalidAlignment);

        image.add_symbol("main", Symbol::new()).unwrap();
        let strings_mid = image.strings().len();
        assert_eq!(image.add_symbol("main", Symbol::new()).unwrap_err().kind(),
                   ElfErrorKind::DuplicateSymbolName);

        assert_eq!(strings_mid, strings_before + 5);
        assert_eq!(image.strings().len(), strings_mid);
        assert_eq!(image.sections().len(), 3);
    }

    #[test]
    fn test_section_contents_are_placed_and_aligned() {
        let mut image = ElfImage::new().unwrap();
        let text = SectionHeaderEntry::new(SectionType::ProgBits)
            .with_flags(SectionFlags::ALLOC | SectionFlags::EXECINSTR)
            .with_align(16);
        let idx = image.add_section_with_data(".text", text, vec![0xc3]).unwrap();

        let bss = SectionHeaderEntry::new(SectionType::NoBits)
            .with_flags(SectionFlags::ALLOC | SectionFlags::WRITE)
            .with_size(0x100)
            .with_align(8);
        let bss_idx = image.add_section_with_data(".bss", bss, vec![1, 2, 3]).unwrap();

        image.finalize().unwrap();
        let bytes = image.serialize().unwrap();

        let text = image.sections().get(idx).unwrap();
        assert_eq!(text.offset % 16, 0);
        assert_eq!(text.size, 1);
        assert_eq!(bytes[text.offset as usize], 0xc3);
        assert_eq!(bytes.len() as u64, text.offset + 1);

        let bss = image.sections().get(bss_idx).unwrap();
        assert_eq!(bss.size, 0x100);
        assert_eq!(bss.offset % 8, 0);
    }

    #[test]
    fn test_symtab_info_counts_locals() {
        let mut image = ElfImage::new().unwrap();
        image.add_symbol("a.c", Symbol::new()
            .with_section(SectionRef::Absolute)
            .with_type(SymbolType::File).unwrap()).unwrap();
        image.add_symbol("main", Symbol::new()
            .with_binding(SymbolBinding::Global).unwrap()
            .with_type(SymbolType::Func).unwrap()).unwrap();

        image.finalize().unwrap();
        assert_eq!(image.sections().get_by_name(SYMTAB_NAME).unwrap().info, 2);
    }

    #[test]
    fn test_local_after_global_rejected() {
        let mut image = ElfImage::new().unwrap();
        image.add_symbol("g", Symbol::new()
            .with_binding(SymbolBinding::Global).unwrap()).unwrap();
        image.finalize().unwrap();

        let e = image.add_symbol("l", Symbol::new()).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::MisorderedSymbol);
        assert!(image.is_finalized());
        assert_eq!(image.strings().find("l"), None);
        assert_eq!(image.sections().get_by_name(SYMTAB_NAME).unwrap().info, 1);
    }

    #[test]
    fn test_sections_without_data_get_offsets() {
        let mut image = ElfImage::new().unwrap();
        let text = SectionHeaderEntry::new(SectionType::ProgBits)
            .with_size(16)
            .with_align(16);
        let text_idx = image.add_section(".text", text).unwrap();

        let bss = SectionHeaderEntry::new(SectionType::NoBits)
            .with_size(0x40)
            .with_align(32);
        let bss_idx = image.add_section(".bss", bss).unwrap();

        let data = SectionHeaderEntry::new(SectionType::ProgBits).with_align(4);
        let data_idx = image.add_section_with_data(".data", data, vec![1, 2, 3, 4]).unwrap();

        image.finalize().unwrap();
        let bytes = image.serialize().unwrap();

        let strtab = image.sections().get_by_name(STRTAB_NAME).unwrap();
        let strtab_end = strtab.offset + strtab.size;

        let text = image.sections().get(text_idx).unwrap();
        assert!(text.offset >= strtab_end);
        assert_eq!(text.offset % 16, 0);
        assert_eq!(text.size, 0);

        let bss = image.sections().get(bss_idx).unwrap();
        assert!(bss.offset >= text.offset);
        assert_eq!(bss.offset % 32, 0);
        assert_eq!(bss.size, 0x40);

        let data = image.sections().get(data_idx).unwrap();
        assert!(data.offset >= text.offset);
        assert_eq!(data.offset % 4, 0);
        assert_eq!(&bytes[data.offset as usize..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_huge_alignment_fails_finalize() {
        let mut image = ElfImage::new().unwrap();
        let big = SectionHeaderEntry::new(SectionType::ProgBits).with_align(1 << 63);
        image.add_section_with_data(".big", big, vec![1]).unwrap();

        assert_eq!(image.finalize().unwrap_err().kind(), ElfErrorKind::EncodingOverflow);
        assert!(!image.is_finalized());
        assert_eq!(image.serialize().unwrap_err().kind(), ElfErrorKind::NotFinalized);
    }

    #[test]
    fn test_config() {
        let config = ImageConfig::default()
            .with_file_type(FileType::Relocatable)
            .with_machine(Machine::I386)
            .with_os_abi(OsAbi::Standalone)
            .with_entry(0x8000)
            .with_flags(5);
        let image = ElfImage::with_config(config).unwrap();

        let h = image.header();
        assert_eq!(h.typ, FileType::Relocatable);
        assert_eq!(h.machine, Machine::I386);
        assert_eq!(h.os_abi(), OsAbi::Standalone);
        assert_eq!(h.entry, 0x8000);
        assert_eq!(h.flags, 5);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(13, 0).unwrap(), 13);
        assert_eq!(align_up(13, 1).unwrap(), 13);
        assert_eq!(align_up(13, 8).unwrap(), 16);
        assert_eq!(align_up(16, 8).unwrap(), 16);
        assert_eq!(align_up(u64::MAX - 2, 8).unwrap_err().kind(), ElfErrorKind::EncodingOverflow);
    }
}
