// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Symbols and the symbol table.
//!
//! A symbol table index is a subscript into the table. Index 0 both
//! designates the first entry and serves as the undefined symbol index, and
//! its entry is all zeroes.

use std::collections::HashMap;
use std::io::Write;

use tracing::trace;

use crate::error::{ElfError, ElfErrorKind, ElfResult};
use crate::format::*;
use crate::writer::{ElfWriter, Encode};

/// A symbol's binding determines its linkage visibility and behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolBinding {
    /// Not visible outside the object file containing the definition.
    Local,
    /// Visible to all object files being combined.
    Global,
    /// Like `Global`, with lower precedence.
    Weak,
    /// `STB_LOOS..=STB_HIOS`
    Os(u8),
    /// `STB_LOPROC..=STB_HIPROC`
    Proc(u8),
    Unknown(u8),
}

impl SymbolBinding {
    pub fn from_raw(raw: u8) -> SymbolBinding {
        match raw {
            STB_LOCAL  => SymbolBinding::Local,
            STB_GLOBAL => SymbolBinding::Global,
            STB_WEAK   => SymbolBinding::Weak,
            STB_LOOS..=STB_HIOS     => SymbolBinding::Os(raw),
            STB_LOPROC..=STB_HIPROC => SymbolBinding::Proc(raw),
            _ => SymbolBinding::Unknown(raw),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            SymbolBinding::Local      => STB_LOCAL,
            SymbolBinding::Global     => STB_GLOBAL,
            SymbolBinding::Weak       => STB_WEAK,
            SymbolBinding::Os(x)      => x,
            SymbolBinding::Proc(x)    => x,
            SymbolBinding::Unknown(x) => x,
        }
    }

    /// Fails unless the value fits the four bits of `st_info` it is packed
    /// into and decodes back to this same variant.
    pub fn check(self) -> ElfResult<()> {
        let raw = self.raw();
        if raw > 0xf || SymbolBinding::from_raw(raw) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "symbol binding out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// A symbol's type gives a general classification for the associated
/// entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    NoType,
    /// A data object, such as a variable or an array.
    Object,
    /// A function or other executable code.
    Func,
    /// A section. Normally has `Local` binding.
    Section,
    /// Names the source file associated with the object file.
    File,
    /// `STT_LOOS..=STT_HIOS`
    Os(u8),
    /// `STT_LOPROC..=STT_HIPROC`
    Proc(u8),
    Unknown(u8),
}

impl SymbolType {
    pub fn from_raw(raw: u8) -> SymbolType {
        match raw {
            STT_NOTYPE  => SymbolType::NoType,
            STT_OBJECT  => SymbolType::Object,
            STT_FUNC    => SymbolType::Func,
            STT_SECTION => SymbolType::Section,
            STT_FILE    => SymbolType::File,
            STT_LOOS..=STT_HIOS     => SymbolType::Os(raw),
            STT_LOPROC..=STT_HIPROC => SymbolType::Proc(raw),
            _ => SymbolType::Unknown(raw),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            SymbolType::NoType     => STT_NOTYPE,
            SymbolType::Object     => STT_OBJECT,
            SymbolType::Func       => STT_FUNC,
            SymbolType::Section    => STT_SECTION,
            SymbolType::File       => STT_FILE,
            SymbolType::Os(x)      => x,
            SymbolType::Proc(x)    => x,
            SymbolType::Unknown(x) => x,
        }
    }

    /// Same rules as `SymbolBinding::check`.
    pub fn check(self) -> ElfResult<()> {
        let raw = self.raw();
        if raw > 0xf || SymbolType::from_raw(raw) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "symbol type out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// The section a symbol is defined relative to. Some values are not indexes
/// into the section header table but have special meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionRef {
    /// The symbol is undefined.
    Undefined,
    /// The symbol has an absolute value unaffected by relocation.
    Absolute,
    /// The symbol labels a common block that is not yet allocated.
    Common,
    /// An index into the section header table.
    Index(u16),
    /// Any other value in `SHN_LORESERVE..=SHN_HIRESERVE`
    Reserved(u16),
}

impl SectionRef {
    pub fn from_raw(raw: u16) -> SectionRef {
        match raw {
            SHN_UNDEF  => SectionRef::Undefined,
            SHN_ABS    => SectionRef::Absolute,
            SHN_COMMON => SectionRef::Common,
            SHN_LORESERVE..=SHN_HIRESERVE => SectionRef::Reserved(raw),
            _ => SectionRef::Index(raw),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            SectionRef::Undefined   => SHN_UNDEF,
            SectionRef::Absolute    => SHN_ABS,
            SectionRef::Common      => SHN_COMMON,
            SectionRef::Index(x)    => x,
            SectionRef::Reserved(x) => x,
        }
    }

    /// Fails if the raw value would be read back as a different variant,
    /// such as `Index(0xfff1)` or `Reserved(3)`.
    pub fn check(self) -> ElfResult<()> {
        if SectionRef::from_raw(self.raw()) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "section reference out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// ELF64 symbol table entry.
///
/// Binding and type share the `st_info` byte, binding in the high nibble and
/// type in the low one. They are only changed through `set_binding` and
/// `set_type`, each of which leaves the other nibble alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Offset of the symbol's name in the string table, or 0 for no name.
    pub name:          u32,

    info:              u8,

    /// The section the symbol is defined in relation to.
    pub section:       SectionRef,

    /// Value of the symbol: a section offset in relocatable files, a
    /// virtual address in executables and shared objects, or an alignment
    /// for common symbols.
    pub value:         u64,

    /// Size of the symbol, or 0 if it has none or it is unknown.
    pub size:          u64,
}

impl Symbol {
    /// An unnamed, undefined, local symbol with no type. Also the reserved
    /// entry at index 0.
    pub fn new() -> Symbol {
        Symbol {
            name:     0,
            info:     0,
            section:  SectionRef::Undefined,
            value:    0,
            size:     0,
        }
    }

    pub fn info(&self) -> u8 {
        self.info
    }

    /// `st_other`, which has no defined meaning and is always 0.
    pub fn other(&self) -> u8 {
        0
    }

    pub fn binding(&self) -> SymbolBinding {
        SymbolBinding::from_raw(st_bind(self.info))
    }

    pub fn typ(&self) -> SymbolType {
        SymbolType::from_raw(st_type(self.info))
    }

    /// Replaces the binding nibble. Values that do not fit are rejected and
    /// leave the symbol unchanged.
    pub fn set_binding(&mut self, binding: SymbolBinding) -> ElfResult<()> {
        binding.check()?;
        self.info = st_info(binding.raw(), st_type(self.info));
        Ok(())
    }

    /// Replaces the type nibble, with the same rules as `set_binding`.
    pub fn set_type(&mut self, typ: SymbolType) -> ElfResult<()> {
        typ.check()?;
        self.info = st_info(st_bind(self.info), typ.raw());
        Ok(())
    }

    /// Checks the fields that are public and so not checked on assignment.
    pub fn validate(&self) -> ElfResult<()> {
        self.section.check()
    }

    pub fn with_binding(mut self, binding: SymbolBinding) -> ElfResult<Symbol> {
        self.set_binding(binding)?;
        Ok(self)
    }

    pub fn with_type(mut self, typ: SymbolType) -> ElfResult<Symbol> {
        self.set_type(typ)?;
        Ok(self)
    }

    pub fn with_section(mut self, section: SectionRef) -> Symbol {
        self.section = section;
        self
    }

    pub fn with_value(mut self, value: u64) -> Symbol {
        self.value = value;
        self
    }

    pub fn with_size(mut self, size: u64) -> Symbol {
        self.size = size;
        self
    }
}

impl Default for Symbol {
    fn default() -> Symbol {
        Symbol::new()
    }
}

impl Encode for Symbol {
    const SIZE: usize = ELF64_SYM_SIZE;

    fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        w.write_u32(self.name)?;
        w.write_u8(self.info)?;
        w.write_u8(self.other())?;
        w.write_u16(self.section.raw())?;
        w.write_u64(self.value)?;
        w.write_u64(self.size)?;
        Ok(())
    }
}

/// Symbols in insertion order, looked up by name. Named symbols must have
/// unique names; unnamed symbols (such as section symbols) are not keyed.
///
/// All `Local` symbols precede all others, so adding a local after a global
/// or weak symbol is an error.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols:       Vec<Symbol>,
    by_name:       HashMap<String, usize>,

    /// Length of the leading run of `Local` symbols, the reserved one
    /// included.
    locals:        usize,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            symbols:  vec![Symbol::new()],
            by_name:  HashMap::new(),
            locals:   1,
        }
    }

    /// Appends a symbol and returns its index.
    pub fn add_symbol(&mut self, name: &str, symbol: Symbol) -> ElfResult<usize> {
        self.check_symbol(name, &symbol)?;

        let index = self.symbols.len();
        trace!(name, index, binding = ?symbol.binding(), typ = ?symbol.typ(), "add symbol");

        if symbol.binding() == SymbolBinding::Local {
            self.locals += 1;
        }
        self.symbols.push(symbol);
        if !name.is_empty() {
            self.by_name.insert(name.to_string(), index);
        }
        Ok(index)
    }

    /// Fails the same way `add_symbol` would, without adding anything.
    pub fn check_symbol(&self, name: &str, symbol: &Symbol) -> ElfResult<()> {
        if !name.is_empty() && self.by_name.contains_key(name) {
            return Err(ElfError::new(
                ElfErrorKind::DuplicateSymbolName,
                "symbol name already in use",
            ).with_detail(name.to_string()));
        }

        symbol.validate()?;

        if symbol.binding() == SymbolBinding::Local && self.locals < self.symbols.len() {
            return Err(ElfError::new(
                ElfErrorKind::MisorderedSymbol,
                "local symbols must be added before all others",
            ).with_detail(name.to_string()));
        }

        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).cloned()
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Symbol> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Number of symbols, the reserved one included.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// One greater than the index of the last `Local` symbol, which is
    /// also the index of the first non-local one. This is what the symbol
    /// table's `sh_info` holds.
    pub fn first_global(&self) -> usize {
        self.locals
    }

    /// Size of the encoded table in bytes.
    pub fn encoded_len(&self) -> usize {
        self.symbols.len() * Symbol::SIZE
    }

    pub fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        for s in self.symbols.iter() {
            s.encode_to(w)?;
        }
        Ok(())
    }

    pub fn encode(&self) -> ElfResult<Vec<u8>> {
        let mut w = ElfWriter::new(Vec::with_capacity(self.encoded_len()));
        self.encode_to(&mut w)?;
        Ok(w.into_inner())
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_sym() -> Symbol {
        Symbol::new()
            .with_section(SectionRef::Index(1))
            .with_value(0x401000)
            .with_size(0x20)
            .with_binding(SymbolBinding::Global).unwrap()
            .with_type(SymbolType::Func).unwrap()
    }

    #[test]
    fn test_binding_and_type_are_independent() {
        let mut s = Symbol::new();
        s.set_type(SymbolType::Func).unwrap();
        s.set_binding(SymbolBinding::Weak).unwrap();
        assert_eq!(s.info(), 0x22);

        s.set_type(SymbolType::Object).unwrap();
        assert_eq!(s.binding(), SymbolBinding::Weak);
        assert_eq!(s.typ(), SymbolType::Object);

        s.set_binding(SymbolBinding::Local).unwrap();
        assert_eq!(s.typ(), SymbolType::Object);
        assert_eq!(s.info(), 0x01);
    }

    #[test]
    fn test_oversized_values_are_rejected() {
        let mut s = Symbol::new();
        s.set_type(SymbolType::Func).unwrap();

        let e = s.set_binding(SymbolBinding::Unknown(0x31)).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(s.info(), 0x02);

        s.set_binding(SymbolBinding::Global).unwrap();
        let e = s.set_type(SymbolType::Unknown(0x27)).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(s.info(), 0x12);
    }

    #[test]
    fn test_escape_hatch_values_must_match_their_range() {
        assert_eq!(SymbolBinding::Os(1).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(SymbolBinding::Proc(10).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(SymbolBinding::Unknown(2).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        SymbolBinding::Os(11).check().unwrap();
        SymbolBinding::Unknown(5).check().unwrap();

        assert_eq!(SymbolType::Os(2).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        SymbolType::Proc(13).check().unwrap();

        assert_eq!(SectionRef::Index(0xfff1).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(SectionRef::Reserved(3).check().unwrap_err().kind(), ElfErrorKind::InvalidRawValue);
        SectionRef::Reserved(0xff10).check().unwrap();
        SectionRef::Index(3).check().unwrap();
    }

    #[test]
    fn test_bad_section_ref_rejected_on_add() {
        let mut t = SymbolTable::new();
        let s = Symbol::new().with_section(SectionRef::Index(SHN_ABS));
        let e = t.add_symbol("x", s).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::InvalidRawValue);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_entry_zero_is_zeroed() {
        let mut t = SymbolTable::new();
        t.add_symbol("main", main_sym()).unwrap();
        t.add_symbol("data", Symbol::new()
            .with_binding(SymbolBinding::Weak).unwrap()
            .with_type(SymbolType::Object).unwrap()).unwrap();

        assert_eq!(t.len(), 3);
        assert_eq!(t.get(0), Some(&Symbol::new()));
        assert_eq!(&t.encode().unwrap()[..24], &[0u8; 24][..]);
    }

    #[test]
    fn test_duplicate_symbol_name() {
        let mut t = SymbolTable::new();
        t.add_symbol("main", main_sym()).unwrap();
        let e = t.add_symbol("main", Symbol::new()).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::DuplicateSymbolName);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_unnamed_symbols_are_not_keyed() {
        let mut t = SymbolTable::new();
        let sect = Symbol::new().with_type(SymbolType::Section).unwrap();
        assert_eq!(t.add_symbol("", sect.clone().with_section(SectionRef::Index(1))).unwrap(), 1);
        assert_eq!(t.add_symbol("", sect.with_section(SectionRef::Index(2))).unwrap(), 2);
        assert_eq!(t.index_of(""), None);
    }

    #[test]
    fn test_first_global() {
        let mut t = SymbolTable::new();
        assert_eq!(t.first_global(), 1);

        t.add_symbol("file.c", Symbol::new().with_type(SymbolType::File).unwrap()).unwrap();
        t.add_symbol("main", main_sym()).unwrap();
        assert_eq!(t.first_global(), 2);
    }

    #[test]
    fn test_local_after_global_rejected() {
        let mut t = SymbolTable::new();
        t.add_symbol("g", main_sym()).unwrap();

        let e = t.add_symbol("l", Symbol::new()).unwrap_err();
        assert_eq!(e.kind(), ElfErrorKind::MisorderedSymbol);
        assert_eq!(t.len(), 2);
        assert_eq!(t.first_global(), 1);

        let weak = Symbol::new().with_binding(SymbolBinding::Weak).unwrap();
        t.add_symbol("w", weak).unwrap();
        assert_eq!(t.first_global(), 1);
    }

    #[test]
    fn test_symbol_record_layout() {
        let mut s = main_sym();
        s.name = 9;

        let bytes = s.encode().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &[9, 0, 0, 0]);
        assert_eq!(bytes[4], 0x12);
        assert_eq!(bytes[5], 0);
        assert_eq!(&bytes[6..8], &[1, 0]);
        assert_eq!(&bytes[8..16], &[0x00, 0x10, 0x40, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[16..24], &[0x20, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_section_ref_raw() {
        assert_eq!(SectionRef::from_raw(0), SectionRef::Undefined);
        assert_eq!(SectionRef::from_raw(0xfff1), SectionRef::Absolute);
        assert_eq!(SectionRef::from_raw(0xfff2), SectionRef::Common);
        assert_eq!(SectionRef::from_raw(7), SectionRef::Index(7));
        assert_eq!(SectionRef::from_raw(0xff10), SectionRef::Reserved(0xff10));
        assert_eq!(SectionRef::Common.raw(), 0xfff2);
    }
}
