// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Raw ELF64 constants and primitive types, named the way the format manual
//! names them. Nothing in here knows how to lay out a file; the `elf` module
//! and the table modules build on these values.
//!
//! Users are encouraged to use the typed enums in `header`, `section` and
//! `symbol` instead of these constants directly.

#![allow(non_camel_case_types)]

pub type Elf64_Addr    = u64;
pub type Elf64_Off     = u64;
pub type Elf64_Half    = u16;
pub type Elf64_Word    = u32;
pub type Elf64_Sword   = i32;
pub type Elf64_Xword   = u64;
pub type Elf64_Sxword  = i64;

/// Size in bytes of the ELF64 file header. Also the value of `e_ehsize`.
pub const ELF64_EHDR_SIZE: usize = 64;

/// Size in bytes of one section header table entry (`e_shentsize`).
pub const ELF64_SHDR_SIZE: usize = 64;

/// Size in bytes of one symbol table entry.
pub const ELF64_SYM_SIZE: usize = 24;

// e_ident layout
// =============================================================================

/// File identification
pub const EI_MAG0:        usize =  0;
/// File identification
pub const EI_MAG1:        usize =  1;
/// File identification
pub const EI_MAG2:        usize =  2;
/// File identification
pub const EI_MAG3:        usize =  3;
/// File class
pub const EI_CLASS:       usize =  4;
/// Data encoding
pub const EI_DATA:        usize =  5;
/// File version
pub const EI_VERSION:     usize =  6;
/// OS/ABI identification
pub const EI_OSABI:       usize =  7;
/// ABI version
pub const EI_ABIVERSION:  usize =  8;
/// Start of padding bytes
pub const EI_PAD:         usize =  9;
/// Size of `e_ident[]`
pub const EI_NIDENT:      usize = 16;

/// Magic number
pub const ELFMAG: &[u8; 4] = b"\x7fELF";

pub const ELFCLASSNONE:   u8 = 0;
pub const ELFCLASS32:     u8 = 1;
pub const ELFCLASS64:     u8 = 2;

pub const ELFDATANONE:    u8 = 0;
/// Little-endian, two's complement
pub const ELFDATA2LSB:    u8 = 1;
/// Big-endian, two's complement
pub const ELFDATA2MSB:    u8 = 2;

pub const ELFOSABI_SYSV:        u8 =   0;
pub const ELFOSABI_HPUX:        u8 =   1;
pub const ELFOSABI_STANDALONE:  u8 = 255;

// File types, versions, machines
// =============================================================================

pub const ET_NONE:        u16 =      0;
pub const ET_REL:         u16 =      1;
pub const ET_EXEC:        u16 =      2;
pub const ET_DYN:         u16 =      3;
pub const ET_CORE:        u16 =      4;
/// Values in the inclusive range `ET_LOPROC..=ET_HIPROC` are processor
/// specific.
pub const ET_LOPROC:      u16 = 0xff00;
pub const ET_HIPROC:      u16 = 0xffff;

pub const EV_NONE:        u32 = 0;
pub const EV_CURRENT:     u32 = 1;

pub const EM_NONE:        u16 =    0;
pub const EM_M32:         u16 =    1;
pub const EM_SPARC:       u16 =    2;
pub const EM_386:         u16 =    3;
pub const EM_68K:         u16 =    4;
pub const EM_88K:         u16 =    5;
pub const EM_860:         u16 =    7;
pub const EM_MIPS:        u16 =    8;
pub const EM_X86_64:      u16 = 0x3e;

// Section indexes
// =============================================================================

/// Marks an undefined, missing or meaningless section reference. A symbol
/// "defined" relative to `SHN_UNDEF` is an undefined symbol.
pub const SHN_UNDEF:      u16 =      0;
/// Lower bound of the reserved index range. Reserved indexes never refer to
/// an entry in the section header table.
pub const SHN_LORESERVE:  u16 = 0xff00;
pub const SHN_LOPROC:     u16 = 0xff00;
pub const SHN_HIPROC:     u16 = 0xff1f;
pub const SHN_LOOS:       u16 = 0xff20;
pub const SHN_HIOS:       u16 = 0xff3f;
/// Symbols relative to `SHN_ABS` have absolute values and are not affected
/// by relocation.
pub const SHN_ABS:        u16 = 0xfff1;
/// Symbols relative to `SHN_COMMON` label unallocated common blocks.
pub const SHN_COMMON:     u16 = 0xfff2;
pub const SHN_HIRESERVE:  u16 = 0xffff;

// Section types and flags
// =============================================================================

pub const SHT_NULL:       u32 =          0;
pub const SHT_PROGBITS:   u32 =          1;
pub const SHT_SYMTAB:     u32 =          2;
pub const SHT_STRTAB:     u32 =          3;
pub const SHT_RELA:       u32 =          4;
pub const SHT_HASH:       u32 =          5;
pub const SHT_DYNAMIC:    u32 =          6;
pub const SHT_NOTE:       u32 =          7;
/// Occupies no space in the file; `sh_offset` holds the conceptual
/// placement and `sh_size` the size in memory.
pub const SHT_NOBITS:     u32 =          8;
pub const SHT_REL:        u32 =          9;
/// Reserved, unspecified semantics.
pub const SHT_SHLIB:      u32 =         10;
pub const SHT_DYNSYM:     u32 =         11;
pub const SHT_LOOS:       u32 = 0x60000000;
pub const SHT_HIOS:       u32 = 0x6fffffff;
pub const SHT_LOPROC:     u32 = 0x70000000;
pub const SHT_HIPROC:     u32 = 0x7fffffff;
pub const SHT_LOUSER:     u32 = 0x80000000;
pub const SHT_HIUSER:     u32 = 0x8fffffff;

pub const SHF_WRITE:      u64 =        0x1;
pub const SHF_ALLOC:      u64 =        0x2;
pub const SHF_EXECINSTR:  u64 =        0x4;
/// Bits reserved for environment-specific use.
pub const SHF_MASKOS:     u64 = 0x0f000000;
/// Bits reserved for processor-specific use.
pub const SHF_MASKPROC:   u64 = 0xf0000000;

// Symbol bindings and types
// =============================================================================

pub const STN_UNDEF:      u32 =  0;

pub const STB_LOCAL:      u8 =  0;
pub const STB_GLOBAL:     u8 =  1;
pub const STB_WEAK:       u8 =  2;
pub const STB_LOOS:       u8 = 10;
pub const STB_HIOS:       u8 = 12;
pub const STB_LOPROC:     u8 = 13;
pub const STB_HIPROC:     u8 = 15;

pub const STT_NOTYPE:     u8 =  0;
pub const STT_OBJECT:     u8 =  1;
pub const STT_FUNC:       u8 =  2;
pub const STT_SECTION:    u8 =  3;
pub const STT_FILE:       u8 =  4;
pub const STT_LOOS:       u8 = 10;
pub const STT_HIOS:       u8 = 12;
pub const STT_LOPROC:     u8 = 13;
pub const STT_HIPROC:     u8 = 15;

/// Packs a binding and a type into an `st_info` byte.
pub const fn st_info(bind: u8, typ: u8) -> u8 {
    (bind << 4) | (typ & 0xf)
}

/// Binding half of an `st_info` byte.
pub const fn st_bind(info: u8) -> u8 {
    info >> 4
}

/// Type half of an `st_info` byte.
pub const fn st_type(info: u8) -> u8 {
    info & 0xf
}
