// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! The ELF64 file header. It sits at offset 0 of every file and tells a
//! reader how to find everything else.

use std::io::Write;

use crate::error::{ElfError, ElfErrorKind, ElfResult};
use crate::format::*;
use crate::value::{FixedWidthValue, Width};
use crate::writer::{ElfWriter, Encode};

/// Different types an ELF file can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// The file has no type
    None,
    /// A relocatable file
    Relocatable,
    /// An executable file
    Executable,
    /// A shared object file
    SharedObject,
    /// A core dump
    Core,
    /// Processor-specific type in `ET_LOPROC..=ET_HIPROC`
    Processor(u16),
    /// Unknown file type; value copied literally
    Unknown(u16),
}

impl FileType {
    pub fn from_raw(raw: u16) -> FileType {
        match raw {
            ET_NONE => FileType::None,
            ET_REL  => FileType::Relocatable,
            ET_EXEC => FileType::Executable,
            ET_DYN  => FileType::SharedObject,
            ET_CORE => FileType::Core,
            ET_LOPROC..=ET_HIPROC => FileType::Processor(raw),
            _ => FileType::Unknown(raw),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            FileType::None          => ET_NONE,
            FileType::Relocatable   => ET_REL,
            FileType::Executable    => ET_EXEC,
            FileType::SharedObject  => ET_DYN,
            FileType::Core          => ET_CORE,
            FileType::Processor(x)  => x,
            FileType::Unknown(x)    => x,
        }
    }

    /// Fails if the raw value would be read back as a different variant.
    pub fn check(self) -> ElfResult<()> {
        if FileType::from_raw(self.raw()) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "file type out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// The architecture for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    /// No machine type specified
    None,
    /// AT&T WE 32100
    M32,
    Sparc,
    /// Intel 80386
    I386,
    /// Motorola 68000
    M68k,
    /// Motorola 88000
    M88k,
    /// Intel 80860
    I860,
    /// MIPS RS3000
    Mips,
    /// AMD x86-64
    X86_64,
    /// Unknown machine type; value copied literally
    Unknown(u16),
}

impl Machine {
    pub fn from_raw(raw: u16) -> Machine {
        match raw {
            EM_NONE   => Machine::None,
            EM_M32    => Machine::M32,
            EM_SPARC  => Machine::Sparc,
            EM_386    => Machine::I386,
            EM_68K    => Machine::M68k,
            EM_88K    => Machine::M88k,
            EM_860    => Machine::I860,
            EM_MIPS   => Machine::Mips,
            EM_X86_64 => Machine::X86_64,
            _ => Machine::Unknown(raw),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Machine::None       => EM_NONE,
            Machine::M32        => EM_M32,
            Machine::Sparc      => EM_SPARC,
            Machine::I386       => EM_386,
            Machine::M68k       => EM_68K,
            Machine::M88k       => EM_88K,
            Machine::I860       => EM_860,
            Machine::Mips       => EM_MIPS,
            Machine::X86_64     => EM_X86_64,
            Machine::Unknown(x) => x,
        }
    }

    /// Fails if an `Unknown` value names a known machine.
    pub fn check(self) -> ElfResult<()> {
        if Machine::from_raw(self.raw()) != self {
            return Err(ElfError::new(
                ElfErrorKind::InvalidRawValue,
                "machine out of range",
            ).with_detail(format!("{:?}", self)));
        }
        Ok(())
    }
}

/// Operating system / ABI the file is built for, stored in `e_ident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsAbi {
    /// System V ABI
    SysV,
    /// HP-UX
    HpUx,
    /// Standalone (embedded) application
    Standalone,
    Unknown(u8),
}

impl OsAbi {
    pub fn from_raw(raw: u8) -> OsAbi {
        match raw {
            ELFOSABI_SYSV       => OsAbi::SysV,
            ELFOSABI_HPUX       => OsAbi::HpUx,
            ELFOSABI_STANDALONE => OsAbi::Standalone,
            _ => OsAbi::Unknown(raw),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            OsAbi::SysV       => ELFOSABI_SYSV,
            OsAbi::HpUx       => ELFOSABI_HPUX,
            OsAbi::Standalone => ELFOSABI_STANDALONE,
            OsAbi::Unknown(x) => x,
        }
    }
}

/// ELF64 file header.
///
/// The table bookkeeping fields (`e_shoff`, `e_shnum`, `e_shstrndx`) are not
/// public. They describe the section header table, so only the image that
/// owns that table sets them, through `finalize` and
/// `set_section_header_offset`. Program header fields stay zero since this
/// crate does not emit segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    ident:             [u8; EI_NIDENT],

    /// Object file type
    pub typ:           FileType,

    /// Target architecture
    pub machine:       Machine,

    /// Object file version, normally `EV_CURRENT`
    pub version:       u32,

    /// Virtual address to which the system first transfers control, or zero
    /// if the file has no entry point.
    pub entry:         u64,

    /// Processor-specific flags, `EF_machine_flag`.
    pub flags:         u32,

    phoff:             u64,
    shoff:             u64,
    ehsize:            u16,
    phentsize:         u16,
    phnum:             u16,
    shentsize:         u16,
    shnum:             u16,
    shstrndx:          u16,
}

impl Header {
    /// A 64-bit little-endian shared object for x86-64, with empty tables.
    pub fn new() -> Header {
        let mut ident = [0u8; EI_NIDENT];

        ident[EI_MAG0..=EI_MAG3].copy_from_slice(ELFMAG);
        ident[EI_CLASS]       = ELFCLASS64;
        ident[EI_DATA]        = ELFDATA2LSB;
        ident[EI_VERSION]     = EV_CURRENT as u8;
        ident[EI_OSABI]       = ELFOSABI_SYSV;
        ident[EI_ABIVERSION]  = 0;

        Header {
            ident:      ident,
            typ:        FileType::SharedObject,
            machine:    Machine::X86_64,
            version:    EV_CURRENT,
            entry:      0,
            flags:      0,
            phoff:      0,
            shoff:      0,
            ehsize:     ELF64_EHDR_SIZE as u16,
            phentsize:  0,
            phnum:      0,
            shentsize:  ELF64_SHDR_SIZE as u16,
            shnum:      0,
            shstrndx:   SHN_UNDEF,
        }
    }

    pub fn ident(&self) -> &[u8; EI_NIDENT] {
        &self.ident
    }

    pub fn os_abi(&self) -> OsAbi {
        OsAbi::from_raw(self.ident[EI_OSABI])
    }

    pub fn set_os_abi(&mut self, abi: OsAbi) {
        self.ident[EI_OSABI] = abi.raw();
    }

    pub fn abi_version(&self) -> u8 {
        self.ident[EI_ABIVERSION]
    }

    pub fn set_abi_version(&mut self, v: u8) {
        self.ident[EI_ABIVERSION] = v;
    }

    pub fn header_size(&self) -> u16 { self.ehsize }
    pub fn section_header_entry_size(&self) -> u16 { self.shentsize }
    pub fn section_header_offset(&self) -> u64 { self.shoff }
    pub fn section_count(&self) -> u16 { self.shnum }
    pub fn string_table_index(&self) -> u16 { self.shstrndx }
    pub fn program_header_offset(&self) -> u64 { self.phoff }
    pub fn program_header_count(&self) -> u16 { self.phnum }

    pub fn set_section_header_offset(&mut self, off: u64) {
        self.shoff = off;
    }

    /// Records the final shape of the section header table. Both values must
    /// fit in 16 bits. Also checks the file type and machine, which are
    /// public and so not checked on assignment.
    pub fn finalize(&mut self, section_count: usize, string_table_index: usize)
        -> ElfResult<()> {
        self.typ.check()?;
        self.machine.check()?;

        let count = FixedWidthValue::new(section_count as i128, Width::Half, false);
        let index = FixedWidthValue::new(string_table_index as i128, Width::Half, false);
        count.check()?;
        index.check()?;

        self.shnum = section_count as u16;
        self.shstrndx = string_table_index as u16;
        Ok(())
    }
}

impl Default for Header {
    fn default() -> Header {
        Header::new()
    }
}

impl Encode for Header {
    const SIZE: usize = ELF64_EHDR_SIZE;

    fn encode_to<W: Write>(&self, w: &mut ElfWriter<W>) -> ElfResult<()> {
        w.write_bytes(&self.ident)?;
        w.write_u16(self.typ.raw())?;
        w.write_u16(self.machine.raw())?;
        w.write_u32(self.version)?;
        w.write_u64(self.entry)?;
        w.write_u64(self.phoff)?;
        w.write_u64(self.shoff)?;
        w.write_u32(self.flags)?;
        w.write_u16(self.ehsize)?;
        w.write_u16(self.phentsize)?;
        w.write_u16(self.phnum)?;
        w.write_u16(self.shentsize)?;
        w.write_u16(self.shnum)?;
        w.write_u16(self.shstrndx)?;
        Ok(())
    }
}
