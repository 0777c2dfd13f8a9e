// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! This crate builds 64-bit ELF files from scratch and writes them out.
//!
//! There is a low level module, `format`, with constants copied directly out
//! of the ELF format manual, and a set of more Rust-like structures built on
//! top of it: the file `header`, the section header table in `section`, the
//! symbol table in `symbol` and string tables in `strtab`. Every field is
//! written through `value::FixedWidthValue`, which refuses values that do
//! not fit their declared width instead of truncating them.
//!
//! The `elf` module ties it together. An `ElfImage` collects sections and
//! symbols, works out the file layout when it is finalized, and serializes
//! to a byte buffer, any `Write` sink or a file on disk.
//!
//! ```no_run
//! use elfbuild::{ElfImage, Symbol, SymbolBinding, SymbolType};
//!
//! # fn main() -> elfbuild::ElfResult<()> {
//! let mut image = ElfImage::new()?;
//! image.add_symbol("main", Symbol::new()
//!     .with_binding(SymbolBinding::Global)?
//!     .with_type(SymbolType::Func)?)?;
//! image.finalize()?;
//! image.write_to_file("out.so")?;
//! # Ok(())
//! # }
//! ```
//!
//! Only writing is supported. Reading ELF files back in, program headers and
//! relocations are not.

pub mod format;
pub mod error;
pub mod value;
pub mod writer;
pub mod header;
pub mod strtab;
pub mod section;
pub mod symbol;
pub mod elf;

pub use error::{ElfError, ElfErrorKind, ElfResult};
pub use value::{Endian, FixedWidthValue, Width};
pub use writer::{ElfWriter, Encode};
pub use header::{FileType, Header, Machine, OsAbi};
pub use strtab::StringTable;
pub use section::{SectionFlags, SectionHeaderEntry, SectionHeaderTable, SectionType};
pub use symbol::{SectionRef, Symbol, SymbolBinding, SymbolTable, SymbolType};
pub use elf::{ElfImage, ImageConfig, STRTAB_NAME, SYMTAB_NAME};
