// Tools for manipulating ELF files
// Copyright (C) 2015-present Alex Iadicicco <http://ajitek.net>

//! Error type shared by every part of the crate.

use std::error;
use std::fmt;
use std::io;

pub type ElfResult<T> = Result<T, ElfError>;

#[derive(Debug)]
pub struct ElfError {
    pub kind:      ElfErrorKind,
    pub desc:      &'static str,
    pub detail:    Option<String>,
    cause:         Option<io::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfErrorKind {
    /// A value does not fit the width of the field it is written to.
    EncodingOverflow,
    /// A byte slice handed to a decoder has the wrong length.
    InvalidLength,
    /// A string table entry contains a NUL byte.
    InteriorNul,
    DuplicateSectionName,
    DuplicateSymbolName,
    /// A section was referenced by a name that is not in the table.
    UnknownSection,
    /// Alignment is not 0 or a power of two, or an address is not aligned.
    InvalidAlignment,
    /// A raw value carried by an escape-hatch variant is outside that
    /// variant's range, or does not fit the field it is stored in.
    InvalidRawValue,
    /// A `Local` symbol was added after a symbol with another binding.
    MisorderedSymbol,
    /// The image was serialized without a finalize after its last change.
    NotFinalized,
    /// The output sink reported an error.
    SinkWriteFailure,
}

impl ElfError {
    pub fn new(kind: ElfErrorKind, desc: &'static str) -> ElfError {
        ElfError {
            kind:    kind,
            desc:    desc,
            detail:  None,
            cause:   None,
        }
    }

    pub fn with_detail(mut self, detail: String) -> ElfError {
        self.detail = Some(detail);
        self
    }

    pub fn kind(&self) -> ElfErrorKind {
        self.kind
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(ref detail) => write!(f, "{}: {}", self.desc, detail),
            None => write!(f, "{}", self.desc),
        }
    }
}

impl error::Error for ElfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.cause {
            Some(ref e) => Some(e),
            None => None,
        }
    }
}

impl From<io::Error> for ElfError {
    fn from(e: io::Error) -> ElfError {
        ElfError {
            kind:    ElfErrorKind::SinkWriteFailure,
            desc:    "failed to write to output",
            detail:  Some(e.to_string()),
            cause:   Some(e),
        }
    }
}
