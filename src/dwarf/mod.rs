//! Native type layout and constant extraction from debug information.
//!
//! A probe translation unit is compiled to an object file with DWARF
//! enabled. The object is never linked; its debug sections are decoded
//! directly and the probe variables and enumerators give back each
//! identifier's type and value.

pub mod consts;
pub mod die;
pub mod extract;
pub mod objfile;
pub mod reader;
pub mod types;

use thiserror::Error;

pub use die::{AttrValue, Die, DieTree};
pub use extract::{layout_program, resolve_layouts, LayoutEntry, LayoutExtractor};
pub use objfile::{DebugSections, DATA_ARRAY_SYMBOL};
pub use types::TypeBuilder;

/// Failures while decoding debug information.
#[derive(Debug, Error)]
pub enum DwarfError {
    #[error("{section} is truncated at offset {offset:#x}")]
    Truncated { section: &'static str, offset: usize },

    #[error("unsupported DWARF form {0:#x}")]
    UnsupportedForm(u64),

    #[error("unsupported DWARF version {0}")]
    UnsupportedVersion(u16),

    #[error("object has no {0} section")]
    MissingSection(&'static str),

    #[error("unknown abbreviation code {code} at offset {offset:#x}")]
    BadAbbrev { code: u64, offset: u64 },

    #[error("reference to missing entry at offset {0:#x}")]
    BadReference(u64),

    #[error("cannot read object file: {0}")]
    Object(String),

    #[error("{0}")]
    Type(String),
}
