//! cbridge - call C from managed code through generated bridges
//!
//! This crate provides the library behind the `cbridge` tool: identifier
//! classification and layout extraction driven by the system C compiler,
//! bridge generation, link-directive emission and link-mode resolution,
//! plus the runtime pieces that marshal calls across the boundary.

pub mod builder;
pub mod codegen;
pub mod core;
pub mod dwarf;
pub mod frontend;
pub mod link;
pub mod ops;
pub mod probe;
pub mod runtime;
pub mod util;

pub use core::{
    BuildFlags, CType, ForeignIdentifier, IdentKind, LinkDirective, PackageArtifact, Target,
};
pub use link::{LinkMode, LinkPlan};
pub use util::config::Config;
