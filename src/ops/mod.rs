//! High-level operations.
//!
//! This module contains the implementation of cbridge commands.

pub mod dynimport;
pub mod generate;
pub mod link;

pub use dynimport::{dynimport, probe_imports};
pub use generate::{
    build_all, generate, load_package, package_flags, GenerateOptions, GenerateResult,
};
pub use link::{link, linkplan, LinkOptions};
