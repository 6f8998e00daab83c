//! Core data model of the bridge pipeline.
//!
//! - Build directives and the target they are evaluated against
//! - Foreign identifiers and their native types
//! - The packed call frame shared by generated code and the runtime
//! - Link directives and the per-package artifact that carries them

pub mod ctype;
pub mod directive;
pub mod ident;
pub mod layout;
pub mod link_directive;
pub mod package;

pub use ctype::{CType, ConstValue};
pub use directive::{BuildFlags, Directive, DirectiveKind, Target};
pub use ident::{ForeignIdentifier, IdentKind, Resolved};
pub use layout::{FrameLayout, FrameSlot, SlotSpec};
pub use link_directive::LinkDirective;
pub use package::{PackageArtifact, StubSymbol};
