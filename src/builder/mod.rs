//! Native toolchain driver.
//!
//! Every compiler invocation the pipeline makes (probes, layout objects,
//! host objects, the dynamic-import probe link) is described as a
//! [`CommandSpec`] by a [`Toolchain`].

pub mod toolchain;

pub use toolchain::{detect_toolchain, CommandSpec, GccToolchain, Toolchain, ToolchainPlatform};
