//! Toolchain abstraction for the native C compiler.
//!
//! The bridge drives the compiler in five ways: a diagnostics-only pass
//! over a probe program, a debug-info compile of a second probe, a macro
//! dump, plain compilation of generated sources and the final link.
//!
//! Toolchain detection priority:
//! 1. `[toolchain] cc` in `.cbridge/config.toml` or `~/.cbridge/config.toml`
//! 2. The `CC` environment variable (split into program and flags)
//! 3. Auto-detection (searching PATH for cc, gcc, clang)

use std::path::{Path, PathBuf};

use crate::util::process::ProcessBuilder;

mod detect;
mod gcc;

pub use detect::{detect_compiler_family, detect_toolchain, toolchain_from_command};
pub use gcc::GccToolchain;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
    /// Data piped to the child's standard input
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Pipe `data` to the command's standard input.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Turn the spec into a runnable process.
    pub fn into_process(self) -> ProcessBuilder {
        let mut process = ProcessBuilder::new(&self.program).args(&self.args);
        for (key, value) in &self.env {
            process = process.env(key, value);
        }
        if let Some(data) = self.stdin {
            process = process.stdin(data);
        }
        process
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Additional compiler flags (CPPFLAGS then CFLAGS)
    pub cflags: Vec<String>,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output executable
    pub output: PathBuf,
    /// Additional linker flags, in order
    pub ldflags: Vec<String>,
}

/// The family of a toolchain. Diagnostic phrasing is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
}

impl ToolchainPlatform {
    /// Get the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
        }
    }

    pub fn is_clang(&self) -> bool {
        matches!(self, ToolchainPlatform::Clang | ToolchainPlatform::AppleClang)
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    /// Get the toolchain platform.
    fn platform(&self) -> ToolchainPlatform;

    /// Get the C compiler path.
    fn compiler_path(&self) -> &Path;

    /// Check C source read from stdin, producing diagnostics only.
    fn syntax_check_command(&self, cflags: &[String], source: &str) -> CommandSpec;

    /// Compile C source from stdin to an object with full debug information.
    fn debug_object_command(&self, cflags: &[String], source: &str, output: &Path)
        -> CommandSpec;

    /// Preprocess C source from stdin and dump every macro definition.
    fn list_defines_command(&self, cflags: &[String], source: &str) -> CommandSpec;

    /// Compile a generated source file to an object.
    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// Link objects into an executable.
    fn link_exe_command(&self, input: &LinkInput) -> CommandSpec;

    /// Get the object file extension.
    fn object_extension(&self) -> &str;
}
