//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use super::{CommandSpec, CompileInput, LinkInput, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Flags that are part of the compiler command itself (`$CC="gcc -m32"`)
    pub base_args: Vec<String>,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, base_args: Vec<String>, family: ToolchainPlatform) -> Self {
        GccToolchain {
            cc,
            base_args,
            family,
        }
    }

    fn base(&self) -> CommandSpec {
        // Diagnostics are parsed, so keep them plain and untranslated.
        CommandSpec::new(&self.cc)
            .args(self.base_args.iter().cloned())
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .arg("-fdiagnostics-color=never")
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self) -> &Path {
        &self.cc
    }

    fn syntax_check_command(&self, cflags: &[String], source: &str) -> CommandSpec {
        self.base()
            .args(cflags.iter().cloned())
            .args(["-fsyntax-only", "-Wall", "-xc", "-"])
            .stdin(source)
    }

    fn debug_object_command(
        &self,
        cflags: &[String],
        source: &str,
        output: &Path,
    ) -> CommandSpec {
        let mut cmd = self
            .base()
            .args(cflags.iter().cloned())
            .args(["-w", "-gdwarf-4", "-O0", "-fno-eliminate-unused-debug-types"]);
        if self.family.is_clang() {
            cmd = cmd.arg("-fstandalone-debug");
        }
        cmd.args(["-c", "-o"])
            .arg(output.display().to_string())
            .args(["-xc", "-"])
            .stdin(source)
    }

    fn list_defines_command(&self, cflags: &[String], source: &str) -> CommandSpec {
        self.base()
            .args(cflags.iter().cloned())
            .args(["-E", "-dM", "-xc", "-"])
            .stdin(source)
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = self.base();

        // Compile only
        cmd = cmd.args(["-c", "-fPIC", "-O2", "-g"]);

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Input and output
        cmd = cmd.arg(input.source.display().to_string());
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        cmd
    }

    fn link_exe_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = self.base();

        // Output
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        // Object files
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Linker flags keep their order; it matters to the native linker.
        cmd = cmd.args(input.ldflags.iter().cloned());

        cmd
    }

    fn object_extension(&self) -> &str {
        "o"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcc() -> GccToolchain {
        GccToolchain::new(
            PathBuf::from("/usr/bin/gcc"),
            vec!["-m64".to_string()],
            ToolchainPlatform::Gcc,
        )
    }

    #[test]
    fn test_syntax_check_reads_stdin() {
        let cmd = gcc().syntax_check_command(&["-DX=1".to_string()], "int x;");
        assert_eq!(cmd.args.first().map(String::as_str), Some("-m64"));
        assert!(cmd.args.contains(&"-fsyntax-only".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("-"));
        assert_eq!(cmd.stdin.as_deref(), Some("int x;".as_bytes()));
    }

    #[test]
    fn test_debug_object_flags() {
        let cmd = gcc().debug_object_command(&[], "", Path::new("/tmp/probe.o"));
        assert!(cmd.args.contains(&"-gdwarf-4".to_string()));
        assert!(cmd.args.contains(&"/tmp/probe.o".to_string()));
        assert!(!cmd.args.contains(&"-fstandalone-debug".to_string()));
    }

    #[test]
    fn test_link_preserves_flag_order() {
        let input = LinkInput {
            objects: vec![PathBuf::from("go.o"), PathBuf::from("000000.o")],
            output: PathBuf::from("app"),
            ldflags: vec!["-lpng".to_string(), "-lcairo".to_string()],
        };
        let cmd = gcc().link_exe_command(&input);
        let tail: Vec<&str> = cmd.args.iter().rev().take(2).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["-lpng", "-lcairo"]);
    }
}
