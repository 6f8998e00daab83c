//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::directive::split_quoted;
use crate::util::config::Config;
use crate::util::process::{find_c_compiler, find_executable};

use super::{GccToolchain, Toolchain, ToolchainPlatform};

/// Detect the available toolchain.
///
/// Tries to find a C compiler with the following priority:
/// 1. Config file (`[toolchain] cc`)
/// 2. The `CC` environment variable
/// 3. cc/gcc/clang on PATH
pub fn detect_toolchain(config: &Config) -> Result<Box<dyn Toolchain>> {
    if let Some(cc) = &config.toolchain.cc {
        if let Some(toolchain) = toolchain_from_command(&cc.display().to_string())? {
            tracing::info!("Using C compiler from config: {}", cc.display());
            return Ok(toolchain);
        }
        tracing::warn!("Configured C compiler not found: {}", cc.display());
    }

    if let Ok(cc) = std::env::var("CC") {
        if let Some(toolchain) = toolchain_from_command(&cc)? {
            return Ok(toolchain);
        }
        tracing::warn!("CC is set but `{}` was not found", cc);
    }

    if let Some(cc) = find_c_compiler() {
        let family = detect_compiler_family(&cc)?;
        tracing::debug!("Detected {} at {}", family.as_str(), cc.display());
        return Ok(Box::new(GccToolchain::new(cc, Vec::new(), family)));
    }

    bail!(
        "no C compiler found\n\
         \n\
         cbridge requires a C compiler (gcc or clang).\n\
         Set the CC environment variable, configure `[toolchain] cc`,\n\
         or install a compiler."
    )
}

/// Build a toolchain from a command line such as `gcc -m32`.
///
/// Returns `None` when the program cannot be found.
pub fn toolchain_from_command(command: &str) -> Result<Option<Box<dyn Toolchain>>> {
    let fields = split_quoted(command).map_err(|e| anyhow::anyhow!("invalid CC `{}`: {}", command, e))?;
    let Some((program, base_args)) = fields.split_first() else {
        return Ok(None);
    };

    let path = PathBuf::from(program);
    let cc = if path.is_absolute() {
        if !path.exists() {
            return Ok(None);
        }
        path
    } else {
        match find_executable(program) {
            Some(found) => found,
            None => return Ok(None),
        }
    };

    let family = detect_compiler_family(&cc)?;
    Ok(Some(Box::new(GccToolchain::new(
        cc,
        base_args.to_vec(),
        family,
    ))))
}

/// Detect compiler family from the binary name or `--version` output.
pub fn detect_compiler_family(cc: &Path) -> Result<ToolchainPlatform> {
    // Check binary name first
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.contains("clang") {
        // Could be Apple Clang or regular Clang
        return Ok(detect_clang_variant(cc));
    } else if name.contains("gcc") {
        return Ok(ToolchainPlatform::Gcc);
    }

    // Try to detect from --version output
    let output = std::process::Command::new(cc).arg("--version").output();

    if let Ok(output) = output {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("clang") {
            return Ok(detect_clang_variant(cc));
        } else if stdout.contains("gcc") || stdout.contains("free software foundation") {
            return Ok(ToolchainPlatform::Gcc);
        }
    }

    // Default to GCC
    Ok(ToolchainPlatform::Gcc)
}

/// Detect if Clang is Apple Clang or regular Clang.
fn detect_clang_variant(cc: &Path) -> ToolchainPlatform {
    let output = std::process::Command::new(cc).arg("--version").output();

    if let Ok(output) = output {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("apple") {
            return ToolchainPlatform::AppleClang;
        }
    }

    ToolchainPlatform::Clang
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_compiler_is_none() {
        let tc = toolchain_from_command("/nonexistent/bin/cc-missing -m32").unwrap();
        assert!(tc.is_none());
        assert!(toolchain_from_command("").unwrap().is_none());
    }

    #[test]
    fn test_family_from_name() {
        assert_eq!(
            detect_compiler_family(Path::new("/opt/x86_64-linux-gnu-gcc")).unwrap(),
            ToolchainPlatform::Gcc
        );
    }
}
