//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Read a file to bytes, with nice error messages.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Expand a mix of files and package directories into managed source files.
///
/// Directories contribute their immediate `*.go` files (test files excluded),
/// sorted by name so that generation order is deterministic.
pub fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| is_managed_source(p))
                .collect();
            found.sort();
            sources.extend(found);
        } else if input.exists() {
            sources.push(input.clone());
        } else {
            anyhow::bail!("no such file or directory: {}", input.display());
        }
    }

    Ok(sources)
}

fn is_managed_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.is_file() && name.ends_with(".go") && !name.ends_with("_test.go")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_sources_sorted_without_tests() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.go"), "package p").unwrap();
        fs::write(tmp.path().join("a.go"), "package p").unwrap();
        fs::write(tmp.path().join("a_test.go"), "package p").unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let sources = collect_sources(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.go", "b.go"]);
    }

    #[test]
    fn test_write_string_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("obj/_cgo_gotypes.go");
        write_string(&path, "package p\n").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "package p\n");
    }
}
