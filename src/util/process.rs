//! Subprocess execution for the native toolchain and helper tools.
//!
//! Every compiler, linker and package-config invocation goes through
//! [`ProcessBuilder`], which captures both output streams so failures can
//! be reported verbatim.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

use anyhow::{Context, Result};

use crate::util::errors::BridgeError;

/// Builder for one child process.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    /// Applied in insertion order
    env: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Feed data to the child's stdin (probe programs are piped this way).
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Stdin is written from a separate thread so a child that fills its
    /// output pipe before reading all of its input cannot deadlock us.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let writer = match (child.stdin.take(), self.stdin.clone()) {
            (Some(mut pipe), Some(data)) => Some(thread::spawn(move || pipe.write_all(&data))),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(result) => result.with_context(|| {
                    format!("failed to write stdin of `{}`", self.program.display())
                })?,
                Err(_) => anyhow::bail!("stdin writer for `{}` panicked", self.program.display()),
            }
        }

        Ok(output)
    }

    /// Execute and require a zero exit status.
    ///
    /// A non-zero exit becomes [`BridgeError::ExternalToolFailure`] carrying
    /// both captured streams.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            return Err(BridgeError::ExternalToolFailure {
                command: self.display_command(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(output)
    }

    /// Shell-like rendering for logs and error messages. Arguments that
    /// contain whitespace or quotes are single-quoted.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().map(|a| shell_quote(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find a C compiler: `$CC` first, then the usual suspects on PATH.
pub fn find_c_compiler() -> Option<PathBuf> {
    let from_env = std::env::var("CC").ok().and_then(|cc| {
        // $CC may carry flags ("gcc -m32"); only the program is looked up here.
        cc.split_whitespace().next().and_then(find_executable)
    });
    from_env.or_else(|| ["cc", "gcc", "clang"].into_iter().find_map(find_executable))
}
