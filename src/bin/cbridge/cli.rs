//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cbridge::link::LinkModeSetting;

/// cbridge - call C from managed code through generated bridges
#[derive(Parser)]
#[command(name = "cbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate and compile the bridges of one package
    Generate(GenerateArgs),

    /// Generate several packages in parallel
    BuildAll(BuildAllArgs),

    /// Print dynamic import directives for an executable
    Dynimport(DynimportArgs),

    /// Show the link mode and directives for a program
    Linkplan(LinkplanArgs),

    /// Link a program
    Link(LinkArgs),

    /// Show effective compile/link flags of a package
    Flags(FlagsArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Output directory for generated files and objects
    #[arg(long, default_value = "_obj")]
    pub objdir: PathBuf,

    /// Import path recorded for the package (defaults to its package name)
    #[arg(long)]
    pub import_path: Option<String>,

    /// Source files or package directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Args)]
pub struct BuildAllArgs {
    /// Root output directory; each package gets a subdirectory
    #[arg(long)]
    pub objdir: PathBuf,

    /// Package directories
    #[arg(required = true)]
    pub packages: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DynimportArgs {
    /// Dynamically linked executable
    pub binary: PathBuf,

    /// Write directives to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LinkplanArgs {
    /// Import path of the main package
    #[arg(long)]
    pub main: String,

    /// Link mode (auto, internal, external)
    #[arg(long)]
    pub linkmode: Option<LinkModeSetting>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Artifact directories of every package in the program
    #[arg(required = true)]
    pub artifact_dirs: Vec<PathBuf>,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Import path of the main package
    #[arg(long)]
    pub main: String,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Merged object produced by the managed toolchain
    #[arg(long)]
    pub managed_object: PathBuf,

    /// Link mode (auto, internal, external)
    #[arg(long)]
    pub linkmode: Option<LinkModeSetting>,

    /// Host linker command, split into fields (default: $CC, else gcc)
    #[arg(long)]
    pub extld: Option<String>,

    /// Artifact directories of every package in the program
    #[arg(required = true)]
    pub artifact_dirs: Vec<PathBuf>,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Show only linker flags
    #[arg(long)]
    pub link: bool,

    /// Source files or package directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}
