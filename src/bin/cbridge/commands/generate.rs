//! `cbridge generate` command

use anyhow::Result;

use crate::cli::GenerateArgs;
use cbridge::ops::{generate, GenerateOptions};
use cbridge::util::config::load_default_config;

pub fn execute(args: GenerateArgs) -> Result<()> {
    let config = load_default_config();

    let opts = GenerateOptions {
        inputs: args.inputs,
        objdir: args.objdir,
        import_path: args.import_path,
    };
    let result = generate(&config, &opts)?;

    for path in &result.written {
        println!("{}", path.display());
    }
    Ok(())
}
