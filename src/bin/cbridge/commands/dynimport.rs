//! `cbridge dynimport` command

use anyhow::Result;

use crate::cli::DynimportArgs;
use cbridge::core::link_directive::render;
use cbridge::ops::dynimport;
use cbridge::util::fs::write_string;

pub fn execute(args: DynimportArgs) -> Result<()> {
    let directives = dynimport(&args.binary)?;
    let text = render(&directives);

    match args.output {
        Some(path) => write_string(&path, &text)?,
        None => print!("{}", text),
    }
    Ok(())
}
