//! `cbridge link` command

use anyhow::Result;

use crate::cli::LinkArgs;
use cbridge::link::LinkMode;
use cbridge::ops::{link, LinkOptions};
use cbridge::util::config::load_default_config;

pub fn execute(args: LinkArgs) -> Result<()> {
    let config = load_default_config();

    let opts = LinkOptions {
        main: args.main,
        artifact_dirs: args.artifact_dirs,
        output: args.output,
        managed_object: args.managed_object,
        mode: args.linkmode,
        extld: args.extld,
    };
    let plan = link(&config, &opts)?;

    match plan.mode {
        LinkMode::External => println!("Linked {} ({})", opts.output.display(), plan.reason),
        LinkMode::Internal => println!(
            "Wrote internal link plan to {} ({})",
            opts.output.display(),
            plan.reason
        ),
    }
    Ok(())
}
