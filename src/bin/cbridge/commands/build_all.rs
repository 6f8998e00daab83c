//! `cbridge build-all` command

use anyhow::Result;

use crate::cli::BuildAllArgs;
use cbridge::ops::build_all;
use cbridge::util::config::load_default_config;

pub fn execute(args: BuildAllArgs) -> Result<()> {
    let config = load_default_config();

    let artifacts = build_all(&config, &args.objdir, &args.packages)?;

    for artifact in &artifacts {
        let status = if artifact.uses_bridge {
            format!(
                "{} bridge symbol(s), {} directive(s)",
                artifact.stubs.len(),
                artifact.directives.len()
            )
        } else {
            "no bridge".to_string()
        };
        println!("{:<32} {}", artifact.import_path, status);
    }
    Ok(())
}
