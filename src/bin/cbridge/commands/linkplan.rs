//! `cbridge linkplan` command

use anyhow::Result;

use crate::cli::LinkplanArgs;
use cbridge::ops::linkplan;
use cbridge::util::config::load_default_config;

pub fn execute(args: LinkplanArgs) -> Result<()> {
    let config = load_default_config();

    let plan = linkplan(&config, &args.main, &args.artifact_dirs, args.linkmode)?;

    if args.json {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    println!("Link mode: {}", plan.mode);
    println!("  Reason: {}", plan.reason);
    println!();

    println!("Packages (dependencies first):");
    for (i, package) in plan.packages.iter().enumerate() {
        println!("  {}. {}", i + 1, package);
    }

    if !plan.host_objects.is_empty() {
        println!();
        println!("Host objects:");
        for obj in &plan.host_objects {
            println!("  {}", obj.display());
        }
    }

    if !plan.directives.is_empty() {
        println!();
        println!("Directives:");
        for d in &plan.directives {
            println!("  {}", d.directive);
            println!("     From: {}", d.package);
        }
    }
    Ok(())
}
