//! `cbridge flags` command

use anyhow::Result;

use crate::cli::FlagsArgs;
use cbridge::ops::{load_package, package_flags};
use cbridge::util::config::load_default_config;

pub fn execute(args: FlagsArgs) -> Result<()> {
    let config = load_default_config();

    let files = load_package(&args.inputs)?;
    let flags = package_flags(&config, &files)?;

    let print = |name: &str, values: &[String]| {
        if !values.is_empty() {
            println!("{}: {}", name, values.join(" "));
        }
    };

    if !args.link {
        print("CPPFLAGS", &flags.cppflags);
        print("CFLAGS", &flags.cflags);
        print("CXXFLAGS", &flags.cxxflags);
    }
    print("LDFLAGS", &flags.ldflags);
    Ok(())
}
