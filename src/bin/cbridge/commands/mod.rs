//! Command implementations

pub mod build_all;
pub mod dynimport;
pub mod flags;
pub mod generate;
pub mod link;
pub mod linkplan;
