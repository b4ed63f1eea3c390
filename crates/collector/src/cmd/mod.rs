//! CLI subcommands

pub mod send;
pub mod serve;
