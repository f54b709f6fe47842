//! Configuration sourced from the CLI

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    /// Path to the YAML routing configuration
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Instance name used to tag metrics
    #[arg(long)]
    pub name: String,

    /// Dump the parsed configuration to stdout and exit
    #[arg(long)]
    pub print: bool,

    /// Verbose diagnostic output
    #[arg(long)]
    pub debug: bool,

    /// Run every port's inbound traffic through the SBP framer
    #[arg(long)]
    pub sbp: bool,
}
