use std::path::PathBuf;

use clap::Parser;

use crate::registry::Credentials;

#[derive(Parser, Debug)]
#[command(
    name = "license-bundlr",
    about = "Resolve licenses of pinned Python dependencies and bundle their license texts",
    version
)]
pub struct Cli {
    /// Requirements files, or directories searched for files named *requirements*
    #[arg(default_value = ".", num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for Index.csv, license groups and the text bundle
    #[arg(short, long, default_value = "license-output", value_name = "DIR")]
    pub output: PathBuf,

    /// GitHub credentials formatted "user:token", used for the license API
    #[arg(short = 'g', long, value_name = "USER:TOKEN")]
    pub github_credentials: Option<Credentials>,

    /// Config file [default: ./.license-bundlr/config.toml, fallback ~/.config/license-bundlr/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Package registry base URL (overrides the config file)
    #[arg(long, value_name = "URL")]
    pub registry_url: Option<String>,

    /// Debug logging and a per-package table
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
