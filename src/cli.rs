use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "yearzip")]
#[command(about = "Archives aged files into per-year zip containers")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config dir, e.g. ~/.config/yearzip/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Run a single pass, print a summary and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Print the --once summary as JSON (ignored without --once)
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Log debug events
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}
