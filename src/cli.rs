use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "regbook",
    version,
    about = "Local regulation compendium parsing and import tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Parse(ParseArgs),
    Import(ImportArgs),
    Retry(RetryArgs),
    Bench(BenchArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/regbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/regbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub import_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub error_report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    #[arg(long, default_value = ".cache/regbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub error_report_path: Option<PathBuf>,

    #[arg(long)]
    pub retry_report_path: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 2)]
    pub base_delay_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/regbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    pub checkpoint_interval: usize,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/regbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
