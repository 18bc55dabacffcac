use cathnet::engine::config::Accelerator;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "cathnet CLI - Train and evaluate neural network potentials on the mdCATH dataset of protein domain trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for tensor and data computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a potential: provision the dataset, fit, then evaluate the best snapshot.
    Train(TrainArgs),
    /// Evaluate a finished run on its test split.
    Test(TestArgs),
    /// Manage the local directory that holds mdCATH domain files.
    Data(DataArgs),
}

/// Arguments for the `train` subcommand.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// Path to a run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Dataset Overrides ---
    /// Domains to train on, comma separated (e.g., 1abcA00,2defB01).
    #[arg(short, long = "domain", value_name = "ID", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Simulation temperatures in kelvin, comma separated.
    #[arg(short, long = "temperature", value_name = "K", value_delimiter = ',')]
    pub temperatures: Vec<u32>,

    /// Keep every N-th frame of each trajectory.
    #[arg(long, value_name = "INT")]
    pub frame_stride: Option<usize>,

    /// Directory holding the domain files. Defaults to the managed data directory.
    #[arg(long, value_name = "PATH")]
    pub data_root: Option<PathBuf>,

    /// Base URL or directory that missing domain files are fetched from.
    #[arg(long, value_name = "URL_OR_PATH", conflicts_with = "offline")]
    pub remote_url: Option<String>,

    /// Never fetch; every domain file must already be present.
    #[arg(long)]
    pub offline: bool,

    // --- Training Overrides ---
    /// Directory for metrics, snapshots and the resolved configuration.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    #[arg(short = 'e', long, value_name = "INT")]
    pub num_epochs: Option<usize>,

    #[arg(short = 'b', long, value_name = "INT")]
    pub batch_size: Option<usize>,

    /// Peak learning rate.
    #[arg(long, value_name = "FLOAT")]
    pub lr: Option<f64>,

    /// Floating point precision in bits (32 or 64).
    #[arg(long, value_name = "BITS")]
    pub precision: Option<u32>,

    /// Where to compute: 'cpu' or 'gpu'.
    #[arg(long, value_name = "NAME")]
    pub accelerator: Option<Accelerator>,

    /// Accelerator device ordinals, comma separated.
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub devices: Vec<usize>,

    /// Initialize the weights from an existing snapshot.
    #[arg(long, value_name = "PATH")]
    pub load_model: Option<PathBuf>,

    /// Seed for the data split and for weight initialization.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file and flags.
    /// Can be used multiple times. Example: -S training.lr-patience=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `test` subcommand.
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Log directory of the run to evaluate.
    #[arg(required = true, value_name = "LOG_DIR")]
    pub log_dir: PathBuf,

    /// Snapshot to evaluate instead of the best retained one.
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// Never fetch; every domain file must already be present.
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the `data` subcommand.
#[derive(Args, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

/// Available commands for data management.
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Fetch domain files into the local data directory.
    Download {
        /// Base URL or directory holding `mdcath_dataset_{domain}.bin.zst` files.
        #[arg(long, required = true, value_name = "URL_OR_PATH")]
        remote_url: String,
        /// Domains to fetch, comma separated.
        #[arg(short, long = "domain", required = true, value_name = "ID", value_delimiter = ',')]
        domains: Vec<String>,
        /// Fetch again even when a file is already present.
        #[arg(long)]
        force: bool,
    },
    /// Show the absolute path to the local data directory.
    Path,
    /// Set a custom absolute path for the local data directory.
    SetPath {
        /// The new path to use for storing data files.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Reset the data path to its default, OS-specific location.
    ResetPath,
}
