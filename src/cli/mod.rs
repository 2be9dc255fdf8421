//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Encrypted KYC API test harness
#[derive(Parser, Debug)]
#[command(name = "kyc-apitest")]
#[command(version)]
#[command(about = "Run signed and encrypted KYC API test suites")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Named environment from the configuration file
    #[arg(short, long, global = true)]
    pub env: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a suite once
    Run(RunArgs),

    /// Run a suite repeatedly across a worker pool
    Concurrent(ConcurrentArgs),

    /// Print the execution order of a suite
    Order {
        /// Suite file (YAML)
        suite: String,
    },

    /// Generate synthetic 18-digit id numbers
    GenId {
        /// How many ids to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Region code mode (province, district)
        #[arg(short, long, default_value = "district")]
        mode: String,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate an RSA key pair
    Keygen {
        /// Modulus size in bits
        #[arg(short, long, default_value = "2048")]
        bits: usize,

        /// Write the pair to a key file (YAML) instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Key slot to fill in the output file (channel, platform)
        #[arg(long, default_value = "channel")]
        slot: String,
    },

    /// Manage configuration
    Config(ConfigArgs),
}

/// Options shared by single and concurrent runs
#[derive(Parser, Debug)]
pub struct SuiteArgs {
    /// Suite file (YAML)
    pub suite: String,

    /// Prefix for relative case paths
    #[arg(long)]
    pub base_url: Option<String>,

    /// Key material file (YAML)
    #[arg(short, long)]
    pub keys: Option<String>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Mark cases SKIPPED when a dependency did not pass
    #[arg(long)]
    pub skip_on_dependency_failure: bool,

    /// Region code mode for generated ids (province, district)
    #[arg(long, default_value = "district")]
    pub id_mode: String,

    /// Seed for reproducible fixture data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write a YAML snapshot of the run
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Export failure details as CSV
    #[arg(long)]
    pub failures_csv: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,
}

/// Arguments for the concurrent command
#[derive(Parser, Debug)]
pub struct ConcurrentArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Number of full-suite runs
    #[arg(short, long)]
    pub repeat: Option<u32>,

    /// Worker pool size
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Success ratio (0..1) the runs must exceed
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

/// Arguments for configuration management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./kyc-apitest.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variable overrides instead
        #[arg(long = "env-vars", id = "show_env")]
        env_vars: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file
        file: Option<String>,
    },

    /// List supported environment variables
    EnvHelp,
}
