//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use shopcast_domain::Platform;
use std::path::PathBuf;

/// shopcast: rotate catalog products onto Facebook, Instagram and Threads
#[derive(Parser, Debug)]
#[command(name = "shopcast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select the next products and publish them
    Post(PostArgs),

    /// Show rotation progress per partition
    Stats(StatsArgs),

    /// Clear rotation tags for a partition
    Reset(ResetArgs),

    /// List catalog collections and the partitions using them
    Collections(CollectionsArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Number of products to post (clamped to general.max_posts_per_run)
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,

    /// Only select from this partition
    #[arg(long)]
    pub partition: Option<String>,

    /// Post this catalog item instead of the next in rotation; it is not tagged
    #[arg(long, conflicts_with = "count")]
    pub item: Option<String>,

    /// Comma-separated platforms (fb, ig, threads); defaults to publish.default_platforms
    #[arg(long, value_delimiter = ',')]
    pub platforms: Option<Vec<Platform>>,

    /// Render without publishing or tagging
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CollectionsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Partition to reset
    pub partition: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
