use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cli-driver",
    version,
    about = "Drive the engine CLI against a running service and report positive/negative checks"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, help = "Config file (default: $CLI_DRIVER_CONFIG, then ./cli-driver.toml)")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Service API url, overrides the config file")]
    pub url: Option<String>,
    #[arg(long, help = "Admin user name")]
    pub user: Option<String>,
    #[arg(long, help = "Admin password")]
    pub password: Option<String>,
    #[arg(long, help = "Per-call tool timeout in seconds (0 disables)")]
    pub timeout_secs: Option<u64>,
    #[arg(long, help = "Run log file")]
    pub log_file: Option<PathBuf>,
    #[arg(long, default_value_t = false, help = "Do not wait for the service before running")]
    pub skip_system_wait: bool,
    #[arg(value_enum, default_value_t = Group::All, help = "Check group to run")]
    pub group: Group,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Group {
    All,
    Account,
    Image,
    #[value(alias = "analysis_archive")]
    AnalysisArchive,
    #[value(alias = "image_deletion")]
    ImageDeletion,
    Evaluate,
    Repo,
    Subscription,
    System,
    #[value(alias = "system_feeds")]
    SystemFeeds,
    Registry,
}

impl Group {
    /// Groups run by `all`, in order.
    pub const DEFAULT_ORDER: [Group; 9] = [
        Group::Account,
        Group::Image,
        Group::AnalysisArchive,
        Group::ImageDeletion,
        Group::Evaluate,
        Group::Repo,
        Group::Subscription,
        Group::System,
        Group::Registry,
    ];

    pub fn expand(self) -> Vec<Group> {
        match self {
            Group::All => Self::DEFAULT_ORDER.to_vec(),
            g => vec![g],
        }
    }
}
