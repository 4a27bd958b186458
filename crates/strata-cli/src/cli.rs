use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    about = "Inspect and manage Strata model projects",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot file; overrides the configured one
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List projects
    Projects,
    /// Delete a project with all of its objects and branches
    DeleteProject(DeleteProjectArgs),
    /// Create a project with an empty root and an initial commit
    Init(InitArgs),
    /// List branches and their heads
    Branches(ProjectArgs),
    /// Show commit history, most recent first
    Log(LogArgs),
    /// Print stored records starting from a selected object
    Dump(DumpArgs),
    /// Show a node through the full model layer stack
    Node(NodeArgs),
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(short, long)]
    pub project: String,
}

#[derive(Args, Debug)]
pub struct DeleteProjectArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    pub project: String,
    #[arg(short, long, default_value = "master")]
    pub branch: String,
    #[arg(short, long, default_value = "initial commit")]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    #[arg(short, long)]
    pub project: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[arg(short, long)]
    pub project: String,
    /// Hash prefix, optionally followed by `/relid` segments
    pub selector: String,
    /// How many levels of children to print below the selected object
    #[arg(long, default_value = "0")]
    pub depth: usize,
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    #[arg(short, long)]
    pub project: String,
    pub branch: String,
    /// Node path such as `/a/b`; the root when omitted
    pub path: Option<String>,
}
