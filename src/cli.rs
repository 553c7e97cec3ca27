use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hades")]
#[command(author = "Hades Contributors")]
#[command(version)]
#[command(about = "Administer and test multi-host Hadoop clusters", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "config.json", env = "HADES_CONFIG")]
    pub config: PathBuf,

    /// Path to the cluster manifest
    #[arg(long, global = true, default_value = "cluster.json", env = "HADES_CLUSTER")]
    pub cluster: PathBuf,

    /// Overwrite the command prefix of the config
    #[arg(short, long, global = true)]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty config file
    Init,

    /// Discover the roles of a cluster and write the cluster manifest
    Discover(DiscoverArgs),

    /// Compile Hadoop modules and copy their jars to the jar directory
    Compile(CompileArgs),

    /// Read the logs of the selected roles
    Log(LogArgs),

    /// Print the status and metrics of the cluster
    Status,

    /// Restart the selected roles
    Restart(RestartArgs),

    /// Update properties of a config file on the selected roles
    UpdateConfig(UpdateConfigArgs),

    /// Print a config file of the selected roles
    GetConfig(GetConfigArgs),

    /// Copy local files or module jars to the selected roles
    Distribute(DistributeArgs),

    /// Submit an example application to the cluster
    RunApp(RunAppArgs),

    /// Run a registered script against the cluster
    RunScript(RunScriptArgs),

    /// YARN scheduler queues
    #[command(subcommand)]
    Yarn(YarnCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Discovery
// ============================================================================

#[derive(Clone, Copy, ValueEnum)]
pub enum ClusterType {
    /// Cloudera Manager managed cluster
    Cm,
    /// Docker Compose cluster from a Hadock checkout
    Hadock,
    /// Plain hosts behind a ResourceManager
    Standard,
}

#[derive(Args)]
pub struct DiscoverArgs {
    /// Cluster type, the configured one when omitted
    #[arg(short = 't', long = "type", value_enum)]
    pub cluster_type: Option<ClusterType>,

    /// Cloudera Manager or ResourceManager address
    #[arg(long)]
    pub host: Option<String>,

    /// Cloudera Manager user
    #[arg(short, long)]
    pub username: Option<String>,

    /// Cloudera Manager password
    #[arg(long, env = "HADES_CM_PASSWORD")]
    pub password: Option<String>,

    /// Hadock repository path
    #[arg(short = 'd', long)]
    pub hadock_path: Option<String>,

    /// Store the cluster settings in the config file as well
    #[arg(long)]
    pub save: bool,
}

// ============================================================================
// Build
// ============================================================================

#[derive(Args)]
pub struct CompileArgs {
    /// Compile only the modules with uncommitted changes
    #[arg(long)]
    pub changed: bool,

    /// Deploy the compiled jars to the cluster
    #[arg(short, long)]
    pub deploy: bool,

    /// Do not copy the compiled jars to the jar directory
    #[arg(short, long)]
    pub no_copy: bool,

    /// Module to add to the compilation (repeatable)
    #[arg(short, long = "module")]
    pub modules: Vec<String>,
}

// ============================================================================
// Role Operations
// ============================================================================

#[derive(Args)]
pub struct LogArgs {
    /// Role selector, e.g. `Yarn/NodeManager`
    pub selector: String,

    /// Follow the log files
    #[arg(short, long)]
    pub follow: bool,

    /// Only read the last N lines
    #[arg(short, long)]
    pub tail: Option<usize>,

    /// Only show lines containing this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Download the log files to the current directory
    #[arg(short, long)]
    pub download: bool,
}

#[derive(Args)]
pub struct RestartArgs {
    /// Role selector, every role when empty
    #[arg(default_value = "")]
    pub selector: String,

    /// Check that NodeManagers got a new process and force restart them otherwise
    #[arg(short, long)]
    pub guarantee: bool,

    /// Seconds to wait after a forced start
    #[arg(long, default_value = "0")]
    pub sleep: u64,

    /// Restart the whole cluster instead of the selected roles
    #[arg(long, conflicts_with_all = ["guarantee", "selector"])]
    pub all: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct UpdateConfigArgs {
    /// Role selector, every role when empty
    #[arg(default_value = "")]
    pub selector: String,

    /// Config file to update, e.g. `yarn-site`
    #[arg(short, long)]
    pub file: String,

    /// Property name (repeatable, paired with --value)
    #[arg(long = "property")]
    pub properties: Vec<String>,

    /// Property value (repeatable, paired with --property)
    #[arg(long = "value")]
    pub values: Vec<String>,

    /// Take the properties of a local XML file
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Property to strip a value from, as `name=value` (repeatable)
    #[arg(short, long = "remove")]
    pub removals: Vec<String>,

    /// Do not keep the downloaded config files
    #[arg(short, long)]
    pub no_backup: bool,

    /// Start from an empty document when the file is missing
    #[arg(long)]
    pub allow_empty: bool,

    /// Print the resulting changes without uploading anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct GetConfigArgs {
    /// Role selector, every role when empty
    #[arg(default_value = "")]
    pub selector: String,

    /// Config file to read, e.g. `yarn-site`
    #[arg(short, long)]
    pub file: String,

    /// Only print these properties (repeatable)
    #[arg(long = "property")]
    pub properties: Vec<String>,
}

#[derive(Args)]
pub struct DistributeArgs {
    /// Role selector, every role when empty
    #[arg(default_value = "")]
    pub selector: String,

    /// Local file to copy (repeatable, paired with --dest)
    #[arg(short, long = "source")]
    pub sources: Vec<PathBuf>,

    /// Remote destination (repeatable, paired with --source)
    #[arg(short, long = "dest")]
    pub dests: Vec<PathBuf>,

    /// Hadoop module whose jar replaces the deployed one (repeatable)
    #[arg(short, long = "module")]
    pub modules: Vec<String>,
}

#[derive(Args)]
pub struct RunAppArgs {
    /// Application: distributed-shell or mapreduce
    pub app: String,

    /// Command run by the application
    #[arg(long)]
    pub cmd: Option<String>,

    /// Queue the application is submitted to
    #[arg(short = 'Q', long)]
    pub queue: Option<String>,

    /// Roles to submit from
    #[arg(short, long, default_value = "Yarn/ResourceManager")]
    pub selector: String,
}

#[derive(Args)]
pub struct RunScriptArgs {
    /// Script name, `--list` shows the registered ones
    #[arg(required_unless_present = "list")]
    pub name: Option<String>,

    /// List the registered scripts
    #[arg(short, long)]
    pub list: bool,
}

// ============================================================================
// YARN Commands
// ============================================================================

#[derive(Subcommand)]
pub enum YarnCommand {
    /// Print the capacity scheduler queue tree
    Queues,

    /// Print the cluster metrics
    Info,

    /// Update properties of a queue
    UpdateQueue(QueueArgs),

    /// Add a queue
    AddQueue(QueueArgs),

    /// Remove a queue
    RemoveQueue {
        /// Queue path, e.g. `root.default`
        #[arg(short = 'Q', long)]
        queue: String,

        /// Print the mutation without sending it
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Update a global scheduler property
    GlobalUpdate {
        /// Property name
        #[arg(short, long)]
        key: String,

        /// Property value
        #[arg(long)]
        value: String,

        /// Print the mutation without sending it
        #[arg(short, long)]
        dry_run: bool,
    },
}

#[derive(Args)]
pub struct QueueArgs {
    /// Queue path, e.g. `root.default`
    #[arg(short = 'Q', long)]
    pub queue: String,

    /// Property name (repeatable, paired with --value)
    #[arg(long = "property")]
    pub properties: Vec<String>,

    /// Property value (repeatable, paired with --property)
    #[arg(long = "value")]
    pub values: Vec<String>,

    /// Print the mutation without sending it
    #[arg(short, long)]
    pub dry_run: bool,
}
