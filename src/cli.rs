use clap::{Parser, Subcommand, ValueEnum};

/// GDDP - Dependency-driven builder for derived climate-indicator rasters
///
/// Derives indicator rasters from NEX-GDDP and LOCA daily projections,
/// building only what the remote store does not already hold.
#[derive(Parser, Debug)]
#[command(name = "gddp")]
#[command(author = "GDDP Processing Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-driven builder for derived climate-indicator rasters", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Store, cache and logging arguments shared across commands
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "GDDP_CONFIG")]
    pub config: Option<String>,

    /// Remote bucket holding published artifacts
    #[arg(long, env = "GDDP_BUCKET")]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, env = "GDDP_PREFIX")]
    pub prefix: Option<String>,

    /// Object store endpoint (https://... or file:///...)
    #[arg(long, env = "GDDP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Signing region for S3 credentials
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// S3 access key
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Bearer token for the object store
    #[arg(long, env = "GDDP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Local cache directory
    #[arg(long, env = "GDDP_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// Purge inputs and outputs from the cache once published
    #[arg(long, env = "GDDP_NOCACHE")]
    pub nocache: bool,

    /// Debug logging
    #[arg(short, long, env = "GDDP_VERBOSE")]
    pub verbose: bool,

    /// Log format (pretty|compact|json)
    #[arg(long, env = "GDDP_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Scheduling arguments for commands that resolve a plan
#[derive(Parser, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Worker threads (default: one per CPU)
    #[arg(short = 'j', long, env = "GDDP_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Longest wait for an in-process task (e.g., "900s", "15m")
    #[arg(long, env = "GDDP_TIMEOUT")]
    pub timeout: Option<String>,

    /// Baseline window for baseline-relative indicators (e.g., "1970-2000")
    #[arg(long, env = "GDDP_BASELINE")]
    pub baseline: Option<String>,

    /// Record failed tasks and keep building instead of aborting
    #[arg(long)]
    pub permissive: bool,

    /// Rebuild artifacts the store already has
    #[arg(long)]
    pub no_skip_existing: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build artifacts and everything they depend on
    Build(BuildCommandArgs),

    /// Show the resolved build plan without running it
    Plan(PlanArgs),

    /// List registered formulae
    Formulas(FormulasArgs),

    /// Check which artifacts are already materialized
    Exists(KeysArgs),

    /// Download artifacts into the local cache
    Fetch(KeysArgs),

    /// Delete zero-byte objects left in the remote store by failed uploads
    PruneRemote(PruneArgs),

    /// Manage the local cache
    Cache(CacheArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct BuildCommandArgs {
    /// Artifact keys, e.g. abs-annual_pr_rcp85_CCSM4_2040-2060_nexgddp.tif
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Walk the plan without fetching, computing or publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Run every task on the calling thread
    #[arg(long)]
    pub synchronous: bool,

    /// Output the build report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub build: BuildArgs,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: PlanFormat,

    #[command(flatten)]
    pub build: BuildArgs,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct FormulasArgs {
    /// Only formulae whose name matches this glob (e.g. "*-gt-q99")
    pub pattern: Option<String>,

    /// Baseline window used by the catalogue
    #[arg(long, env = "GDDP_BASELINE")]
    pub baseline: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct KeysArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove every cached artifact and source
    Clean {
        #[command(flatten)]
        common: CommonConfigArgs,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Validate {
        /// Path to config file
        path: String,
    },
    /// Print an example config file
    Example,
    /// Show effective configuration (merged from all sources)
    Show {
        #[command(flatten)]
        common: CommonConfigArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_args_parse() {
        let cli = Cli::try_parse_from([
            "gddp",
            "build",
            "annual_pr_rcp85_CCSM4_2050_nexgddp.tif",
            "-j",
            "4",
            "--permissive",
            "--dry-run",
            "--cache-dir",
            "/tmp/gddp",
        ])
        .unwrap();
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.keys.len(), 1);
                assert_eq!(args.build.max_workers, Some(4));
                assert!(args.build.permissive);
                assert!(args.dry_run);
                assert_eq!(args.common.cache_dir.as_deref(), Some("/tmp/gddp"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_build_requires_keys() {
        assert!(Cli::try_parse_from(["gddp", "build"]).is_err());
    }

    #[test]
    fn test_plan_format() {
        let cli = Cli::try_parse_from(["gddp", "plan", "k.tif", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Commands::Plan(PlanArgs { format: PlanFormat::Json, .. })));
    }
}
