use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use skillget_core::config::{ConfigOverrides, ConfigResolver};
use skillget_core::registry::{PluginType, Pricing};
use std::path::PathBuf;

mod catalog;
mod skills;

#[derive(Parser)]
#[command(name = "skillget")]
#[command(version, about = "skillget - verified skill plugin installer", long_about = None)]
struct Cli {
    /// Registry API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Verbose logging to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every skill of a plugin.
    Install {
        slug: String,
        #[arg(long)]
        install_dir: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
        /// Install even if the manifest signature cannot be verified.
        #[arg(long)]
        skip_verify: bool,
        /// Install even if artifact content hashes do not match.
        #[arg(long)]
        skip_hash_verify: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[arg(long)]
        retries: Option<u32>,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Browse the registry.
    Search {
        #[arg(long = "type")]
        plugin_type: Option<PluginType>,
        #[arg(long)]
        pricing: Option<Pricing>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        page: Option<u32>,
        /// Follow pagination to the end.
        #[arg(long)]
        all: bool,
    },
    /// Show registry details for one plugin.
    Info { slug: String },
    /// List skills installed locally.
    List {
        #[arg(long)]
        install_dir: Option<PathBuf>,
    },
}

fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red().bold(), e);
            e.downcast_ref::<skillget_core::InstallError>()
                .map_or(skillget_core::install::EXIT_FAILED, |e| e.exit_code())
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut overrides = ConfigOverrides {
        api_base_url: cli.api_url,
        timeout_ms: cli.timeout_ms,
        ..Default::default()
    };

    match &cli.command {
        Commands::Install {
            install_dir,
            overwrite,
            skip_verify,
            skip_hash_verify,
            dry_run,
            max_concurrent,
            retries,
            ..
        } => {
            overrides.install_dir = install_dir.clone();
            overrides.overwrite = *overwrite;
            overrides.skip_verify = *skip_verify;
            overrides.skip_hash_verify = *skip_hash_verify;
            overrides.dry_run = *dry_run;
            overrides.max_concurrent = *max_concurrent;
            overrides.retries = *retries;
        }
        Commands::List { install_dir } => overrides.install_dir = install_dir.clone(),
        Commands::Search { .. } | Commands::Info { .. } => {}
    }

    let config = ConfigResolver::from_process()?.resolve(&overrides)?;
    init_logging(config.debug || cli.verbose);
    tracing::debug!(
        api = %config.api_base_url,
        install_dir = %config.install_dir.display(),
        "Resolved config"
    );

    match cli.command {
        Commands::Install { slug, json, .. } => skills::install(config, &slug, json).await,
        Commands::Search {
            plugin_type,
            pricing,
            limit,
            page,
            all,
        } => {
            let filter = skillget_core::registry::PluginFilter {
                plugin_type,
                pricing,
                limit,
                page,
            };
            catalog::search(&config, &filter, all).await?;
            Ok(0)
        }
        Commands::Info { slug } => {
            catalog::info(&config, &slug).await?;
            Ok(0)
        }
        Commands::List { .. } => {
            skills::list(&config)?;
            Ok(0)
        }
    }
}
