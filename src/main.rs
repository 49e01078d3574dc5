//! Dejavu cache CLI
//!
//! Entry point for the `dejavu-cache` inspection tool.

use clap::{Parser, Subcommand};
use dejavu_cache::{derive_path, CacheSettings, CacheStore, SettingsError, STORAGE_ENV_VAR};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dejavu-cache")]
#[command(about = "Inspect a persistent autotuning cache", version)]
struct Cli {
    /// Storage root (default: $TRITON_DEJAVU_STORAGE)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Runtime identifier below the storage root
    #[arg(long, global = true, default_value = "default")]
    identifier: String,

    /// Tag segment (default: $TRITON_DEJAVU_TAG or "default")
    #[arg(long, global = true)]
    tag: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record under the storage root
    Dump {
        /// Leave timing samples out
        #[arg(long)]
        filter_timings: bool,
    },

    /// Print the record path for a set of hashes
    Path {
        kernel: String,
        code_hash: String,
        configs_hash: String,
        key_hash: String,
        param_hash: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    match cli.command {
        Commands::Dump { filter_timings } => run_dump(settings, filter_timings),
        Commands::Path {
            kernel,
            code_hash,
            configs_hash,
            key_hash,
            param_hash,
        } => run_path(
            &settings,
            &kernel,
            &code_hash,
            &configs_hash,
            &key_hash,
            &param_hash,
        ),
    }
}

fn resolve_settings(cli: &Cli) -> Result<CacheSettings, SettingsError> {
    let mut settings = match &cli.storage {
        Some(root) => CacheSettings::from_lookup(cli.identifier.clone(), |name| {
            if name == STORAGE_ENV_VAR {
                Some(root.to_string_lossy().into_owned())
            } else {
                std::env::var(name).ok()
            }
        })?,
        None => CacheSettings::from_env(cli.identifier.clone())?,
    };
    if let Some(tag) = &cli.tag {
        settings.tag = tag.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn run_dump(settings: CacheSettings, filter_timings: bool) {
    let store = match CacheStore::new(settings) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = store.load_all().and_then(|_| store.dump(filter_timings));
    match result {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_path(
    settings: &CacheSettings,
    kernel: &str,
    code_hash: &str,
    configs_hash: &str,
    key_hash: &str,
    param_hash: &str,
) {
    let relative = derive_path(kernel, code_hash, configs_hash, key_hash, param_hash, &settings.tag);
    let full = settings
        .storage_prefix
        .join(&settings.storage_identifier)
        .join(relative)
        .join(dejavu_cache::RECORD_FILENAME);
    println!("{}", full.display());
}
