use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voldock_core::{from_yaml, parse_duration, to_json_pretty, GlobalConfig, Policy, VolumeRequest};
use voldock_runtime::{
    MockStorageBackend, RbdConfig, RbdStorageBackend, StorageBackend, VolumeManager,
    VolumeOrchestrator,
};
use voldock_scheduler::{SnapshotScheduler, SnapshotSchedulerConfig, SnapshotSupervisor};
use voldock_storage::{ConfigStore, KeyEncoder, RedbBackend};

#[derive(Parser)]
#[command(name = "voldock", about = "Voldock block-volume provisioning service")]
struct Cli {
    /// Path to the redb database file
    #[arg(long, global = true, env = "VOLDOCK_DATA_DIR", default_value = "./voldock.redb")]
    data_dir: PathBuf,
    /// Root prefix for all store keys
    #[arg(long, global = true, env = "VOLDOCK_PREFIX", default_value = voldock_storage::DEFAULT_PREFIX)]
    prefix: String,
    /// Storage backend to drive
    #[arg(long, global = true, env = "VOLDOCK_BACKEND", value_enum, default_value_t = BackendKind::Rbd)]
    backend: BackendKind,
    /// Path to the rbd binary
    #[arg(long, global = true, env = "VOLDOCK_RBD_BINARY", default_value = "rbd")]
    rbd_binary: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Mock,
    Rbd,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the snapshot scheduler until interrupted
    Serve {
        /// Tick interval, overriding the stored global configuration (e.g. "1s")
        #[arg(long, env = "VOLDOCK_SNAPSHOT_INTERVAL", value_parser = parse_interval)]
        snapshot_interval: Option<Duration>,
    },
    /// Manage policies
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Manage the global configuration
    #[command(subcommand)]
    Global(GlobalCommand),
    /// Manage volumes
    #[command(subcommand)]
    Volume(VolumeCommand),
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Validate and publish a policy from a YAML or JSON file
    Publish {
        name: String,
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Print a policy as JSON
    Get { name: String },
    /// List policy names
    List,
    /// Delete a policy (volumes using it are left alone)
    Delete { name: String },
}

#[derive(Subcommand)]
enum GlobalCommand {
    /// Print the global configuration as JSON
    Get,
    /// Publish the global configuration from a YAML or JSON file
    Publish {
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum VolumeCommand {
    /// Create and format a volume under a policy
    Create {
        policy: String,
        name: String,
        /// Per-volume override, e.g. `-o size=20GB -o snapshots=true`
        #[arg(long = "opt", short = 'o', value_parser = parse_option)]
        options: Vec<(String, String)>,
    },
    /// Destroy a volume and drop its record
    Remove { policy: String, name: String },
    /// List the volumes of a policy
    List { policy: String },
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", s)),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli.data_dir, &cli.prefix)?;

    match cli.command {
        Commands::Serve { snapshot_interval } => {
            let backend = create_backend(cli.backend, &cli.rbd_binary);
            run_serve(store, backend, snapshot_interval).await
        }
        Commands::Policy(command) => run_policy(&store, command),
        Commands::Global(command) => run_global(&store, command),
        Commands::Volume(command) => {
            let backend = volume_backend(cli.backend, &cli.rbd_binary)?;
            run_volume(store, backend, command).await
        }
    }
}

/// Open the store handle shared by every component
fn open_store(data_dir: &Path, prefix: &str) -> miette::Result<ConfigStore> {
    let kv = RedbBackend::new(data_dir)?;
    Ok(ConfigStore::new(Arc::new(kv), KeyEncoder::new(prefix)))
}

fn create_backend(kind: BackendKind, rbd_binary: &str) -> Arc<dyn StorageBackend> {
    match kind {
        BackendKind::Mock => {
            warn!("Using the in-memory mock backend; volumes do not outlive this process");
            Arc::new(MockStorageBackend::new())
        }
        BackendKind::Rbd => Arc::new(RbdStorageBackend::new(RbdConfig {
            rbd_binary: rbd_binary.to_string(),
        })),
    }
}

/// Backend for a one-shot volume command
///
/// The mock backend forgets everything when the process exits, so a volume
/// created through it would leave a record with nothing behind it.
fn volume_backend(kind: BackendKind, rbd_binary: &str) -> miette::Result<Arc<dyn StorageBackend>> {
    if kind == BackendKind::Mock {
        return Err(miette::miette!(
            help = "Use --backend rbd, or run `serve --backend mock` for a throwaway scheduler",
            "The mock backend cannot be used for volume commands: its volumes do not outlive this process"
        ));
    }
    Ok(create_backend(kind, rbd_binary))
}

/// Run both snapshot loops until ctrl-c
async fn run_serve(
    store: ConfigStore,
    backend: Arc<dyn StorageBackend>,
    snapshot_interval: Option<Duration>,
) -> miette::Result<()> {
    let global = store.get_global()?;
    let config = SnapshotSchedulerConfig {
        interval: snapshot_interval.unwrap_or(global.snapshot_interval),
        backend_timeout: global.timeout,
    };
    info!(
        "Starting voldock with {} backend (snapshot interval: {:?})",
        backend.name(),
        config.interval
    );

    let token = CancellationToken::new();
    let scheduler = Arc::new(SnapshotScheduler::new(store, backend, config));
    let supervisor = SnapshotSupervisor::start_with_token(scheduler, token.child_token());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;

    info!("Shutting down, waiting for ticks in progress");
    token.cancel();
    supervisor.shutdown().await;
    Ok(())
}

fn read_file(path: &Path) -> miette::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(record: &T) -> miette::Result<()> {
    println!("{}", to_json_pretty(record)?);
    Ok(())
}

fn run_policy(store: &ConfigStore, command: PolicyCommand) -> miette::Result<()> {
    match command {
        PolicyCommand::Publish { name, file } => {
            let policy: Policy = from_yaml(&read_file(&file)?)?;
            let stored = store.publish_policy(&name, policy)?;
            print_json(&stored)
        }
        PolicyCommand::Get { name } => print_json(&store.get_policy(&name)?),
        PolicyCommand::List => {
            match store.list_policies() {
                Ok(mut names) => {
                    names.sort();
                    for name in names {
                        println!("{}", name);
                    }
                }
                Err(e) if e.is_not_found() => info!("No policies published"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        PolicyCommand::Delete { name } => {
            store.delete_policy(&name)?;
            Ok(())
        }
    }
}

fn run_global(store: &ConfigStore, command: GlobalCommand) -> miette::Result<()> {
    match command {
        GlobalCommand::Get => print_json(&store.get_global()?),
        GlobalCommand::Publish { file } => {
            let global: GlobalConfig = from_yaml(&read_file(&file)?)?;
            store.publish_global(&global)?;
            print_json(&global)
        }
    }
}

async fn run_volume(
    store: ConfigStore,
    backend: Arc<dyn StorageBackend>,
    command: VolumeCommand,
) -> miette::Result<()> {
    let manager = VolumeManager::new(store, VolumeOrchestrator::new(backend));

    match command {
        VolumeCommand::Create {
            policy,
            name,
            options,
        } => {
            let request = options
                .into_iter()
                .fold(VolumeRequest::new(policy, name), |request, (key, value)| {
                    request.with_option(key, value)
                });
            let opts = manager.provision(&request).await?;
            print_json(&opts)
        }
        VolumeCommand::Remove { policy, name } => {
            manager.deprovision(&policy, &name).await?;
            Ok(())
        }
        VolumeCommand::List { policy } => {
            for (name, config) in manager.list(&policy)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    name,
                    config.options.pool,
                    config.options.size,
                    config.options.file_system_or_default()
                );
            }
            Ok(())
        }
    }
}
