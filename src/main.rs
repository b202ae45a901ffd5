//! dpsync CLI entrypoint.
//!
//! This is the main entrypoint for the dpsync command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use dpsync::cli::{Cli, Commands, OutputFormat, OutputFormatter, RunOptions, RunScope, run_device};
use dpsync::client::{ControllerClient, FileSessionStore, MemorySessionStore, SessionStore};
use dpsync::config::{
    ConfigParser, ConfigValidator, DesiredState, DeviceSpec, LogLevel, SessionStoreKind,
    find_config_file,
};
use dpsync::device::{CommitPolicy, DeviceTarget, LockCoordinator, LockPolicy, PolicyCommit};
use dpsync::error::{ConfigError, Result, SyncError};
use dpsync::planner::ExecutionMode;
use dpsync::reconciler::Reconciler;
use dpsync::resource::ResourceKind;

use clap::Parser;
use tracing::{Instrument, debug, info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the configured verbosity.
fn init_logging(level: LogLevel, verbose: bool, output: OutputFormat) {
    let directive = if verbose { "debug" } else { level.filter_directive() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point. Returns whether the run succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let state = load_state(cli.config.as_ref())?;
    init_logging(
        state.controller.log_level.unwrap_or_default(),
        cli.verbose,
        cli.output,
    );

    let run_id = Uuid::new_v4();
    let span = info_span!("run", id = %run_id);

    async move {
        match cli.command {
            Commands::Validate { warnings } => Ok(cmd_validate(&state, warnings, &formatter)),
            Commands::Plan { device } => {
                let options = RunOptions {
                    mode: ExecutionMode::Preview,
                    lock: LockPolicy::default(),
                    commit: CommitPolicy::Immediate,
                    scope: RunScope::All,
                };
                cmd_run(state, device.as_deref(), options, &formatter).await
            }
            Commands::Apply {
                device,
                no_commit,
                external_lock,
                lock_attempts,
            } => {
                let options = RunOptions {
                    mode: ExecutionMode::Apply,
                    lock: lock_policy(external_lock, lock_attempts),
                    commit: commit_policy(no_commit),
                    scope: RunScope::Reconcile,
                };
                cmd_run(state, device.as_deref(), options, &formatter).await
            }
            Commands::Delete {
                device,
                no_commit,
                external_lock,
            } => {
                let options = RunOptions {
                    mode: ExecutionMode::Apply,
                    lock: lock_policy(external_lock, 1),
                    commit: commit_policy(no_commit),
                    scope: RunScope::Deletions,
                };
                cmd_run(state, device.as_deref(), options, &formatter).await
            }
            Commands::Get {
                resource_type,
                device,
                keys,
            } => cmd_get(state, &resource_type, device.as_deref(), &keys, &formatter).await,
            Commands::Commit {
                device,
                external_lock,
            } => cmd_commit(state, &device, external_lock, &formatter).await,
        }
    }
    .instrument(span)
    .await
}

/// Validate the desired-state file.
fn cmd_validate(state: &DesiredState, show_warnings: bool, formatter: &OutputFormatter) -> bool {
    let result = ConfigValidator::new().check(state);
    println!("{}", formatter.format_validation(&result, show_warnings));
    result.is_valid()
}

/// Run the file against each selected device, one device at a time.
async fn cmd_run(
    state: DesiredState,
    only: Option<&str>,
    options: RunOptions,
    formatter: &OutputFormatter,
) -> Result<bool> {
    ConfigValidator::new().validate(&state)?;
    let client = build_client(state.controller.clone())?;
    let devices = select_devices(&state, only)?;

    let mut reports = Vec::with_capacity(devices.len());
    for device in devices {
        info!("Processing device {} ({} items)", device.address, device.item_count());
        reports.push(run_device(&client, device, options).await);
    }

    println!("{}", formatter.format_reports(&reports));
    Ok(!reports.iter().any(dpsync::cli::DeviceReport::is_failure))
}

/// Show resources of one type.
async fn cmd_get(
    state: DesiredState,
    resource_type: &str,
    only: Option<&str>,
    keys: &[String],
    formatter: &OutputFormatter,
) -> Result<bool> {
    let kind: ResourceKind = resource_type.parse()?;
    let addresses: Vec<String> = match only {
        Some(address) => vec![address.to_string()],
        None => state.devices.iter().map(|d| d.address.clone()).collect(),
    };
    if addresses.is_empty() {
        return Err(ConfigError::invalid("device", "no device given and none in the desired state").into());
    }
    let client = build_client(state.controller)?;

    for address in addresses {
        let device = DeviceTarget::new(address);
        let report = Reconciler::new(&client, &device, ExecutionMode::Apply)
            .get(kind, keys)
            .await?;
        println!("{}", formatter.format_get(&report));
    }
    Ok(true)
}

/// Commit pending configuration on one device.
async fn cmd_commit(
    state: DesiredState,
    address: &str,
    external_lock: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let client = build_client(state.controller)?;
    let policy = lock_policy(external_lock, 1);
    let device = if external_lock {
        DeviceTarget::locked_externally(address)
    } else {
        DeviceTarget::new(address)
    };

    let commit = PolicyCommit::new(&client, ExecutionMode::Apply);
    let report = LockCoordinator::new(&client, policy, ExecutionMode::Apply)
        .with_lock(&device, || commit.commit(&device))
        .await?;
    println!("{}", formatter.format_commit(&report));
    Ok(true)
}

fn lock_policy(external: bool, attempts: u32) -> LockPolicy {
    if external {
        LockPolicy::external()
    } else {
        let policy = LockPolicy::default();
        policy.with_attempts(attempts, policy.retry_delay)
    }
}

const fn commit_policy(no_commit: bool) -> CommitPolicy {
    if no_commit {
        CommitPolicy::Deferred
    } else {
        CommitPolicy::Immediate
    }
}

fn select_devices<'a>(state: &'a DesiredState, only: Option<&str>) -> Result<Vec<&'a DeviceSpec>> {
    match only {
        Some(address) => state.device(address).map(|d| vec![d]).ok_or_else(|| {
            SyncError::Config(ConfigError::invalid(
                "device",
                format!("device {address} is not in the desired state"),
            ))
        }),
        None => Ok(state.devices.iter().collect()),
    }
}

fn build_client(section: dpsync::config::ControllerSection) -> Result<ControllerClient> {
    let store: Arc<dyn SessionStore> = match section.session_store {
        SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
        SessionStoreKind::File => Arc::new(FileSessionStore::new()?),
    };
    let settings = section.into_settings()?;
    debug!("Controller {} via {} session store", settings.host(), store.backend_type());
    ControllerClient::new(settings, store)
}

/// Loads the desired-state file with `.env` and environment overrides.
fn load_state(config_path: Option<&PathBuf>) -> Result<DesiredState> {
    let config_file = config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))?;

    let parser = ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_with_env(&config_file)
}
