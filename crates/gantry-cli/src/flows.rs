use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gantry_core::{
    default_user_root, Channel, ChannelOverride, LauncherLayout, Title, TitleCatalog,
    BUILD_CHANNEL,
};
use gantry_process::{parent_pid, relaunch_self, spawn_parent_watchdog, Supervisor};
use gantry_store::PropertyStore;
use gantry_updater::{
    CancelToken, ChannelEndpoints, FileUpdater, HttpTransport, ProgressListener, UpdateError,
    UpdateOutcome, UpdateScope, UpdateTransport,
};

use crate::commands::{CommandRegistry, LaunchContext};
use crate::render::{print_status, TerminalListener};

/// Bounded wait for the singleton lock before declaring another instance
/// the winner.
const SINGLETON_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(about = "Game launcher update and process orchestration", long_about = None)]
pub(crate) struct Cli {
    /// Marks a helper subprocess spawned by the primary instance.
    #[arg(long)]
    pub(crate) subprocess: bool,

    /// Headless server mode; never creates a window.
    #[arg(long)]
    pub(crate) dedicated: bool,

    /// Update-only mode; syncs and exits without a window.
    #[arg(long)]
    pub(crate) update: bool,

    /// Skip the update pass entirely.
    #[arg(long)]
    pub(crate) noupdate: bool,

    /// Force the main update channel from process start.
    #[arg(long, conflicts_with = "channel_develop")]
    pub(crate) channel_main: bool,

    /// Force the develop update channel from process start.
    #[arg(long)]
    pub(crate) channel_develop: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Start as the primary instance: enforce single instance and sync.
    Run,
    /// Sync a title's runtime, then start the selected variant.
    Launch { title: String, variant: String },
    /// Run the update pass for the launcher tree and title runtimes.
    Sync {
        /// Restrict the pass to one runtime component.
        #[arg(long)]
        component: Option<String>,
    },
    /// Read one property from the shared store.
    Get { key: String },
    /// Write one property to the shared store.
    Set { key: String, value: String },
    /// Print the active update channel.
    Channel,
    /// Switch the update channel and relaunch.
    SwitchChannel { channel: String },
}

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let layout = LauncherLayout::new(default_user_root()?);
    layout.ensure_base_dirs()?;

    if cli.subprocess {
        return run_subprocess();
    }

    let overrides = ChannelOverride::from_flags(cli.channel_main, cli.channel_develop);
    let channel = Channel::resolve(BUILD_CHANNEL, overrides);
    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::load(&layout)?;

    match &cli.command {
        None | Some(Commands::Run) => run_launcher(&cli, &layout, &store, &catalog, channel),
        Some(Commands::Launch { title, variant }) => {
            run_launch(&cli, &layout, &store, &catalog, channel, title, variant)
        }
        Some(Commands::Sync { component }) => {
            run_sync(&layout, &store, &catalog, channel, component.as_deref())
        }
        Some(Commands::Get { key }) => match store.load(key) {
            Some(value) => {
                println!("{value}");
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        },
        Some(Commands::Set { key, value }) => {
            store.store(key, value)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Channel) => {
            println!("{channel}");
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::SwitchChannel { channel: selected }) => {
            run_switch_channel(&layout, &store, &catalog, channel, selected)
        }
    }
}

/// Helper-subprocess entry: no singleton check, no updates, no window. The
/// watchdog guarantees we never outlive an unexpectedly killed parent; the
/// embedded renderer owns the process from here.
fn run_subprocess() -> Result<ExitCode> {
    if let Some(parent) = parent_pid() {
        let _watchdog = spawn_parent_watchdog(parent);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_launcher(
    cli: &Cli,
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
) -> Result<ExitCode> {
    let mut supervisor = Supervisor::new(layout.clone());
    supervisor
        .enforce_singleton(SINGLETON_TIMEOUT)
        .context("gantry is already running or its lock is unavailable")?;

    if !cli.noupdate {
        let listener = TerminalListener::new();
        let cancel = CancelToken::new();
        match run_update_pass(layout, store, catalog, channel, &listener, &cancel, None) {
            Ok(UpdateOutcome::Cancelled) => return Ok(ExitCode::SUCCESS),
            Ok(UpdateOutcome::Completed(_)) => {}
            // A missing update feed degrades the launch instead of blocking
            // it; everything else is fatal.
            Err(err) => match err.downcast_ref::<UpdateError>() {
                Some(UpdateError::Manifest { .. }) => {
                    log::warn!("update pass skipped: {err:#}");
                    print_status("warn", &format!("update skipped: {err:#}"));
                }
                _ => return Err(err),
            },
        }
    }

    if !cli.dedicated && !cli.update {
        // The windowed shell attaches here; it is an external collaborator
        // of this core.
        print_status("ready", "launcher core is up to date");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_sync(
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
    component: Option<&str>,
) -> Result<ExitCode> {
    let mut supervisor = Supervisor::new(layout.clone());
    supervisor
        .enforce_singleton(SINGLETON_TIMEOUT)
        .context("gantry is already running or its lock is unavailable")?;

    let listener = TerminalListener::new();
    let cancel = CancelToken::new();
    // Cancellation exits with the same neutral status as a completed pass.
    run_update_pass(layout, store, catalog, channel, &listener, &cancel, component)?;
    Ok(ExitCode::SUCCESS)
}

fn run_launch(
    cli: &Cli,
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
    title: &str,
    variant: &str,
) -> Result<ExitCode> {
    let mut supervisor = Supervisor::new(layout.clone());
    supervisor
        .enforce_singleton(SINGLETON_TIMEOUT)
        .context("gantry is already running or its lock is unavailable")?;

    let endpoints = ChannelEndpoints::load(layout)?;
    let transport = HttpTransport::new(endpoints)?;
    let listener = TerminalListener::new();
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout,
        store,
        catalog,
        channel,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    registry.dispatch(&mut context, "launch", &format!("{title} {variant}"))?;

    if context.cancelled {
        return Ok(ExitCode::SUCCESS);
    }
    finalize_pending_relaunch(supervisor, context.pending_relaunch)
}

fn run_switch_channel(
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
    selected: &str,
) -> Result<ExitCode> {
    let mut supervisor = Supervisor::new(layout.clone());
    supervisor
        .enforce_singleton(SINGLETON_TIMEOUT)
        .context("gantry is already running or its lock is unavailable")?;

    let endpoints = ChannelEndpoints::load(layout)?;
    let transport = HttpTransport::new(endpoints)?;
    let listener = gantry_updater::NullListener;
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout,
        store,
        catalog,
        channel,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    registry.dispatch(&mut context, "switch-channel", selected)?;
    finalize_pending_relaunch(supervisor, context.pending_relaunch)
}

/// Executes a relaunch scheduled by a command handler. All cleanup,
/// including releasing the singleton lock, happens before the new image is
/// spawned, so the next instance never contends with this one.
fn finalize_pending_relaunch(
    mut supervisor: Supervisor,
    pending: Option<Channel>,
) -> Result<ExitCode> {
    let Some(channel) = pending else {
        return Ok(ExitCode::SUCCESS);
    };

    supervisor.release_singleton();
    relaunch_self(&[channel.override_flag().to_string()])
        .context("failed to relaunch for channel switch")?;
    print_status("relaunch", &format!("switching to the {channel} channel"));
    Ok(ExitCode::SUCCESS)
}

/// One full update pass: the launcher's own tree first, then every title
/// runtime whose installation path is configured. `only_component`
/// restricts the pass to a single runtime.
#[allow(clippy::too_many_arguments)]
fn run_update_pass(
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
    listener: &dyn ProgressListener,
    cancel: &CancelToken,
    only_component: Option<&str>,
) -> Result<UpdateOutcome> {
    let endpoints = ChannelEndpoints::load(layout)?;
    let transport = HttpTransport::new(endpoints)?;
    run_update_pass_with(
        &transport,
        layout,
        store,
        catalog,
        channel,
        listener,
        cancel,
        only_component,
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn run_update_pass_with(
    transport: &dyn UpdateTransport,
    layout: &LauncherLayout,
    store: &PropertyStore,
    catalog: &TitleCatalog,
    channel: Channel,
    listener: &dyn ProgressListener,
    cancel: &CancelToken,
    only_component: Option<&str>,
) -> Result<UpdateOutcome> {
    let updater = FileUpdater::new(transport, listener);

    let mut totals = Vec::new();
    if only_component.is_none() {
        let scope = UpdateScope::Launcher;
        let target = layout.component_dir(scope.dir_name());
        match updater.run(channel, &scope, &target, cancel)? {
            UpdateOutcome::Cancelled => return Ok(UpdateOutcome::Cancelled),
            UpdateOutcome::Completed(stats) => totals.push(stats),
        }
    }

    for title in &catalog.titles {
        let matches_filter = match only_component {
            Some(component) => title.runtime.as_deref() == Some(component),
            None => true,
        };
        if !matches_filter {
            continue;
        }
        match run_component_update(&updater, layout, store, title, channel, cancel)? {
            Some(UpdateOutcome::Cancelled) => return Ok(UpdateOutcome::Cancelled),
            Some(UpdateOutcome::Completed(stats)) => totals.push(stats),
            None => {}
        }
    }

    let downloaded: usize = totals.iter().map(|stats| stats.downloaded).sum();
    let planned: usize = totals.iter().map(|stats| stats.planned).sum();
    let pruned: usize = totals.iter().map(|stats| stats.pruned).sum();
    Ok(UpdateOutcome::Completed(gantry_updater::UpdateStats {
        planned,
        downloaded,
        pruned,
        extraneous: totals.into_iter().flat_map(|stats| stats.extraneous).collect(),
    }))
}

/// Syncs one title's runtime component, keyed off its stored installation
/// path: titles that were never installed are silently skipped.
pub(crate) fn run_component_update(
    updater: &FileUpdater<'_>,
    layout: &LauncherLayout,
    store: &PropertyStore,
    title: &Title,
    channel: Channel,
    cancel: &CancelToken,
) -> Result<Option<UpdateOutcome>> {
    let Some(runtime) = &title.runtime else {
        return Ok(None);
    };
    if store.load(&title.install_key()).is_none() {
        log::debug!(
            "skipping runtime '{runtime}': no '{}' property",
            title.install_key()
        );
        return Ok(None);
    }

    let scope = UpdateScope::Component(runtime.clone());
    let target = layout.component_dir(runtime);
    let outcome = updater.run(channel, &scope, &target, cancel)?;
    Ok(Some(outcome))
}

pub(crate) fn launch_search_path(
    layout: &LauncherLayout,
    title: &Title,
) -> Option<std::path::PathBuf> {
    title
        .runtime
        .as_ref()
        .map(|runtime| layout.component_dir(runtime))
}

pub(crate) fn title_executable_path(install: &str, title: &Title) -> std::path::PathBuf {
    Path::new(install).join(title.executable_file_name())
}
