use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use gantry_core::{Channel, LauncherLayout, TitleCatalog};
use gantry_process::launch_process;
use gantry_store::PropertyStore;
use gantry_updater::{CancelToken, FileUpdater, UpdateOutcome, UpdateScope};

use crate::flows::{launch_search_path, title_executable_path};

/// Everything a command handler may touch, passed explicitly instead of
/// being captured: lifetime and ownership stay visible at the call site.
pub(crate) struct LaunchContext<'a> {
    pub layout: &'a LauncherLayout,
    pub store: &'a PropertyStore,
    pub catalog: &'a TitleCatalog,
    pub channel: Channel,
    pub updater: &'a FileUpdater<'a>,
    pub cancel: &'a CancelToken,
    /// Channel switch requested by a handler; executed by the flow once
    /// cleanup (lock release) is done.
    pub pending_relaunch: Option<Channel>,
    /// Set when a handler's update pass was cancelled; the flow exits
    /// cleanly without launching anything.
    pub cancelled: bool,
}

pub(crate) type CommandHandler = fn(&mut LaunchContext<'_>, &str) -> Result<()>;

/// Explicit name→handler table for the commands the shell can invoke.
pub(crate) struct CommandRegistry {
    handlers: BTreeMap<&'static str, CommandHandler>,
}

impl CommandRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            handlers: BTreeMap::new(),
        };
        registry.register("launch", cmd_launch);
        registry.register("get-property", cmd_get_property);
        registry.register("set-property", cmd_set_property);
        registry.register("switch-channel", cmd_switch_channel);
        registry
    }

    pub fn register(&mut self, name: &'static str, handler: CommandHandler) {
        self.handlers.insert(name, handler);
    }

    pub fn dispatch(&self, context: &mut LaunchContext<'_>, name: &str, arg: &str) -> Result<()> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| anyhow!("unknown command: {name}"))?;
        handler(context, arg)
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

/// `launch <title> <variant>`: bring the title's runtime up to date, then
/// start the executable from its stored installation path.
fn cmd_launch(context: &mut LaunchContext<'_>, arg: &str) -> Result<()> {
    let (title_id, variant) = arg
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("usage: launch <title> <variant>"))?;
    let variant = variant.trim();

    let title = context
        .catalog
        .find(title_id)
        .ok_or_else(|| anyhow!("unknown title: {title_id}"))?;
    let variant_argument = title
        .variant_argument(variant)
        .ok_or_else(|| anyhow!("unknown variant '{variant}' for title '{title_id}'"))?
        .to_string();
    let install = context.store.load(&title.install_key()).ok_or_else(|| {
        anyhow!(
            "no installation path stored for '{}'; set the '{}' property first",
            title.name,
            title.install_key()
        )
    })?;

    if let Some(runtime) = &title.runtime {
        let scope = UpdateScope::Component(runtime.clone());
        let target = context.layout.component_dir(runtime);
        match context
            .updater
            .run(context.channel, &scope, &target, context.cancel)?
        {
            UpdateOutcome::Cancelled => {
                context.cancelled = true;
                return Ok(());
            }
            UpdateOutcome::Completed(_) => {}
        }
    }

    let exe = title_executable_path(&install, title);
    let env = vec![(title.env_var(), install.clone())];
    let args = vec![variant_argument];
    let search_path = launch_search_path(context.layout, title);

    launch_process(&exe, &args, &env, search_path.as_deref())
        .with_context(|| format!("failed to launch '{}'", title.name))?;
    Ok(())
}

fn cmd_get_property(context: &mut LaunchContext<'_>, arg: &str) -> Result<()> {
    if let Some(value) = context.store.load(arg.trim()) {
        println!("{value}");
    }
    Ok(())
}

/// `set-property key=value`.
fn cmd_set_property(context: &mut LaunchContext<'_>, arg: &str) -> Result<()> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("usage: set-property <key>=<value>"))?;
    context.store.store(key.trim(), value.trim())
}

/// `switch-channel <main|develop>`: records the request; the flow performs
/// the relaunch after releasing the singleton lock.
fn cmd_switch_channel(context: &mut LaunchContext<'_>, arg: &str) -> Result<()> {
    let channel = Channel::parse(arg.trim())?;
    context.pending_relaunch = Some(channel);
    Ok(())
}
