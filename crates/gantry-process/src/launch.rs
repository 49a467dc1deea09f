use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

/// Flags consumed once per process image; stripped before a self-relaunch
/// appends the new selection.
pub const CHANNEL_OVERRIDE_FLAGS: [&str; 2] = ["--channel-main", "--channel-develop"];

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to start '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve current executable: {0}")]
    CurrentExe(#[source] io::Error),
}

/// The dynamic-library search variable for the running platform.
pub fn library_search_var() -> &'static str {
    if cfg!(windows) {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Places `dir` in front of an existing search-path value so a target
/// installation's private libraries win over system-wide ones.
pub fn prepended_search_path(dir: &Path, existing: Option<&OsStr>) -> OsString {
    let mut value = OsString::from(dir.as_os_str());
    if let Some(existing) = existing.filter(|v| !v.is_empty()) {
        value.push(if cfg!(windows) { ";" } else { ":" });
        value.push(existing);
    }
    value
}

/// Starts an external executable without waiting for it.
///
/// `env` is applied to the child only; the launcher's own environment is
/// never mutated. When `search_path` is given, the platform library search
/// variable is prepended with it on the child.
pub fn launch_process(
    exe: &Path,
    args: &[String],
    env: &[(String, String)],
    search_path: Option<&Path>,
) -> Result<Child, LaunchError> {
    let mut command = Command::new(exe);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    if let Some(dir) = search_path {
        let var = library_search_var();
        command.env(var, prepended_search_path(dir, std::env::var_os(var).as_deref()));
    }

    log::info!("launching {} {}", exe.display(), args.join(" "));
    command.spawn().map_err(|source| LaunchError::Spawn {
        path: exe.to_path_buf(),
        source,
    })
}

/// Builds the argument vector for a relaunched instance: the current
/// arguments minus any previous channel override, plus `extra`.
pub fn relaunch_arguments<I>(current: I, extra: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = current
        .into_iter()
        .filter(|arg| !CHANNEL_OVERRIDE_FLAGS.contains(&arg.as_str()))
        .collect();
    args.extend(extra.iter().cloned());
    args
}

/// Re-executes the current image with `extra` arguments appended.
///
/// The caller must have released every cross-process lock it holds and must
/// exit promptly after this returns, so the new instance never contends with
/// the exiting one.
pub fn relaunch_self(extra: &[String]) -> Result<Child, LaunchError> {
    let exe = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
    let args = relaunch_arguments(std::env::args().skip(1), extra);

    log::info!("relaunching {} {}", exe.display(), args.join(" "));
    Command::new(&exe)
        .args(&args)
        .spawn()
        .map_err(|source| LaunchError::Spawn { path: exe, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaunch_arguments_strip_previous_channel_flags() {
        let current = vec![
            "--noupdate".to_string(),
            "--channel-main".to_string(),
            "launch".to_string(),
        ];
        let args = relaunch_arguments(current, &["--channel-develop".to_string()]);
        assert_eq!(args, vec!["--noupdate", "launch", "--channel-develop"]);
    }

    #[test]
    fn relaunch_arguments_keep_unrelated_flags() {
        let args = relaunch_arguments(vec!["--dedicated".to_string()], &[]);
        assert_eq!(args, vec!["--dedicated"]);
    }

    #[test]
    fn search_path_prepends_directory() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let joined = prepended_search_path(
            Path::new("/opt/gantry/data/harrier-client"),
            Some(OsStr::new("/usr/lib")),
        );
        assert_eq!(
            joined,
            OsString::from(format!("/opt/gantry/data/harrier-client{separator}/usr/lib"))
        );
    }

    #[test]
    fn search_path_without_existing_value_is_just_the_directory() {
        let joined = prepended_search_path(Path::new("/opt/lib"), None);
        assert_eq!(joined, OsString::from("/opt/lib"));
    }
}
