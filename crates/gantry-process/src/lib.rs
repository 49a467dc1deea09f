mod launch;
mod watchdog;

use std::time::Duration;

use gantry_core::LauncherLayout;
use gantry_store::{LockError, NamedLock, LAUNCHER_LOCK};

pub use launch::{
    launch_process, library_search_var, prepended_search_path, relaunch_arguments, relaunch_self,
    LaunchError, CHANNEL_OVERRIDE_FLAGS,
};
pub use watchdog::{parent_pid, spawn_parent_watchdog, wait_for_process_exit, WATCHDOG_GRACE};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("another launcher instance is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Process-wide supervision state, constructed once at startup and passed by
/// reference to the components that need it.
pub struct Supervisor {
    layout: LauncherLayout,
    singleton: Option<NamedLock>,
}

impl Supervisor {
    pub fn new(layout: LauncherLayout) -> Self {
        Self {
            layout,
            singleton: None,
        }
    }

    pub fn layout(&self) -> &LauncherLayout {
        &self.layout
    }

    /// Bounded-wait acquisition of the family-wide launcher lock. On success
    /// the lock stays held for the remainder of the process lifetime (or
    /// until [`Supervisor::release_singleton`]); a second instance observing
    /// the held lock must abort startup without side effects.
    ///
    /// Failure to even create the lock primitive is fatal here, unlike in
    /// the property store.
    pub fn enforce_singleton(&mut self, timeout: Duration) -> Result<(), ProcessError> {
        if self.singleton.is_some() {
            return Ok(());
        }

        let lock = NamedLock::open(&self.layout.run_dir(), LAUNCHER_LOCK)?;
        let guard = lock.try_acquire(timeout).map_err(|err| match err {
            LockError::Timeout { .. } => ProcessError::AlreadyRunning,
            other => ProcessError::Lock(other),
        })?;
        guard.hold();
        self.singleton = Some(lock);
        Ok(())
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton.is_some()
    }

    /// Releases the singleton lock early. Required before a self-relaunch so
    /// the next process image does not collide with the exiting one.
    pub fn release_singleton(&mut self) {
        self.singleton = None;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;

    fn test_layout() -> LauncherLayout {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!(
            "gantry-process-tests-{}-{}",
            std::process::id(),
            nanos
        ));
        LauncherLayout::new(path)
    }

    #[test]
    fn second_singleton_attempt_reports_already_running() {
        let layout = test_layout();
        layout.ensure_base_dirs().expect("must create dirs");

        let mut first = Supervisor::new(layout.clone());
        first
            .enforce_singleton(Duration::from_millis(200))
            .expect("first instance must win");
        assert!(first.is_singleton());

        let mut second = Supervisor::new(layout.clone());
        let err = second
            .enforce_singleton(Duration::from_millis(200))
            .expect_err("second instance must be rejected");
        assert!(matches!(err, ProcessError::AlreadyRunning));
        assert!(!second.is_singleton());

        let _ = fs::remove_dir_all(layout.root());
    }

    #[test]
    fn releasing_the_singleton_lets_a_new_instance_start() {
        let layout = test_layout();
        layout.ensure_base_dirs().expect("must create dirs");

        let mut first = Supervisor::new(layout.clone());
        first
            .enforce_singleton(Duration::from_millis(200))
            .expect("first instance must win");
        first.release_singleton();

        let mut second = Supervisor::new(layout.clone());
        second
            .enforce_singleton(Duration::from_secs(2))
            .expect("must acquire after release");

        let _ = fs::remove_dir_all(layout.root());
    }

    #[test]
    fn enforce_singleton_is_idempotent_within_one_supervisor() {
        let layout = test_layout();
        layout.ensure_base_dirs().expect("must create dirs");

        let mut supervisor = Supervisor::new(layout.clone());
        supervisor
            .enforce_singleton(Duration::from_millis(200))
            .expect("must acquire");
        supervisor
            .enforce_singleton(Duration::from_millis(200))
            .expect("repeat call on the holder must be a no-op");

        let _ = fs::remove_dir_all(layout.root());
    }
}
