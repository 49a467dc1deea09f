use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

/// Delay between the parent's disappearance and forced termination, leaving
/// in-flight teardown a chance to finish.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(3);

/// Liveness poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// PID of the process that spawned us, if it is still known to the OS.
pub fn parent_pid() -> Option<u32> {
    let current = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(current);
    let process = system.process(current)?;
    Some(process.parent()?.as_u32())
}

/// Blocks until the given PID no longer exists.
pub fn wait_for_process_exit(pid: u32) {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    loop {
        let exists = system.refresh_process(target) && system.process(target).is_some();
        if !exists {
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Spawns the background monitor that guarantees a helper subprocess never
/// outlives an unexpectedly killed parent: once the recorded parent exits,
/// wait a short grace interval, then terminate this process.
pub fn spawn_parent_watchdog(parent: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        wait_for_process_exit(parent);
        thread::sleep(WATCHDOG_GRACE);
        log::warn!("parent process {parent} exited; terminating subprocess");
        std::process::exit(0);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_pid_is_known_under_the_test_harness() {
        assert!(parent_pid().is_some());
    }

    #[test]
    fn wait_returns_immediately_for_dead_pid() {
        // A PID far above any realistic pid_max is never live; the wait must
        // return without blocking.
        wait_for_process_exit(0x7fff_fff0);
    }
}
