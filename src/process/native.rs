//! Native process controller using `std::process`.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{LaunchStrategy, ProcessController, ProcessHandle, Termination};
use crate::error::DocWardenError;
use crate::session::ResourceKey;
use crate::Result;

/// Interval between liveness polls while waiting for a process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launch and termination settings.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Strategies tried in order until one stays alive.
    pub strategies: Vec<LaunchStrategy>,
    /// Extra environment for the launched process.
    pub env: BTreeMap<String, String>,
    /// How long a process must survive after spawn to count as started.
    pub startup_grace: Duration,
    /// Wait between the graceful signal and the forced kill.
    pub terminate_grace: Duration,
    /// Wait after the forced kill before giving up.
    pub kill_settle: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            strategies: LaunchStrategy::defaults(),
            env: BTreeMap::from([("DISPLAY".to_string(), ":0".to_string())]),
            startup_grace: Duration::from_secs(3),
            terminate_grace: Duration::from_secs(2),
            kill_settle: Duration::from_secs(1),
        }
    }
}

/// Launches the external application as a child process.
#[derive(Debug, Clone, Default)]
pub struct NativeProcessController {
    config: LaunchConfig,
}

impl NativeProcessController {
    /// Create a new controller with the given settings.
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    fn try_strategy(&self, strategy: &LaunchStrategy, key: &ResourceKey) -> Option<ProcessHandle> {
        let mut child = match Command::new(&strategy.program)
            .args(strategy.render_args(key.as_path()))
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(strategy = %strategy, error = %e, "Launch strategy failed to spawn");
                return None;
            }
        };

        thread::sleep(self.config.startup_grace);

        match child.try_wait() {
            Ok(None) => Some(ProcessHandle::from_child(child, strategy.to_string())),
            Ok(Some(status)) => {
                debug!(strategy = %strategy, %status, "Process exited during startup");
                None
            }
            Err(e) => {
                debug!(strategy = %strategy, error = %e, "Could not probe launched process");
                let _ = child.kill();
                let _ = child.wait();
                None
            }
        }
    }

    /// Poll until the process exits or `timeout` elapses.
    fn wait_for_exit(&self, handle: &mut ProcessHandle, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive(handle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl ProcessController for NativeProcessController {
    fn launch(&self, key: &ResourceKey) -> Result<ProcessHandle> {
        if !key.as_path().exists() {
            return Err(DocWardenError::ResourceNotFound(key.to_string()));
        }

        let mut attempts = 0;
        for strategy in &self.config.strategies {
            attempts += 1;
            if let Some(handle) = self.try_strategy(strategy, key) {
                info!(
                    resource = %key,
                    pid = handle.pid(),
                    strategy = %strategy,
                    "Application launched"
                );
                return Ok(handle);
            }
        }

        Err(DocWardenError::LaunchFailed {
            key: key.to_string(),
            attempts,
        })
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        let pid = handle.pid();
        match handle.child_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => pid_exists(pid),
        }
    }

    fn terminate(&self, handle: &mut ProcessHandle) -> Termination {
        if !self.is_alive(handle) {
            return Termination::AlreadyExited;
        }

        if let Err(e) = send_graceful_stop(handle.pid()) {
            debug!(pid = handle.pid(), error = %e, "Graceful stop signal failed");
        }
        if self.wait_for_exit(handle, self.config.terminate_grace) {
            return Termination::Graceful;
        }

        let kill_error = force_kill(handle).err();
        if self.wait_for_exit(handle, self.config.kill_settle) {
            return Termination::Forced;
        }

        let reason = match kill_error {
            Some(e) => format!("forced kill failed: {e}"),
            None => "process still running after forced kill".to_string(),
        };
        warn!(pid = handle.pid(), %reason, "Process could not be confirmed dead");
        Termination::Incomplete { reason }
    }
}

#[cfg(unix)]
fn send_graceful_stop(pid: u32) -> std::io::Result<()> {
    signal(pid, libc::SIGTERM)
}

#[cfg(not(unix))]
fn send_graceful_stop(_pid: u32) -> std::io::Result<()> {
    // No graceful stop signal; terminate falls through to the forced kill.
    Ok(())
}

fn force_kill(handle: &mut ProcessHandle) -> std::io::Result<()> {
    let pid = handle.pid();
    match handle.child_mut() {
        Some(child) => child.kill(),
        #[cfg(unix)]
        None => signal(pid, libc::SIGKILL),
        #[cfg(not(unix))]
        None => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot kill untracked process {pid}"),
        )),
    }
}

#[cfg(unix)]
fn signal(pid: u32, sig: libc::c_int) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn pid_exists(pid: u32) -> bool {
    match signal(pid, 0) {
        Ok(()) => true,
        Err(e) => e.raw_os_error() == Some(libc::EPERM),
    }
}

#[cfg(not(unix))]
fn pid_exists(_pid: u32) -> bool {
    // Untracked processes cannot be probed here; assume they are running.
    true
}
