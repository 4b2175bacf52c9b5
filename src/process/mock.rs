//! Scripted in-memory process controller for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use super::{ProcessController, ProcessHandle, Termination};
use crate::error::DocWardenError;
use crate::session::ResourceKey;
use crate::Result;

#[derive(Debug, Default)]
struct Script {
    next_pid: u32,
    running: HashSet<u32>,
    failing: HashSet<ResourceKey>,
    stubborn: HashSet<u32>,
    launched: Vec<ResourceKey>,
    terminated: Vec<u32>,
}

/// Controller whose processes only exist in memory.
#[derive(Debug, Default)]
pub(crate) struct ScriptedController {
    script: Mutex<Script>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every launch of `key` fail.
    pub fn fail_launch(&self, key: &ResourceKey) {
        self.script.lock().unwrap().failing.insert(key.clone());
    }

    /// Simulate the process dying on its own.
    pub fn crash(&self, pid: u32) {
        self.script.lock().unwrap().running.remove(&pid);
    }

    /// Make the process survive every termination attempt.
    pub fn make_stubborn(&self, pid: u32) {
        self.script.lock().unwrap().stubborn.insert(pid);
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.script.lock().unwrap().running.contains(&pid)
    }

    pub fn launched(&self) -> Vec<ResourceKey> {
        self.script.lock().unwrap().launched.clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.script.lock().unwrap().terminated.clone()
    }
}

impl ProcessController for ScriptedController {
    fn launch(&self, key: &ResourceKey) -> Result<ProcessHandle> {
        let mut script = self.script.lock().unwrap();
        if script.failing.contains(key) {
            return Err(DocWardenError::LaunchFailed {
                key: key.to_string(),
                attempts: 1,
            });
        }
        script.next_pid += 1;
        let pid = 1000 + script.next_pid;
        script.running.insert(pid);
        script.launched.push(key.clone());
        Ok(ProcessHandle::detached(pid))
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        self.is_running(handle.pid())
    }

    fn terminate(&self, handle: &mut ProcessHandle) -> Termination {
        let mut script = self.script.lock().unwrap();
        let pid = handle.pid();
        if !script.running.contains(&pid) {
            return Termination::AlreadyExited;
        }
        script.terminated.push(pid);
        if script.stubborn.contains(&pid) {
            return Termination::Incomplete {
                reason: "process ignored SIGTERM and SIGKILL".into(),
            };
        }
        script.running.remove(&pid);
        Termination::Graceful
    }
}
