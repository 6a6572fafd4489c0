// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Forwarding agent supervision.
//!
//! Any producing process can keep the agent alive: validate the executable,
//! then spawn it, block until it exits for any reason, and spawn it again.
//! Exactly one child exists at a time. Configuration problems disable the
//! remote path and leave the host process alone; a failing `wait` ends
//! supervision for the lifetime of the host.

use std::convert::Infallible;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::config::{RemoteConfig, RingConfig, ENV_BROKERS};
use crate::error::SupervisorError;
use crate::types::BrokerList;

/// Delay before retrying a spawn that failed outright.
const SPAWN_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Keeps one forwarding agent process running.
#[derive(Debug)]
pub struct Supervisor {
    /// Agent executable.
    agent_path: PathBuf,
    /// Extra environment for the child, on top of the inherited one.
    env: Vec<(String, String)>,
    spawn_retry_delay: Duration,
    /// Live child, if any.
    child_pid: Option<u32>,
    /// How the previous child ended.
    last_status: Option<ExitStatus>,
    spawn_count: u64,
}

impl Supervisor {
    /// Supervise `agent_path`, handing it `brokers` and the ring geometry.
    pub fn new(agent_path: impl Into<PathBuf>, brokers: &BrokerList, ring: &RingConfig) -> Self {
        let mut env = vec![(ENV_BROKERS.to_string(), brokers.to_string())];
        env.extend(ring.to_env().into_iter().map(|(k, v)| (k.to_string(), v)));

        Self {
            agent_path: agent_path.into(),
            env,
            spawn_retry_delay: SPAWN_RETRY_DELAY,
            child_pid: None,
            last_status: None,
            spawn_count: 0,
        }
    }

    /// Build from validated configuration.
    pub fn from_config(remote: &RemoteConfig, ring: &RingConfig) -> Self {
        Self::new(&remote.agent_path, &remote.brokers, ring)
    }

    /// Add an environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override the delay used after a failed spawn.
    pub fn with_spawn_retry_delay(mut self, delay: Duration) -> Self {
        self.spawn_retry_delay = delay;
        self
    }

    pub fn agent_path(&self) -> &Path {
        &self.agent_path
    }

    /// PID of the running agent, if one is alive.
    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    /// Exit status of the most recent agent.
    pub fn last_status(&self) -> Option<ExitStatus> {
        self.last_status
    }

    /// Number of agents started so far.
    pub fn spawn_count(&self) -> u64 {
        self.spawn_count
    }

    /// Check that the agent exists, is a file, and has an executable bit.
    pub fn validate_agent(&self) -> Result<(), SupervisorError> {
        let path = &self.agent_path;
        let metadata = std::fs::metadata(path).map_err(|e| SupervisorError::AgentNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if metadata.is_dir() {
            return Err(SupervisorError::AgentIsDirectory { path: path.clone() });
        }

        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o111 == 0 {
            return Err(SupervisorError::AgentNotExecutable {
                path: path.clone(),
                mode,
            });
        }

        Ok(())
    }

    /// Validate the agent, then restart it forever.
    ///
    /// Returns only on error: immediately for an invalid agent path (nothing
    /// is spawned), or later if waiting on a child fails.
    pub fn run(&mut self) -> Result<Infallible, SupervisorError> {
        self.validate_agent()?;
        tracing::info!(agent = %self.agent_path.display(), "Supervising forwarding agent");

        loop {
            self.supervise_once()?;
        }
    }

    /// Like [`run`](Self::run) but stops after `spawns` agents have exited.
    pub fn run_for(&mut self, spawns: u64) -> Result<(), SupervisorError> {
        self.validate_agent()?;
        for _ in 0..spawns {
            self.supervise_once()?;
        }
        Ok(())
    }

    /// Start one agent and wait for it to end.
    fn supervise_once(&mut self) -> Result<(), SupervisorError> {
        let mut child = self.spawn_agent();
        let pid = child.id();
        self.child_pid = Some(pid);

        let status = child.wait().map_err(|source| {
            self.child_pid = None;
            SupervisorError::WaitFailed { pid, source }
        })?;

        self.child_pid = None;
        self.last_status = Some(status);
        log_exit(pid, &status);
        Ok(())
    }

    /// Spawn the agent, retrying with a fixed delay until it starts.
    fn spawn_agent(&mut self) -> Child {
        loop {
            let spawned = Command::new(&self.agent_path)
                .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn();

            match spawned {
                Ok(child) => {
                    self.spawn_count += 1;
                    tracing::info!(
                        agent = %self.agent_path.display(),
                        pid = child.id(),
                        spawn = self.spawn_count,
                        "Forwarding agent started"
                    );
                    return child;
                }
                Err(e) => {
                    tracing::warn!(
                        agent = %self.agent_path.display(),
                        error = %e,
                        retry_in_s = self.spawn_retry_delay.as_secs(),
                        "Failed to start forwarding agent"
                    );
                    std::thread::sleep(self.spawn_retry_delay);
                }
            }
        }
    }
}

fn log_exit(pid: u32, status: &ExitStatus) {
    if let Some(code) = status.code() {
        tracing::warn!(pid = pid, code = code, "Forwarding agent exited, restarting");
    } else if let Some(raw) = status.signal() {
        let signal = Signal::try_from(raw)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| raw.to_string());
        tracing::warn!(
            pid = pid,
            signal = %signal,
            core_dumped = status.core_dumped(),
            "Forwarding agent killed, restarting"
        );
    } else {
        tracing::warn!(pid = pid, status = ?status, "Forwarding agent ended, restarting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor(path: &Path) -> Supervisor {
        let brokers = BrokerList::parse("localhost:9092").unwrap();
        Supervisor::new(path, &brokers, &RingConfig::default())
    }

    #[test]
    fn test_child_env_carries_brokers_and_ring() {
        let sup = supervisor(Path::new("/bin/true"));
        let keys: Vec<&str> = sup.env.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&ENV_BROKERS));
        assert!(keys.contains(&crate::config::ENV_CAPACITY));
        assert!(keys.contains(&crate::config::ENV_SLOT_SIZE));
        assert!(keys.contains(&crate::config::ENV_SHM_KEY));
    }

    #[test]
    fn test_missing_agent_not_spawned() {
        let mut sup = supervisor(Path::new("/nonexistent/ringlog-agent"));
        assert!(matches!(
            sup.run(),
            Err(SupervisorError::AgentNotFound { .. })
        ));
        assert_eq!(sup.spawn_count(), 0);
        assert!(sup.child_pid().is_none());
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path());
        assert!(matches!(
            sup.validate_agent(),
            Err(SupervisorError::AgentIsDirectory { .. })
        ));
    }
}
