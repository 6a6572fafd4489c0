// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Throughput trace file.
//!
//! Appends `begin trace`, then once per second the running total of
//! forwarded records and how many were forwarded since the previous line.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

const TRACE_INTERVAL: Duration = Duration::from_secs(1);

/// Format one trace line.
pub fn trace_line(total: u64, speed: u64) -> String {
    format!("total: {}, speed: {}/s\n", total, speed)
}

/// Start the trace task. It runs until the runtime shuts down or a write
/// fails; failures are logged and never affect forwarding.
pub fn spawn_trace(path: PathBuf, counter: Arc<AtomicU64>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_trace(&path, &counter).await {
            tracing::warn!(path = %path.display(), error = %e, "Throughput trace stopped");
        }
    })
}

async fn run_trace(path: &Path, counter: &AtomicU64) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(b"begin trace\n").await?;

    let mut interval = tokio::time::interval(TRACE_INTERVAL);
    let mut last = 0u64;
    loop {
        interval.tick().await;
        let total = counter.load(Ordering::Relaxed);
        file.write_all(trace_line(total, total.saturating_sub(last)).as_bytes())
            .await?;
        file.flush().await?;
        last = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_line() {
        assert_eq!(trace_line(1500, 250), "total: 1500, speed: 250/s\n");
    }

    #[tokio::test]
    async fn test_trace_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.trace");
        let counter = Arc::new(AtomicU64::new(7));

        let handle = spawn_trace(path.clone(), Arc::clone(&counter));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            if contents.lines().count() >= 2 {
                let lines: Vec<&str> = contents.lines().collect();
                assert_eq!(lines[0], "begin trace");
                assert_eq!(lines[1], "total: 7, speed: 7/s");
                break;
            }
            assert!(std::time::Instant::now() < deadline, "trace file not written");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
    }
}
