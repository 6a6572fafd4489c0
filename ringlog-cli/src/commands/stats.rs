// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlog stats` command - Show ring buffer occupancy.
//!
//! Attaches the configured ring (creating it if nobody has yet) and prints
//! its indices and fill level. Reading the indices never disturbs writers
//! or the agent.

use std::time::Duration;

use ringlog_core::{RingBuffer, RingSnapshot};

fn print_snapshot(snapshot: &RingSnapshot, usable: u32) {
    let percent = if usable == 0 {
        0.0
    } else {
        snapshot.len as f64 * 100.0 / usable as f64
    };
    println!(
        "  write={:<6} read={:<6} buffered={:>6}/{:<6} ({:5.1}%)",
        snapshot.write_index, snapshot.read_index, snapshot.len, usable, percent
    );
}

pub async fn execute(config_path: &str, watch: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let ring = RingBuffer::attach(config.ring.key, config.ring.geometry)?;

    println!("Ring {} ({})", config.ring.key, ring.geometry());
    if ring.segment().created() {
        println!("  (segment did not exist and was created empty)");
    }

    print_snapshot(&ring.snapshot(), ring.usable_capacity());
    if !watch {
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        print_snapshot(&ring.snapshot(), ring.usable_capacity());
    }
}
