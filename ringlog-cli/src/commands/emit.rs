// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlog emit` command - Load generator.
//!
//! Writes random alphanumeric lines into the ring at a fixed interval and
//! prints the running total once per second. With a `remote` section the
//! forwarding agent is supervised as any producer would.

use std::time::Duration;

use rand::Rng;
use ringlog_core::{RemoteSink, RingBuffer};

const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Distinct lines to pick from.
const TABLE_SIZE: usize = 1000;

/// Lines are shorter than this.
const MAX_LINE_LEN: usize = 1000;

fn random_line(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(0..MAX_LINE_LEN);
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

pub async fn execute(
    config_path: &str,
    interval_ms: u64,
    count: Option<u64>,
    module: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(module) = module {
        config.module = module;
    }

    let sink = if config.remote.is_some() {
        RemoteSink::init(&config)?
    } else {
        tracing::info!("No remote section, emitting into the ring only");
        let ring = RingBuffer::attach(config.ring.key, config.ring.geometry)?;
        RemoteSink::with_ring(
            config.module.clone(),
            ringlog_core::types::DEFAULT_RETRY_BUDGET,
            ring,
        )
    };

    let mut rng = rand::thread_rng();
    let table: Vec<String> = (0..TABLE_SIZE).map(|_| random_line(&mut rng)).collect();

    tracing::info!(
        module = %sink.module(),
        interval_ms = interval_ms,
        "Emitting log lines"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut report = tokio::time::interval(Duration::from_secs(1));
    let mut emitted = 0u64;
    let mut last = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = &table[rng.gen_range(0..table.len())];
                sink.send(line);
                emitted += 1;
                if count.is_some_and(|limit| emitted >= limit) {
                    break;
                }
            }
            _ = report.tick() => {
                println!("total: {}, speed: {}/s", emitted, emitted - last);
                last = emitted;
            }
        }
    }

    println!("emitted {} lines ({})", emitted, sink.stats());
    Ok(())
}
