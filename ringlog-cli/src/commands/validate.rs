// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlog validate` command - Validate configuration file.

use ringlog_core::{ConfigLoader, Supervisor};

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Module:        {}", config.module);
            println!("Ring:");
            println!("  Key:         {}", config.ring.key);
            println!("  Capacity:    {} slots", config.ring.geometry.capacity());
            println!("  Slot Size:   {} bytes", config.ring.geometry.slot_size());
            println!(
                "  Segment:     {} bytes",
                config.ring.geometry.segment_size()
            );
            println!();

            match &config.remote {
                Some(remote) => {
                    println!("Remote:");
                    println!("  Brokers:     {}", remote.brokers);
                    println!("  Agent:       {}", remote.agent_path.display());
                    println!("  Retry Budget: {}", remote.retry_budget);

                    if let Err(e) = Supervisor::from_config(remote, &config.ring).validate_agent() {
                        println!("  ! {} (remote logging would be disabled)", e);
                    }
                }
                None => println!("Remote:        disabled"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
