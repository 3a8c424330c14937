//! Poll a location relay for one collar and report the walk when stopped.
//!
//! Run with:
//! cargo run --example relay_polling --features http -- <base_url> <device_code> [api_key]

use std::sync::Arc;
use std::time::Duration;

use pet_tracker_core::geo_utils::format_distance;
use pet_tracker_core::{
    start_polling, stop_polling, RelayClient, RelayConfig, TrackerConfig, TrackingEngine,
};
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: relay_polling <base_url> <device_code> [api_key]");
        std::process::exit(1);
    }

    let mut relay = RelayConfig::new(args[1].clone());
    relay.api_key = args.get(3).cloned();

    let client = match RelayClient::new(relay) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = TrackerConfig {
        poll_interval_ms: 2_000,
        ..TrackerConfig::default()
    };
    let engine = match TrackingEngine::with_config(config) {
        Ok(e) => Arc::new(Mutex::new(e)),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Polling {} via {}", args[2], client.endpoint());
    let handle = start_polling(engine.clone(), client, &args[2], &args[2]).await;

    tokio::time::sleep(Duration::from_secs(30)).await;

    match stop_polling(&engine, handle).await {
        Some(route) => println!(
            "Stopped: {} points, {} walked",
            route.points.len(),
            format_distance(route.distance_meters)
        ),
        None => println!("Session was replaced before stop"),
    }
}
