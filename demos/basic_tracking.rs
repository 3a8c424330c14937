//! Draw a yard, walk a pet out of it and back, and print the alerts.
//!
//! Run with: cargo run --example basic_tracking

use pet_tracker_core::geo_utils::format_distance;
use pet_tracker_core::{Fix, GeoPoint, MemoryLog, PolygonEditor, TrackingEngine};

fn main() {
    let log = MemoryLog::new();
    let mut engine = TrackingEngine::new()
        .with_alert_sink(log.clone())
        .with_region_store(log.clone())
        .with_route_store(log.clone());

    let config = engine.config().clone();
    println!("Pet Tracker Example\n");
    println!(
        "Config: raw threshold={}m, display threshold={}m, poll every {}ms\n",
        config.move_threshold_raw_meters,
        config.move_threshold_display_meters,
        config.poll_interval_ms
    );

    // Yard roughly 110m on a side (Khon Kaen)
    let mut editor = PolygonEditor::new();
    editor.start();
    let corners = [
        (16.4750, 102.8250),
        (16.4750, 102.8260),
        (16.4760, 102.8260),
        (16.4760, 102.8250),
    ];
    for (lat, lng) in corners {
        if let Err(e) = editor.add_vertex(GeoPoint::new(lat, lng)) {
            println!("Vertex rejected: {}", e);
        }
    }

    engine.start_tracking("collar-1");
    if let Err(e) = engine.commit_editor("collar-1", &mut editor) {
        println!("Could not save yard: {}", e);
        return;
    }
    println!("Yard saved with {} vertices\n", log.regions()[0].1.len());

    let walk = [
        (16.4755, 102.8255), // Baseline inside
        (16.4755, 102.82551), // Jitter, about 1m
        (16.4758, 102.8258),
        (16.4765, 102.8262), // Out through the corner
        (16.4770, 102.8265),
        (16.4756, 102.8256), // Back home
    ];

    for (i, (lat, lng)) in walk.iter().enumerate() {
        let fix = Fix::new(GeoPoint::new(*lat, *lng), i as i64 * 5_000);
        match engine.ingest_fix("collar-1", fix) {
            Ok(report) => println!(
                "Fix {}: raw={} display={} state={:?} total={}",
                i,
                report.outcome.accepted_to_raw,
                report.outcome.accepted_to_display,
                report.containment,
                format_distance(report.accumulated_distance_meters)
            ),
            Err(e) => println!("Fix {}: rejected ({})", i, e),
        }
    }

    println!("\nAlerts:");
    for alert in log.alerts() {
        println!(
            "  {:?} at ({:.4}, {:.4}), {} from the fence",
            alert.kind,
            alert.location.latitude,
            alert.location.longitude,
            format_distance(alert.distance_from_boundary_meters)
        );
    }

    if let Some(route) = engine.stop_tracking("collar-1") {
        println!(
            "\nRoute: {} points, {} walked",
            route.points.len(),
            format_distance(route.distance_meters)
        );
    }
}
