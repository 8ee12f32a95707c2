use std::thread;

use anyhow::Result;
use vegetrend::collect::gee::gee_collect::GeeCollect;
use vegetrend::commons::cancel::CancelToken;
use vegetrend::imagery::FsImageStore;
use vegetrend::progress::ProgressHub;
use vegetrend::trend::scan::VegetationTrend;

/// Example: four-year NDVI trend for a small area from Earth Engine.
/// Requires GEE_PROJECT (and usually GEE_TOKEN) in the environment.
fn main() -> Result<()> {
    println!("=== Example: NDVI trend from Earth Engine ===\n");

    let provider = GeeCollect::from_env()?;
    let store = FsImageStore::default();

    let hub = ProgressHub::new();
    let feed = hub.subscribe();
    let printer = thread::spawn(move || {
        while let Some(line) = feed.recv() {
            println!("[scan] {}", line);
        }
    });

    // La Rochelle, France; 4000 m^2 around the center point
    let trend = VegetationTrend::new(46.1603, -1.1511, 4000.0)?;
    println!("Scanning {} year(s) ending {}", trend.window(), trend.current_year());
    println!("  - Center: lat 46.1603, lon -1.1511");
    println!("  - Area: 4000 m^2\n");

    let trend = trend.run(&provider, &store, &hub, &CancelToken::new())?;

    println!("\nYearly averages:");
    for entry in trend.scores() {
        match entry.score {
            Some(value) => println!("  - {}: {:.4}", entry.year, value),
            None => println!("  - {}: no usable tiles", entry.year),
        }
    }

    println!("\nStored snapshots:");
    for path in trend.image_paths() {
        println!("  - {}", path.display());
    }

    drop(hub);
    let _ = printer.join();
    Ok(())
}
