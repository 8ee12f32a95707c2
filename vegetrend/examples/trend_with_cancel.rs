use std::thread;
use std::time::Duration;

use anyhow::Result;
use vegetrend::collect::gee::gee_collect::GeeCollect;
use vegetrend::commons::cancel::CancelToken;
use vegetrend::imagery::FsImageStore;
use vegetrend::progress::ProgressHub;
use vegetrend::trend::scan::VegetationTrend;

/// Example: cancelling a long scan from another thread, the way a request
/// handler would when its client disconnects.
fn main() -> Result<()> {
    println!("=== Example: cancelling a running scan ===\n");

    let provider = GeeCollect::from_env()?;
    let store = FsImageStore::default();
    let hub = ProgressHub::new();

    let feed = hub.subscribe();
    let printer = thread::spawn(move || {
        while let Some(line) = feed.recv() {
            println!("[scan] {}", line);
        }
    });

    let cancel = CancelToken::new();
    let trigger = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(10));
            println!("(client gone, cancelling)");
            cancel.cancel();
        })
    };

    // A large area keeps the scan busy well past the 10 s trigger.
    let mut trend = VegetationTrend::new(46.1603, -1.1511, 1_000_000.0)?;
    trend.set_window(4);

    match trend.run(&provider, &store, &hub, &cancel) {
        Ok(done) => {
            println!("Scan finished before the cancel fired:");
            for entry in done.scores() {
                println!("  - {}: {:?}", entry.year, entry.score);
            }
        }
        Err(err) => println!("Scan ended early: {}", err),
    }

    let _ = trigger.join();
    drop(hub);
    let _ = printer.join();
    Ok(())
}
