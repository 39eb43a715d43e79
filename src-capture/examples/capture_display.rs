//! Capture a display for a few seconds and print the frame statistics.
//!
//!     cargo run -p framecap --features screenshots --example capture_display -- --seconds 3

use clap::Parser;
use framecap::{
    frame_callback, load_config, CapturePipeline, DisplaySelector, Screenshotter,
    ScreenshotsSource,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "capture_display")]
#[command(about = "Stream frames from one display", long_about = None)]
struct Args {
    /// Display index
    #[arg(short, long, default_value_t = 0)]
    display: u32,

    /// How long to capture
    #[arg(short, long, default_value_t = 3)]
    seconds: u64,

    /// Take a single screenshot instead of streaming
    #[arg(long)]
    screenshot: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _guard = framecap_common::logging::init_logging("capture-display")?;

    if args.screenshot {
        let mut screenshotter = Screenshotter::new(ScreenshotsSource::new());
        let frame = screenshotter.capture(
            DisplaySelector::new(args.display, 0),
            framecap::capture::DEFAULT_SCREENSHOT_TIMEOUT,
        )?;
        println!("{}x{} at {}", frame.width(), frame.height(), frame.captured_at());
        return Ok(());
    }

    let config = load_config();
    let pipeline = CapturePipeline::with_config(ScreenshotsSource::new(), &config);
    pipeline.add_stop_listener(|stopped| match &stopped.error {
        Some(e) => error!("Capture stopped: {}", e),
        None => info!("Capture stopped cleanly"),
    });

    let bytes = Arc::new(AtomicU64::new(0));
    let callback = {
        let bytes = Arc::clone(&bytes);
        frame_callback(move |frame| {
            debug!("Frame {} {}x{}", frame.number(), frame.width(), frame.height());
            bytes.fetch_add(frame.data().len() as u64, Ordering::Relaxed);
            Ok(())
        })
    };

    pipeline.start_capture(Some(callback), args.display, 0)?;
    std::thread::sleep(Duration::from_secs(args.seconds));
    pipeline.stop_capture();
    pipeline.join()?;

    println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
    println!("{} bytes delivered", bytes.load(Ordering::Relaxed));
    Ok(())
}
