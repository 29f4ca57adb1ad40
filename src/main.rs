// Headless runner for the strip emulator: binds the TCP receiver, then logs
// a frame-rate sample once a second until interrupted.

use std::env;

use anyhow::{Context, Result};
use strand_sim::emulator::{Emulator, EmulatorConfig};
use tracing::info;

const USAGE: &str = "\
Usage: strand_sim [options]
  --host ADDR     listen address (default 127.0.0.1)
  --port PORT     listen port (default 6555)
  --grid WxH      grid size (default 8x8)
  --pattern NAME  vertical | vertical-serpentine | horizontal | horizontal-serpentine
  --zero NAME     top-left | top-right | bottom-left | bottom-right";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // --- 1. Argument Parsing & Setup ---
    let mut config = EmulatorConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut index = 1;
    while index < args.len() {
        let flag = args[index].as_str();
        if flag == "-h" || flag == "--help" {
            println!("{USAGE}");
            return Ok(());
        }
        index += 1;
        let value = args
            .get(index)
            .with_context(|| format!("{flag} needs a value"))?;
        match flag {
            "--host" => config.host = value.clone(),
            "--port" => config.port = value.parse().context("--port takes a number")?,
            "--grid" => (config.grid_width, config.grid_height) = parse_grid(value)?,
            "--pattern" => config.pattern = value.parse()?,
            "--zero" => config.zero_location = value.parse()?,
            _ => anyhow::bail!("unrecognized option {flag}\n{USAGE}"),
        }
        index += 1;
    }

    // --- 2. Emulator Startup ---
    let emulator = Emulator::start(config).await?;
    let buffer = emulator.buffer();
    let mut rate_rx = emulator.rate_watch();

    // --- 3. Main Loop ---
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("listening for ctrl-c")?;
                info!("interrupt received, shutting down");
                break;
            }
            changed = rate_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let sample = *rate_rx.borrow_and_update();
                info!(
                    "{} frames/s, last packet {} bytes",
                    sample.frames,
                    buffer.packet_length()
                );
            }
        }
    }

    // --- 4. Drain Tasks Before Exit ---
    emulator.shutdown().await;
    Ok(())
}

/// Parses a `WIDTHxHEIGHT` grid size like `8x8`.
fn parse_grid(value: &str) -> Result<(usize, usize)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .context("grid size must look like 8x8")?;
    Ok((
        width.trim().parse().context("grid width must be a number")?,
        height
            .trim()
            .parse()
            .context("grid height must be a number")?,
    ))
}
