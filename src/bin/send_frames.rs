// Paints test frames and sends them to a running emulator over TCP. The grid
// and topology flags must match the emulator so coordinates land on the same
// chain indices.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use strand_sim::core_modules::mapping::{
    Layout, MappingConfig, Pattern, StripMapping, ZeroLocation,
};
use strand_sim::core_modules::pixel::Pixel;
use strand_sim::emulator::{DEFAULT_HOST, DEFAULT_PORT};
use strand_sim::feeder::{FramePainter, FrameSender, RepeatMode};

const USAGE: &str = "\
Usage: send_frames [options]
  --host ADDR     emulator address (default 127.0.0.1)
  --port PORT     emulator port (default 6555)
  --grid WxH      grid size, must match the emulator (default 8x8)
  --pattern NAME  vertical | vertical-serpentine | horizontal | horizontal-serpentine
  --zero NAME     top-left | top-right | bottom-left | bottom-right
  --fill COLOR    one solid color, e.g. 255,0,64 or #RRGGBB
  --rand          independent random color per cell
  --image PATH    paint the top-left region of an image file
  --loop N        send N frames back to back
  --rate HZ       keep sending at HZ frames per second until interrupted
The default paint is a blend of four random corner colors, sent once.";

/// What each outgoing frame looks like.
enum Paint {
    Blend,
    Fill(Pixel),
    Random,
    Image(PathBuf),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // --- 1. Argument Parsing & Setup ---
    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;
    let mut grid_width = 8;
    let mut grid_height = 8;
    let mut pattern = Pattern::default();
    let mut zero_location = ZeroLocation::default();
    let mut paint = Paint::Blend;
    let mut mode = RepeatMode::Once;

    let args: Vec<String> = env::args().collect();
    let mut index = 1;
    while index < args.len() {
        let flag = args[index].as_str();
        index += 1;
        match flag {
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            "--rand" => {
                paint = Paint::Random;
                continue;
            }
            _ => {}
        }
        let value = args
            .get(index)
            .with_context(|| format!("{flag} needs a value"))?;
        match flag {
            "--host" => host = value.clone(),
            "--port" => port = value.parse().context("--port takes a number")?,
            "--grid" => (grid_width, grid_height) = parse_grid(value)?,
            "--pattern" => pattern = value.parse()?,
            "--zero" => zero_location = value.parse()?,
            "--fill" => paint = Paint::Fill(parse_color(value)?),
            "--image" => paint = Paint::Image(PathBuf::from(value)),
            "--loop" => {
                mode = RepeatMode::Loop {
                    count: value.parse().context("--loop takes a count")?,
                }
            }
            "--rate" => {
                let hz: f64 = value.parse().context("--rate takes a frequency")?;
                if hz <= 0.0 {
                    bail!("--rate must be positive");
                }
                mode = RepeatMode::Rate { hz };
            }
            _ => bail!("unrecognized option {flag}\n{USAGE}"),
        }
        index += 1;
    }

    // --- 2. Mapping & Painter Setup ---
    let mapping = Arc::new(StripMapping::new(MappingConfig {
        grid_width,
        grid_height,
        layout: Layout::Generated {
            zero_location,
            pattern,
        },
    })?);
    let mut painter = FramePainter::new(mapping);

    // Fill and image frames are painted once; random and blend repaint on
    // every send.
    let mut rng = rand::thread_rng();
    match &paint {
        Paint::Fill(pixel) => painter.fill(*pixel),
        Paint::Image(path) => painter
            .from_image(path)
            .with_context(|| format!("loading {}", path.display()))?,
        Paint::Blend | Paint::Random => {}
    }

    // --- 3. Connect & Send ---
    let mut sender = FrameSender::connect(&host, port)
        .await
        .with_context(|| format!("connecting to {host}:{port}"))?;
    sender
        .run(&mut painter, mode, |painter| match &paint {
            Paint::Blend => painter.corner_blend(&mut rng),
            Paint::Random => painter.random(&mut rng),
            Paint::Fill(_) | Paint::Image(_) => {}
        })
        .await
        .context("sending frames")?;
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

/// Parses `R,G,B` decimal channels or a `#RRGGBB` hex color.
fn parse_color(value: &str) -> Result<Pixel> {
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            bail!("hex colors look like #RRGGBB");
        }
        return Ok(Pixel::rgb(
            u8::from_str_radix(&hex[0..2], 16).context("bad red channel")?,
            u8::from_str_radix(&hex[2..4], 16).context("bad green channel")?,
            u8::from_str_radix(&hex[4..6], 16).context("bad blue channel")?,
        ));
    }
    let channels: Vec<&str> = value.split(',').collect();
    if channels.len() != 3 {
        bail!("colors look like 255,0,64 or #RRGGBB");
    }
    Ok(Pixel::rgb(
        channels[0].trim().parse().context("bad red channel")?,
        channels[1].trim().parse().context("bad green channel")?,
        channels[2].trim().parse().context("bad blue channel")?,
    ))
}
