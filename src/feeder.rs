// THEORY:
// The `feeder` module is the other end of the wire: a client that paints
// frames and transmits them to a running emulator in the strip wire format.
// It exists for demos and smoke tests, but it goes through the exact same
// `StripMapping` as the emulator, so a frame painted at grid `(x, y)` lands
// on the same chain index the display side will read back.
//
// Key principles:
// 1.  Painting is addressed by grid coordinates; the mapping translates to
//     chain order. Unmapped cells and out-of-range indices are ignored, the
//     same policy the emulator applies on receive.
// 2.  Unpainted slots hold off-records, never zero bytes: a run of four
//     zeros inside a frame would read as a start marker on the wire.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::info;

use crate::core_modules::mapping::StripMapping;
use crate::core_modules::pixel::{
    Byte, Bytes, Channel, END_FRAME_BYTE, PIXEL_BYTES, Pixel, PixelIndex, START_MARKER,
};

/// End-of-frame padding length: one byte per 16 pixels, never fewer than 4.
fn end_frame_len(pixel_count: usize) -> usize {
    pixel_count.div_ceil(16).max(4)
}

/// Paints a frame payload addressed through a `StripMapping`.
pub struct FramePainter {
    mapping: Arc<StripMapping>,
    /// Packed records in chain order, `pixel_count * 4` bytes, no framing.
    payload: Bytes,
}

impl FramePainter {
    pub fn new(mapping: Arc<StripMapping>) -> Self {
        let off: [Byte; PIXEL_BYTES] = Pixel::OFF.into();
        let payload = off.repeat(mapping.pixel_count());
        Self { mapping, payload }
    }

    pub fn mapping(&self) -> &StripMapping {
        &self.mapping
    }

    /// Writes `pixel` at a chain index. `None` (an unmapped cell) and
    /// out-of-range indices are ignored.
    pub fn set(&mut self, index: Option<PixelIndex>, pixel: Pixel) {
        let Some(index) = index else {
            return;
        };
        if index >= self.mapping.pixel_count() {
            return;
        }
        let offset = index * PIXEL_BYTES;
        let record: [Byte; PIXEL_BYTES] = pixel.into();
        self.payload[offset..offset + PIXEL_BYTES].copy_from_slice(&record);
    }

    /// Writes `pixel` at a grid coordinate through the mapping.
    pub fn set_xy(&mut self, x: usize, y: usize, pixel: Pixel) {
        let index = self.mapping.get(x, y);
        self.set(index, pixel);
    }

    /// Paints every pixel of the chain one color.
    pub fn fill(&mut self, pixel: Pixel) {
        for index in 0..self.mapping.pixel_count() {
            self.set(Some(index), pixel);
        }
    }

    /// Paints every cell an independent random color.
    pub fn random(&mut self, rng: &mut impl Rng) {
        for x in 0..self.mapping.grid_width() {
            for y in 0..self.mapping.grid_height() {
                self.set_xy(x, y, random_color(rng));
            }
        }
    }

    /// Paints a bilinear blend of four random corner colors, the classic
    /// demo frame.
    pub fn corner_blend(&mut self, rng: &mut impl Rng) {
        let top_left = random_color(rng);
        let top_right = random_color(rng);
        let bottom_left = random_color(rng);
        let bottom_right = random_color(rng);

        let width = self.mapping.grid_width() as f32;
        let height = self.mapping.grid_height() as f32;
        for x in 0..self.mapping.grid_width() {
            for y in 0..self.mapping.grid_height() {
                let x_ratio = x as f32 / width;
                let top = blend(top_left, top_right, x_ratio);
                let bottom = blend(bottom_left, bottom_right, x_ratio);
                self.set_xy(x, y, blend(top, bottom, y as f32 / height));
            }
        }
    }

    /// Copies the top-left region of an image file onto the grid, one image
    /// pixel per cell. Cells past the image bounds are left untouched.
    pub fn from_image(&mut self, path: &Path) -> Result<(), image::ImageError> {
        let rgb = image::open(path)?.to_rgb8();
        let width = (rgb.width() as usize).min(self.mapping.grid_width());
        let height = (rgb.height() as usize).min(self.mapping.grid_height());
        for x in 0..width {
            for y in 0..height {
                let sample = rgb.get_pixel(x as u32, y as u32);
                self.set_xy(x, y, Pixel::rgb(sample[0], sample[1], sample[2]));
            }
        }
        Ok(())
    }

    /// The complete wire frame: start marker, payload, end-of-frame padding.
    pub fn wire_frame(&self) -> Bytes {
        let padding = end_frame_len(self.mapping.pixel_count());
        let mut frame = Vec::with_capacity(START_MARKER.len() + self.payload.len() + padding);
        frame.extend_from_slice(&START_MARKER);
        frame.extend_from_slice(&self.payload);
        frame.resize(frame.len() + padding, END_FRAME_BYTE);
        frame
    }

    /// The bare payload records, without framing.
    pub fn payload(&self) -> &[Byte] {
        &self.payload
    }
}

fn random_color(rng: &mut impl Rng) -> Pixel {
    let mut channels: [Channel; 3] = [0; 3];
    rng.fill(&mut channels[..]);
    Pixel::rgb(channels[0], channels[1], channels[2])
}

/// Linear blend of two colors; ratio 0.0 is all `from`, 1.0 is all `to`.
fn blend(from: Pixel, to: Pixel, ratio: f32) -> Pixel {
    let channel =
        |from: Channel, to: Channel| (from as f32 + (to as f32 - from as f32) * ratio) as Channel;
    Pixel::rgb(
        channel(from.red, to.red),
        channel(from.green, to.green),
        channel(from.blue, to.blue),
    )
}

/// How often a painted frame is retransmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatMode {
    /// Send one frame and return.
    Once,
    /// Send `count` frames back to back.
    Loop { count: u32 },
    /// Send `hz` frames per second until interrupted.
    Rate { hz: f64 },
}

/// TCP client speaking the strip wire format.
pub struct FrameSender {
    stream: TcpStream,
}

impl FrameSender {
    /// Connects with `TCP_NODELAY` set, so small frames leave immediately.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        info!("sending to {}", stream.peer_addr()?);
        Ok(Self { stream })
    }

    pub async fn send_frame(&mut self, frame: &[Byte]) -> io::Result<()> {
        self.stream.write_all(frame).await
    }

    /// Repaints and sends according to the repeat mode. `Rate` requires a
    /// positive frequency and runs until the connection drops or the process
    /// is interrupted.
    pub async fn run<F>(
        &mut self,
        painter: &mut FramePainter,
        mode: RepeatMode,
        mut repaint: F,
    ) -> io::Result<()>
    where
        F: FnMut(&mut FramePainter),
    {
        match mode {
            RepeatMode::Once => {
                repaint(painter);
                self.send_frame(&painter.wire_frame()).await?;
            }
            RepeatMode::Loop { count } => {
                for _ in 0..count {
                    repaint(painter);
                    self.send_frame(&painter.wire_frame()).await?;
                }
            }
            RepeatMode::Rate { hz } => {
                let pause = Duration::from_secs_f64(1.0 / hz);
                loop {
                    sleep(pause).await;
                    repaint(painter);
                    self.send_frame(&painter.wire_frame()).await?;
                }
            }
        }
        Ok(())
    }
}
