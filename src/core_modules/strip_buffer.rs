// THEORY:
// The `strip_buffer` module is the single shared store of the emulator: the
// current 4-byte record of every addressable pixel, packed flat exactly as it
// would sit in a real strip's shift registers. The receiver task is the only
// logical writer; any number of consumer tasks read at their own cadence.
//
// Key architectural principles:
// 1.  **Storage policy lives here**: the wire format deliberately sends more
//     records than the strip has pixels (end-of-frame padding), so writes at
//     `index >= pixel_count` are a defined silent no-op, never an error. The
//     decoder upstream stays bounds-agnostic.
// 2.  **Coalesced change notification**: a frame is tens to hundreds of
//     per-pixel writes, but consumers only want to know "did anything change
//     since I last looked". The dirty flag is set by writes and cleared by
//     `take_dirty`, collapsing a burst into one notification per poll.
// 3.  **One lock, scoped per call**: a single mutex guards the whole store.
//     Write volume is low, slots are 4 bytes, and no caller holds the guard
//     across I/O, so readers can never observe a torn record.

use std::sync::Mutex;
use std::time::Instant;

use crate::core_modules::pixel::{Byte, Bytes, PIXEL_BYTES, Pixel, PixelIndex};

#[derive(Debug)]
struct BufferState {
    /// Packed records, `pixel_count * 4` bytes, slot `i` at `i * 4`.
    data: Bytes,
    /// Set by every stored write, cleared by `take_dirty`.
    dirty: bool,
    /// When the last start marker was seen, `None` before the first frame.
    updated_at: Option<Instant>,
    /// Bytes received since the last start marker, counting the marker.
    packet_length: usize,
}

/// Concurrency-safe store of the current color of every pixel in the chain.
#[derive(Debug)]
pub struct StripBuffer {
    pixel_count: usize,
    state: Mutex<BufferState>,
}

impl StripBuffer {
    /// Allocates a buffer of `pixel_count` slots, every slot at `Pixel::OFF`.
    ///
    /// Starts dirty so a consumer's first poll renders the cleared strip.
    pub fn new(pixel_count: usize) -> Self {
        Self {
            pixel_count,
            state: Mutex::new(BufferState {
                data: off_data(pixel_count),
                dirty: true,
                updated_at: None,
                packet_length: 0,
            }),
        }
    }

    /// Stores `pixel` at `index` and marks the buffer dirty. Out-of-range
    /// indices are expected trailing protocol padding: the slot write is
    /// discarded, but the record still counts toward `packet_length`.
    pub fn apply(&self, index: PixelIndex, pixel: Pixel) {
        let mut state = self.state.lock().unwrap();
        state.packet_length += PIXEL_BYTES;
        if index < self.pixel_count {
            let offset = index * PIXEL_BYTES;
            state.data[offset] = pixel.control;
            state.data[offset + 1] = pixel.blue;
            state.data[offset + 2] = pixel.green;
            state.data[offset + 3] = pixel.red;
            state.dirty = true;
        }
    }

    /// Records a start-of-frame marker: restarts the packet byte count at
    /// the marker's own four bytes and timestamps the frame.
    pub fn apply_frame_start(&self) {
        let mut state = self.state.lock().unwrap();
        state.packet_length = PIXEL_BYTES;
        state.updated_at = Some(Instant::now());
        state.dirty = true;
    }

    /// Returns the record at `index`. Callers keep `index < pixel_count`;
    /// the mapping never yields an out-of-range index.
    pub fn get(&self, index: PixelIndex) -> Pixel {
        let state = self.state.lock().unwrap();
        let offset = index * PIXEL_BYTES;
        Pixel::new(
            state.data[offset],
            state.data[offset + 1],
            state.data[offset + 2],
            state.data[offset + 3],
        )
    }

    /// Atomically reads and clears the dirty flag: `true` exactly once per
    /// change window, then `false` until the next mutation.
    pub fn take_dirty(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let was_dirty = state.dirty;
        state.dirty = false;
        was_dirty
    }

    /// A consistent copy of the whole packed store, taken under the lock.
    pub fn snapshot(&self) -> Bytes {
        self.state.lock().unwrap().data.clone()
    }

    /// Resets every slot to `Pixel::OFF` and marks the buffer dirty.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.data = off_data(self.pixel_count);
        state.dirty = true;
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Bytes received since the last start marker, counting the marker.
    pub fn packet_length(&self) -> usize {
        self.state.lock().unwrap().packet_length
    }

    /// When the last start marker arrived, `None` before the first frame.
    pub fn updated_at(&self) -> Option<Instant> {
        self.state.lock().unwrap().updated_at
    }
}

fn off_data(pixel_count: usize) -> Bytes {
    let off: [Byte; PIXEL_BYTES] = Pixel::OFF.into();
    off.repeat(pixel_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn new_buffer_is_off_and_starts_dirty() {
        let buffer = StripBuffer::new(3);
        for index in 0..3 {
            assert_eq!(buffer.get(index), Pixel::OFF);
        }
        assert_eq!(buffer.updated_at(), None);
        assert_eq!(buffer.packet_length(), 0);
        assert!(buffer.take_dirty());
        assert!(!buffer.take_dirty());
    }

    #[test]
    fn apply_stores_and_marks_dirty_once_per_window() {
        let buffer = StripBuffer::new(4);
        buffer.take_dirty();

        let pixel = Pixel::new(0xFF, 0x01, 0x02, 0x03);
        buffer.apply(2, pixel);
        assert_eq!(buffer.get(2), pixel);
        assert!(buffer.take_dirty());
        assert!(!buffer.take_dirty());

        buffer.apply(0, Pixel::rgb(9, 9, 9));
        assert!(buffer.take_dirty());
    }

    #[test]
    fn out_of_range_apply_is_a_counted_no_op() {
        let buffer = StripBuffer::new(2);
        buffer.take_dirty();
        let before = buffer.snapshot();

        buffer.apply(2, Pixel::new(0xFF, 0xAA, 0xBB, 0xCC));
        assert_eq!(buffer.snapshot(), before);
        assert!(!buffer.take_dirty());
        // Padding records still count toward the packet length.
        assert_eq!(buffer.packet_length(), 4);
    }

    #[test]
    fn frame_start_restarts_packet_length_and_timestamps() {
        let buffer = StripBuffer::new(4);
        buffer.apply(0, Pixel::rgb(1, 1, 1));
        assert_eq!(buffer.packet_length(), 4);

        buffer.apply_frame_start();
        assert_eq!(buffer.packet_length(), 4);
        assert!(buffer.updated_at().is_some());
        assert!(buffer.take_dirty());

        buffer.apply(0, Pixel::rgb(1, 1, 1));
        buffer.apply(1, Pixel::rgb(2, 2, 2));
        assert_eq!(buffer.packet_length(), 12);
    }

    #[test]
    fn clear_resets_slots() {
        let buffer = StripBuffer::new(2);
        buffer.apply(0, Pixel::rgb(5, 6, 7));
        buffer.take_dirty();

        buffer.clear();
        assert_eq!(buffer.get(0), Pixel::OFF);
        assert_eq!(buffer.get(1), Pixel::OFF);
        assert!(buffer.take_dirty());
    }

    #[test]
    fn concurrent_reads_never_observe_a_torn_slot() {
        let buffer = Arc::new(StripBuffer::new(8));
        let first = Pixel::new(0xAA, 0xAA, 0xAA, 0xAA);
        let second = Pixel::new(0x55, 0x55, 0x55, 0x55);

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for round in 0..1000 {
                    let pixel = if round % 2 == 0 { first } else { second };
                    buffer.apply(3, pixel);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let seen = buffer.get(3);
                        assert!(
                            seen == Pixel::OFF || seen == first || seen == second,
                            "torn record: {seen:?}"
                        );
                    }
                })
            })
            .collect();

        writer.join().expect("writer thread");
        for reader in readers {
            reader.join().expect("reader thread");
        }
    }
}
