// THEORY:
// The `frame_decoder` module is the stateful heart of the wire protocol. It
// consumes the raw byte stream one byte at a time and turns it into two kinds
// of events: a `FrameStart` when the four-zero-byte marker is observed, and a
// `PixelUpdate` for every completed 4-byte record after it. The decoder knows
// nothing about grids, sockets, or pixel counts; it only finds record
// boundaries.
//
// Key architectural principles:
// 1.  **Look-back, never look-ahead**: the start marker is recognized on the
//     first non-zero byte AFTER four zeros. The stream has no length prefix
//     and no end marker, so the decoder can never wait for more input to
//     decide what the current byte means.
// 2.  **Parsing is not storage policy**: the decoder emits updates for every
//     record, including end-of-frame padding past the addressable range.
//     Bounds checks belong to `StripBuffer`; this keeps the parser reusable
//     for any strip length.
// 3.  **Two transport shapes, one boundary logic**: `feed` serves stream
//     sockets where bytes arrive in arbitrary slices; `decode_message` serves
//     framed senders that deliver a whole frame at once with the marker at a
//     fixed offset. The two are never mixed on one transport.

use crate::core_modules::pixel::{Byte, PIXEL_BYTES, Pixel, PixelIndex, START_MARKER};

/// Events produced by the decoder, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A start marker was observed; decoding restarted at index 0.
    FrameStart,
    /// One complete 4-byte record for the pixel at `index`.
    PixelUpdate { index: PixelIndex, pixel: Pixel },
}

/// Incremental state machine over the strip byte stream.
///
/// State persists across `feed` calls and is reset only by a start marker,
/// so a frame may arrive split across any number of reads.
pub struct FrameDecoder {
    /// The last four bytes received, most recent last. Starts at all-0xFF so
    /// a marker at the very head of the stream is detected like any other.
    window: [Byte; PIXEL_BYTES],
    /// Which pixel the next completed record updates.
    current_index: PixelIndex,
    /// Bytes accumulated toward the next record boundary.
    group_fill: usize,
    /// Bytes consumed since the last marker, counting the marker itself.
    bytes_since_start: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            window: [0xFF; PIXEL_BYTES],
            current_index: 0,
            group_fill: 0,
            bytes_since_start: 0,
        }
    }

    /// Consumes one byte, returning at most one event.
    ///
    /// A marker-detecting byte restarts group accumulation, so the same call
    /// can never yield both a `FrameStart` and a `PixelUpdate`.
    pub fn feed(&mut self, byte: Byte) -> Option<DecodeEvent> {
        let mut event = None;

        // A non-zero byte arriving while the previous four were all zero is
        // the first payload byte of a new frame.
        if byte != 0x00 && self.window == START_MARKER {
            self.current_index = 0;
            self.group_fill = 0;
            self.bytes_since_start = PIXEL_BYTES;
            event = Some(DecodeEvent::FrameStart);
        }

        self.window.rotate_left(1);
        self.window[PIXEL_BYTES - 1] = byte;
        self.group_fill += 1;

        if self.group_fill == PIXEL_BYTES {
            self.group_fill = 0;
            // An all-zero group is the reserved marker streaming in, never a
            // record; the detection branch above handles it on the next byte.
            if self.window != START_MARKER {
                let update = DecodeEvent::PixelUpdate {
                    index: self.current_index,
                    pixel: Pixel::from(self.window),
                };
                self.current_index += 1;
                self.bytes_since_start += PIXEL_BYTES;
                event = Some(update);
            }
        }

        event
    }

    /// Consumes a received chunk, collecting events in stream order.
    pub fn feed_slice(&mut self, bytes: &[Byte]) -> Vec<DecodeEvent> {
        bytes.iter().filter_map(|&byte| self.feed(byte)).collect()
    }

    /// Decodes a whole framed message: bytes 0..4 are taken as the start
    /// marker without scanning, the remainder maps sequentially from index 0,
    /// and a trailing partial record is ignored. Returns an empty event list
    /// for messages too short to hold the marker.
    pub fn decode_message(message: &[Byte]) -> Vec<DecodeEvent> {
        if message.len() < PIXEL_BYTES {
            return Vec::new();
        }
        let payload = &message[PIXEL_BYTES..];
        let mut events = Vec::with_capacity(1 + payload.len() / PIXEL_BYTES);
        events.push(DecodeEvent::FrameStart);
        for (index, record) in payload.chunks_exact(PIXEL_BYTES).enumerate() {
            events.push(DecodeEvent::PixelUpdate {
                index,
                pixel: Pixel::from(record),
            });
        }
        events
    }

    /// Bytes consumed since the last marker, counting the marker's own four.
    pub fn bytes_since_start(&self) -> usize {
        self.bytes_since_start
    }

    /// The index the next completed record will update.
    pub fn current_index(&self) -> PixelIndex {
        self.current_index
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
