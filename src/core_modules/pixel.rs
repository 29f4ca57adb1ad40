// THEORY:
// The `pixel` module is the most fundamental unit of the emulator. It is a
// "dumb" data container for one wire record of the strip protocol: four bytes
// in `(control, blue, green, red)` order, exactly as they travel on the wire
// and exactly as they are stored packed in the strip buffer. Anything that
// needs more than one record (framing, grid placement, storage) belongs in
// higher modules like `FrameDecoder` or `StripMapping`.
//
// Key principles:
// 1.  Wire fidelity: field order matches byte order, so conversions are
//     position-for-position copies with no channel shuffling.
// 2.  Reserved values: four zero bytes are the start-of-frame marker and can
//     never be a valid record; `0xFF` is the control byte of a live record
//     and also the end-of-frame padding byte.

pub type Byte = u8;
pub type Bytes = Vec<Byte>;
pub type Channel = Byte;
pub type PixelIndex = usize;

/// Bytes per wire record.
pub const PIXEL_BYTES: usize = 4;

/// Start-of-frame marker: four consecutive zero bytes.
pub const START_MARKER: [Byte; PIXEL_BYTES] = [0x00; PIXEL_BYTES];

/// Value of every end-of-frame padding byte.
pub const END_FRAME_BYTE: Byte = 0xFF;

/// A "dumb" data container representing a single 4-byte wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    /// The control byte (0xFF during normal operation).
    pub control: Channel,
    /// The blue channel value (0-255).
    pub blue: Channel,
    /// The green channel value (0-255).
    pub green: Channel,
    /// The red channel value (0-255).
    pub red: Channel,
}

impl Pixel {
    /// The off state every buffer slot is initialized to: control byte at
    /// max, all color channels dark.
    pub const OFF: Pixel = Pixel {
        control: 0xFF,
        blue: 0x00,
        green: 0x00,
        red: 0x00,
    };

    pub fn new(control: Channel, blue: Channel, green: Channel, red: Channel) -> Self {
        Pixel {
            control,
            blue,
            green,
            red,
        }
    }

    /// Convenience constructor taking color channels in the familiar RGB
    /// order, with the control byte at its normal `0xFF`.
    pub fn rgb(red: Channel, green: Channel, blue: Channel) -> Self {
        Pixel::new(0xFF, blue, green, red)
    }
}

impl Default for Pixel {
    fn default() -> Self {
        Pixel::OFF
    }
}

impl From<[Byte; PIXEL_BYTES]> for Pixel {
    fn from(bytes: [Byte; PIXEL_BYTES]) -> Self {
        Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl From<&[Byte]> for Pixel {
    fn from(bytes: &[Byte]) -> Self {
        if bytes.len() != PIXEL_BYTES {
            panic!("Cannot convert {} bytes into pixel.", bytes.len());
        }
        Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl From<Pixel> for [Byte; PIXEL_BYTES] {
    fn from(pixel: Pixel) -> Self {
        [pixel.control, pixel.blue, pixel.green, pixel.red]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_record_bytes() {
        let bytes: [Byte; PIXEL_BYTES] = Pixel::OFF.into();
        assert_eq!(bytes, [0xFF, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn round_trip_wire_order() {
        let pixel = Pixel::new(0xFF, 0x10, 0x20, 0x30);
        let bytes: [Byte; PIXEL_BYTES] = pixel.into();
        assert_eq!(bytes, [0xFF, 0x10, 0x20, 0x30]);
        assert_eq!(Pixel::from(bytes), pixel);
    }

    #[test]
    fn rgb_constructor_reorders_channels() {
        let pixel = Pixel::rgb(0x01, 0x02, 0x03);
        assert_eq!(pixel.control, 0xFF);
        assert_eq!(pixel.red, 0x01);
        assert_eq!(pixel.green, 0x02);
        assert_eq!(pixel.blue, 0x03);
    }

    #[test]
    fn start_marker_is_not_a_live_record() {
        // Four zeros are reserved for framing; no live record can equal them.
        let marker = Pixel::from(START_MARKER);
        assert_ne!(marker, Pixel::OFF);
        assert_eq!(marker.control, 0x00);
    }

    #[test]
    #[should_panic(expected = "Cannot convert")]
    fn short_slice_panics() {
        let _ = Pixel::from(&[0xFF, 0x00][..]);
    }
}
