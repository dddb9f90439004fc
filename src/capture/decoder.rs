//! QR decoding with `rqrr`.

use super::{BarcodeDecoder, DecodeOptions, InversionMode, PixelBuffer};

/// QR decoder over a luma view of the pixel buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_polarity(frame: &PixelBuffer, invert: bool) -> Option<String> {
        if frame.is_empty() {
            return None;
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| {
                let luma = frame.luma(x as u32, y as u32);
                if invert { 255 - luma } else { luma }
            },
        );
        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
    }
}

impl BarcodeDecoder for RqrrDecoder {
    fn decode(&self, frame: &PixelBuffer, options: &DecodeOptions) -> Option<String> {
        match options.inversion {
            InversionMode::DontInvert => Self::decode_polarity(frame, false),
            InversionMode::OnlyInvert => Self::decode_polarity(frame, true),
            InversionMode::AttemptBoth => Self::decode_polarity(frame, false)
                .or_else(|| Self::decode_polarity(frame, true)),
        }
    }
}
