//! Decode memory budgeting.
//!
//! The decoder proper works through `libtiff`-style RGBA rasters, so every
//! pixel occupies four bytes while a frame is being decoded regardless of the
//! requested output format. The estimator in this module reproduces the peak
//! working set of each decode path (whole image, strip by strip, tile by
//! tile) so a caller can reject an image before the first allocation instead
//! of aborting halfway through.

use crate::error::{BudgetError, BudgetResult, MemoryShortfall, UsageError};
use crate::BitmapFormat;

/// Bytes per pixel of the intermediate RGBA rasters.
const RASTER_PIXEL_BYTES: u64 = 4;

/// Built-in restriction for decoding without an explicit measurement,
/// sized for an 8000x8000 RGBA frame.
const DEFAULT_AVAILABLE_BYTES: u64 = 8000 * 8000 * 4;

/// How the pixel data of a frame is chunked on disk.
///
/// Determines which decode path runs and therefore which intermediate
/// buffers the estimate has to account for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChunkLayout {
    /// The frame is read in one piece
    Single,
    /// The frame is read strip by strip
    Strips { rows_per_strip: u32 },
    /// The frame is read tile by tile
    Tiles { width: u32, height: u32 },
}

impl ChunkLayout {
    /// Selects the decode path from the directory fields the caller has
    /// already read: tile dimensions win when present, strips are used when
    /// there is more than one and a strip does not cover the whole frame,
    /// and everything else falls back to a single read.
    pub fn detect(
        tile_dimensions: Option<(u32, u32)>,
        rows_per_strip: Option<u32>,
        strip_count: u32,
        image_height: u32,
    ) -> ChunkLayout {
        if let Some((width, height)) = tile_dimensions {
            if width > 0 && height > 0 {
                return ChunkLayout::Tiles { width, height };
            }
        }
        match rows_per_strip {
            Some(rows) if strip_count > 1 && rows < image_height => {
                ChunkLayout::Strips { rows_per_strip: rows }
            }
            _ => ChunkLayout::Single,
        }
    }
}

/// A rectangular region of the frame to decode instead of the whole image.
///
/// Coordinates are in full-resolution pixels. A region reaching past the
/// frame is clamped to it before any estimate is made.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodeArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DecodeArea {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> DecodeArea {
        DecodeArea {
            x,
            y,
            width,
            height,
        }
    }

    fn clamped(&self, image_width: u32, image_height: u32) -> DecodeArea {
        let x = self.x.min(image_width);
        let y = self.y.min(image_height);
        DecodeArea {
            x,
            y,
            width: self.width.min(image_width - x),
            height: self.height.min(image_height - y),
        }
    }
}

/// Frame geometry as read from the image file directory by the decoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Chunking of the pixel data
    pub layout: ChunkLayout,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32, layout: ChunkLayout) -> ImageDescriptor {
        ImageDescriptor {
            width,
            height,
            layout,
        }
    }
}

/// The budget-relevant subset of the decode options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Subsampling factor applied to both axes. Must be a power of two.
    pub sample_size: u32,
    /// Pixel format of the produced bitmap
    pub format: BitmapFormat,
    /// Region to decode instead of the full frame
    pub decode_area: Option<DecodeArea>,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            sample_size: 1,
            format: BitmapFormat::Argb8888,
            decode_area: None,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> DecodeOptions {
        DecodeOptions::default()
    }

    pub fn with_sample_size(mut self, sample_size: u32) -> DecodeOptions {
        self.sample_size = sample_size;
        self
    }

    pub fn with_format(mut self, format: BitmapFormat) -> DecodeOptions {
        self.format = format;
        self
    }

    pub fn with_decode_area(mut self, area: DecodeArea) -> DecodeOptions {
        self.decode_area = Some(area);
        self
    }
}

/// Memory limit for a decode operation.
///
/// The default allows the intermediate buffers of an 8000x8000 RGBA frame.
/// Callers that have measured the runtime's actual headroom should pass the
/// measurement through [`MemoryBudget::with_available`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryBudget {
    available_bytes: u64,
}

impl MemoryBudget {
    /// A budget from an actual measurement of available memory.
    pub fn with_available(available_bytes: u64) -> MemoryBudget {
        MemoryBudget { available_bytes }
    }

    /// A budget that never reports a shortfall.
    ///
    /// Note that decoding an excessively large image will still exhaust the
    /// machine's real memory; this merely disables the early check.
    pub fn unlimited() -> MemoryBudget {
        MemoryBudget {
            available_bytes: u64::MAX,
        }
    }

    /// Bytes this budget will allow a decode to use.
    pub fn available_bytes(&self) -> u64 {
        self.available_bytes
    }

    /// Accepts or rejects a byte requirement against this budget.
    ///
    /// On rejection the returned [`MemoryShortfall`] carries both counts, so
    /// the caller can retry with a larger `sample_size` or a smaller decode
    /// area, or surface the message as is.
    pub fn charge(&self, need_bytes: u64) -> BudgetResult<u64> {
        if need_bytes > self.available_bytes {
            Err(MemoryShortfall::new(self.available_bytes, need_bytes).into())
        } else {
            Ok(need_bytes)
        }
    }
}

impl Default for MemoryBudget {
    fn default() -> MemoryBudget {
        MemoryBudget {
            available_bytes: DEFAULT_AVAILABLE_BYTES,
        }
    }
}

fn mul(a: u64, b: u64) -> BudgetResult<u64> {
    a.checked_mul(b).ok_or(BudgetError::DimensionsTooLarge)
}

fn add(a: u64, b: u64) -> BudgetResult<u64> {
    a.checked_add(b).ok_or(BudgetError::DimensionsTooLarge)
}

/// Estimates the peak number of bytes needed to decode `image` with
/// `options`.
///
/// The estimate covers the decoded pixel buffer, the per-chunk rasters and
/// work lines of the selected decode path, the crop buffer when a decode
/// area is set, and the conversion buffer when the output format is not
/// [`BitmapFormat::Argb8888`].
pub fn estimate_decode(image: &ImageDescriptor, options: &DecodeOptions) -> BudgetResult<u64> {
    if !options.sample_size.is_power_of_two() {
        return Err(UsageError::SampleSizeNotPowerOfTwo(options.sample_size).into());
    }

    let sample = u64::from(options.sample_size);
    let width = u64::from(image.width);
    let height = u64::from(image.height);
    let area = options.decode_area.map(|a| a.clamped(image.width, image.height));

    // Dimensions of the produced bitmap.
    let (out_width, out_height) = match area {
        Some(a) => (u64::from(a.width) / sample, u64::from(a.height) / sample),
        None => (width / sample, height / sample),
    };
    let out_pixels = mul(out_width, out_height)?;

    let mut estimate = match image.layout {
        ChunkLayout::Single => {
            // The whole frame is decoded at full resolution first.
            let mut est = mul(mul(width, height)?, RASTER_PIXEL_BYTES)?;
            if area.is_some() || sample > 1 {
                // Scaled or cropped copy built from the full raster.
                est = add(est, mul(out_pixels, RASTER_PIXEL_BYTES)?)?;
            }
            est
        }
        ChunkLayout::Strips { rows_per_strip } => {
            let rows = u64::from(rows_per_strip);
            // Strips span the full frame width, so a decode area shrinks
            // only the height of the decoded pixel buffer.
            let decoded_height = match area {
                Some(a) => u64::from(a.height) / sample,
                None => height / sample,
            };
            let decoded_pixels = mul(width / sample, decoded_height)?;
            // Decoded pixels, one work line for rotation, the current and
            // the next strip rasters, and the top/bottom matrix lines used
            // while sampling.
            let mut est = mul(decoded_pixels, RASTER_PIXEL_BYTES)?;
            est = add(est, mul(width, RASTER_PIXEL_BYTES)?)?;
            est = add(est, mul(mul(width, rows)?, 2 * RASTER_PIXEL_BYTES)?)?;
            est = add(est, mul(width, 2 * RASTER_PIXEL_BYTES)?)?;
            if area.is_some() {
                est = add(est, mul(out_pixels, RASTER_PIXEL_BYTES)?)?;
            }
            est
        }
        ChunkLayout::Tiles { width: tw, height: th } => {
            let (tw, th) = (u64::from(tw), u64::from(th));
            let decoded_pixels = match area {
                // Whole tiles spanning the requested area are decoded.
                Some(a) => {
                    let first_x = u64::from(a.x) / tw;
                    let first_y = u64::from(a.y) / th;
                    let last_x = (u64::from(a.x) + u64::from(a.width)) / tw + 1;
                    let last_y = (u64::from(a.y) + u64::from(a.height)) / th + 1;
                    mul(
                        mul(last_x - first_x, tw)? / sample,
                        mul(last_y - first_y, th)? / sample,
                    )?
                }
                None => mul(width / sample, height / sample)?,
            };
            // Decoded pixels, the current/left/right tile rasters, and one
            // work line for rotation.
            let mut est = mul(decoded_pixels, RASTER_PIXEL_BYTES)?;
            est = add(est, mul(mul(tw, th)?, 3 * RASTER_PIXEL_BYTES)?)?;
            est = add(est, mul(tw, RASTER_PIXEL_BYTES)?)?;
            if area.is_some() {
                est = add(est, mul(out_pixels, RASTER_PIXEL_BYTES)?)?;
            }
            est
        }
    };

    if options.format != BitmapFormat::Argb8888 {
        estimate = add(
            estimate,
            mul(out_pixels, u64::from(options.format.bytes_per_pixel()))?,
        )?;
    }

    Ok(estimate)
}

/// Runs [`estimate_decode`] and charges the result against `budget`.
///
/// This is the check a decode routine performs right after reading the
/// directory fields and before allocating its first raster. On success the
/// estimate is returned so it can be logged or reported as progress total.
pub fn check_decode(
    image: &ImageDescriptor,
    options: &DecodeOptions,
    budget: &MemoryBudget,
) -> BudgetResult<u64> {
    budget.charge(estimate_decode(image, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_tiles() {
        let layout = ChunkLayout::detect(Some((256, 256)), Some(8), 100, 800);
        assert_eq!(
            layout,
            ChunkLayout::Tiles {
                width: 256,
                height: 256
            }
        );
    }

    #[test]
    fn detect_ignores_zero_sized_tiles() {
        let layout = ChunkLayout::detect(Some((0, 256)), Some(8), 100, 800);
        assert_eq!(layout, ChunkLayout::Strips { rows_per_strip: 8 });
    }

    #[test]
    fn detect_needs_more_than_one_strip() {
        assert_eq!(
            ChunkLayout::detect(None, Some(800), 1, 800),
            ChunkLayout::Single
        );
        assert_eq!(
            ChunkLayout::detect(None, Some(8), 100, 800),
            ChunkLayout::Strips { rows_per_strip: 8 }
        );
    }

    #[test]
    fn detect_single_strip_covering_frame() {
        assert_eq!(
            ChunkLayout::detect(None, Some(800), 2, 800),
            ChunkLayout::Single
        );
        assert_eq!(ChunkLayout::detect(None, None, 0, 800), ChunkLayout::Single);
    }

    #[test]
    fn area_clamped_to_frame() {
        let area = DecodeArea::new(100, 100, 1000, 1000).clamped(500, 300);
        assert_eq!(area, DecodeArea::new(100, 100, 400, 200));

        let offscreen = DecodeArea::new(600, 600, 10, 10).clamped(500, 300);
        assert_eq!(offscreen, DecodeArea::new(500, 300, 0, 0));
    }

    #[test]
    fn charge_boundary_is_inclusive() {
        let budget = MemoryBudget::with_available(1000);
        assert_eq!(budget.charge(1000), Ok(1000));
        assert!(budget.charge(1001).is_err());
    }
}
