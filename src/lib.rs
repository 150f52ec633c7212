//! Memory budgeting for TIFF bitmap decoding.
//!
//! Decoding a TIFF frame into a bitmap goes through intermediate RGBA
//! rasters whose size is known as soon as the image file directory has been
//! read. This crate estimates that working set up front and checks it
//! against a memory budget, so a decoder can fail fast with a structured
//! [`MemoryShortfall`] instead of aborting on a failed allocation. The
//! caller that catches the shortfall may retry with a larger sample size,
//! decode a smaller area, free other resources, or surface the message.
//!
//! The decoding itself is out of scope; the external decode routine supplies
//! the frame geometry and its chunk layout, and consults [`check_decode`]
//! before allocating.

mod budget;
mod error;

pub use self::budget::{
    check_decode, estimate_decode, ChunkLayout, DecodeArea, DecodeOptions, ImageDescriptor,
    MemoryBudget,
};
pub use self::error::{BudgetError, BudgetResult, MemoryShortfall, UsageError};

/// An enumeration over the supported bitmap pixel formats
#[derive(Copy, PartialEq, Eq, Debug, Clone, Hash)]
#[non_exhaustive]
pub enum BitmapFormat {
    /// 8 bits per channel with alpha, 4 bytes per pixel
    Argb8888,

    /// Packed 5-6-5 color, 2 bytes per pixel
    Rgb565,

    /// Alpha channel only, 1 byte per pixel
    Alpha8,
}

impl BitmapFormat {
    /// Bytes one pixel of the final bitmap occupies.
    pub fn bytes_per_pixel(&self) -> u8 {
        match *self {
            BitmapFormat::Argb8888 => 4,
            BitmapFormat::Rgb565 => 2,
            BitmapFormat::Alpha8 => 1,
        }
    }
}
