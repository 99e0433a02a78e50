//! Codec and pixel layer.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Encode JPEG / PNG** | `image` codecs |
//! | **Encode WebP (lossy)** | `webp` (libwebp) |
//! | **Resize / region crop** | `crop_imm` + Lanczos3 resampling |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for sizes and geometry (unit testable)
//! - **Parameters**: Data structures describing formats, qualities, resizes
//! - **Backend**: [`EncodeBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel operations producing derived sources

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, EncodeBackend};
pub use calculations::{
    Axis, CropArea, DimensionError, PRINT_DPI, ParseSizeError, ResizePlan, TargetAdvice,
    TargetLimits, format_file_size, locked_dimensions, output_file_name, parse_byte_size,
    plan_resize, resolve_dimensions, size_reduction_percent, target_advice, target_limits,
    to_pixels, to_pixels_at,
};
pub use operations::{crop_region, resize, target_pixels};
pub use params::{
    EncodeRequest, Format, ParseFormatError, ParseQualityError, Quality, QualityMode,
    RequestError, ResizeMethod, ResizeParams, Unit,
};
pub use rust_backend::RustBackend;
