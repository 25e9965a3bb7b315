//! Image jobs offloaded to the pool: upload validation and color extraction.

pub mod color;
pub mod executor;
pub mod image;

pub use color::{dominant_color, ColorError, Rgb, ALPHA_THRESHOLD};
pub use executor::{ImageJob, ImageJobExecutor, ImageJobResult};
pub use image::{probe_dimensions, validate_image, ImageFormat, ImageInfo, ImagePolicy, ImageRejection};
