//! Benchmark I/O Library
//!
//! Data layer of an image registration benchmark. This library provides:
//! - Landmark files in CSV and plain text layouts
//! - Image loading and saving with samples normalized to `[0, 1]`
//! - Warping landmarks with bUnwarpJ raw displacement fields
//! - Resolving data folders relative to an ancestor directory
//!
//! Points are [`nalgebra::Point2<f64>`] everywhere.

pub mod config;
pub mod displacement;
pub mod image_io;
pub mod landmarks;
pub mod util;

// Re-export commonly used types
pub use config::{ConfigError, IoConfig};
pub use displacement::{warp_points, warp_points_from_reader, Channel, DisplacementError, FieldSize};
pub use image_io::{
    load_image, save_image, ImageArray, ImageData, ImageIoError, NormalizedImage,
};
pub use landmarks::{load_landmarks, save_landmarks, LandmarkError, LandmarkFormat};
pub use util::{create_dir, update_path, UtilError};
