//! Image loading and saving with samples normalized to `[0, 1]`.
//!
//! Images are kept as row-major `height x width x channels` arrays. Arrays
//! passed to [`save_image`] carry an explicit representation tag
//! ([`ImageData`]) so the encoder never has to guess from the value range.

use crate::util::{self, UtilError};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use log::{debug, error, info};
use std::path::{Path, PathBuf};

/// Largest value of an 8-bit sample.
const BYTE_MAX: f64 = 255.0;

#[derive(thiserror::Error, Debug)]
pub enum ImageIoError {
    #[error("Missing image: {0}")]
    MissingFile(PathBuf),
    #[error("Upper folder does not exist: {0}")]
    MissingDirectory(PathBuf),
    #[error("Array of {width}x{height}x{channels} does not match {len} samples")]
    SizeMismatch {
        width: usize,
        height: usize,
        channels: usize,
        len: usize,
    },
    #[error("Image dimension {0} does not fit the encoder")]
    TooLarge(usize),
    #[error("Unsupported number of channels: {0}")]
    ChannelCount(usize),
    #[error("Image contains non-finite samples")]
    InvalidSamples,
    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Dense `height x width x channels` sample array.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArray<T> {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<T>,
}

/// Image with floating point samples in `[0, 1]`.
pub type NormalizedImage = ImageArray<f64>;

impl<T> ImageArray<T> {
    pub fn from_vec(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<T>,
    ) -> Result<Self, ImageIoError> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels));
        if expected != Some(data.len()) {
            return Err(ImageIoError::SizeMismatch {
                width,
                height,
                channels,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Samples of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[T]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }

    fn map<U>(&self, f: impl Fn(&T) -> U) -> ImageArray<U> {
        ImageArray {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl NormalizedImage {
    /// Largest sample, `0.0` for an empty image.
    pub fn max_value(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, &v| acc.max(v))
    }

    /// Scale to 8-bit samples: multiply by 255, round and clamp.
    pub fn to_bytes(&self) -> ImageArray<u8> {
        self.map(|&v| (v * BYTE_MAX).round().clamp(0.0, BYTE_MAX) as u8)
    }
}

impl ImageArray<u8> {
    pub fn to_normalized(&self) -> NormalizedImage {
        self.map(|&v| f64::from(v) / BYTE_MAX)
    }
}

/// Sample array tagged with how its values should be read.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Floating point samples in `[0, 1]`.
    Normalized(NormalizedImage),
    /// 8-bit samples in `[0, 255]`.
    RawByte(ImageArray<u8>),
}

impl ImageData {
    pub fn to_bytes(&self) -> ImageArray<u8> {
        match self {
            ImageData::Normalized(image) => image.to_bytes(),
            ImageData::RawByte(image) => image.clone(),
        }
    }
}

impl From<NormalizedImage> for ImageData {
    fn from(image: NormalizedImage) -> Self {
        ImageData::Normalized(image)
    }
}

impl From<ImageArray<u8>> for ImageData {
    fn from(image: ImageArray<u8>) -> Self {
        ImageData::RawByte(image)
    }
}

/// Load an image with samples in `[0, 1]`.
///
/// Raw samples are divided by 255 until the maximum is at most 1, which covers
/// 8-bit images as well as 16-bit and already normalized float images.
///
/// # Errors
///
/// * [`ImageIoError::MissingFile`] if `path` does not exist
/// * [`ImageIoError::ImageError`] if decoding fails
/// * [`ImageIoError::InvalidSamples`] for float images holding NaN or infinity
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<NormalizedImage, ImageIoError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImageIoError::MissingFile(path.to_path_buf()));
    }
    let img = image::open(path)?;
    let mut array = dynamic_to_array(img)?;
    normalize_in_place(&mut array)?;
    debug!(
        "Loaded image {} of shape {:?}",
        path.display(),
        array.shape()
    );
    Ok(array)
}

fn dynamic_to_array(img: DynamicImage) -> Result<NormalizedImage, ImageIoError> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let channels = usize::from(img.color().channel_count());

    let data: Vec<f64> = match img {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLumaA8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgb8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgba8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLumaA16(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgb16(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgba16(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgb32F(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageRgba32F(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        other => {
            let channels = if other.color().has_alpha() { 4 } else { 3 };
            let data = if channels == 4 {
                other.into_rgba32f().into_raw()
            } else {
                other.into_rgb32f().into_raw()
            };
            return ImageArray::from_vec(
                width,
                height,
                channels,
                data.into_iter().map(f64::from).collect(),
            );
        }
    };
    ImageArray::from_vec(width, height, channels, data)
}

fn normalize_in_place(array: &mut NormalizedImage) -> Result<(), ImageIoError> {
    if array.data.iter().any(|v| !v.is_finite()) {
        return Err(ImageIoError::InvalidSamples);
    }
    while array.max_value() > 1.0 {
        array.data.iter_mut().for_each(|v| *v /= BYTE_MAX);
    }
    Ok(())
}

/// Convert a tagged array into an 8-bit image ready for encoding.
///
/// 1, 2, 3 and 4 channels map to gray, gray-alpha, RGB and RGBA.
pub fn convert_to_dynamic_image(image: &ImageData) -> Result<DynamicImage, ImageIoError> {
    let bytes = image.to_bytes();
    let (width, height, channels) = (bytes.width, bytes.height, bytes.channels);
    let size_error = ImageIoError::SizeMismatch {
        width,
        height,
        channels,
        len: bytes.data.len(),
    };
    let width = u32::try_from(width).map_err(|_| ImageIoError::TooLarge(width))?;
    let height = u32::try_from(height).map_err(|_| ImageIoError::TooLarge(height))?;
    let raw = bytes.into_data();

    let img = match channels {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or(size_error)?),
        2 => DynamicImage::ImageLumaA8(
            GrayAlphaImage::from_raw(width, height, raw).ok_or(size_error)?,
        ),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or(size_error)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, raw).ok_or(size_error)?),
        n => return Err(ImageIoError::ChannelCount(n)),
    };
    Ok(img)
}

/// Save the image, the format is inferred from the file extension.
///
/// # Errors
///
/// * [`ImageIoError::MissingDirectory`] if the destination folder is missing
/// * [`ImageIoError::ChannelCount`] for arrays that are not 1 to 4 channels
/// * [`ImageIoError::ImageError`] if encoding fails
pub fn save_image<P: AsRef<Path>>(path: P, image: &ImageData) -> Result<(), ImageIoError> {
    let path = path.as_ref();
    let img = convert_to_dynamic_image(image)?;
    if let Err(UtilError::MissingDirectory(dir)) = util::ensure_parent_dir(path) {
        error!("Upper folder does not exist: {}", dir.display());
        return Err(ImageIoError::MissingDirectory(dir));
    }
    img.save(path)?;
    info!("Saved image {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn gradient_bytes(width: usize, height: usize, channels: usize) -> ImageArray<u8> {
        let data = (0..width * height * channels)
            .map(|i| ((i * 7) % 256) as u8)
            .collect();
        ImageArray::from_vec(width, height, channels, data).unwrap()
    }

    #[test]
    fn test_from_vec_checks_size() {
        assert!(ImageArray::from_vec(2, 2, 3, vec![0u8; 12]).is_ok());
        assert!(matches!(
            ImageArray::from_vec(2, 2, 3, vec![0u8; 11]),
            Err(ImageIoError::SizeMismatch { len: 11, .. })
        ));
    }

    #[test]
    fn test_pixel_access() {
        let array = gradient_bytes(3, 2, 3);
        assert_eq!(array.shape(), (2, 3, 3));
        assert_eq!(array.pixel(1, 1), Some(&array.data()[12..15]));
        assert_eq!(array.pixel(3, 0), None);
        assert_eq!(array.pixel(0, 2), None);
    }

    #[test]
    fn test_normalized_to_bytes_rounds_and_clamps() {
        let image = NormalizedImage::from_vec(4, 1, 1, vec![0.0, 0.5, 1.0, 1.2]).unwrap();
        assert_eq!(image.to_bytes().data(), &[0, 128, 255, 255]);

        let negative = NormalizedImage::from_vec(1, 1, 1, vec![-0.3]).unwrap();
        assert_eq!(negative.to_bytes().data(), &[0]);
    }

    #[test]
    fn test_normalize_repeats_division() {
        let mut sixteen_bit =
            NormalizedImage::from_vec(2, 1, 1, vec![0.0, 65025.0]).unwrap();
        normalize_in_place(&mut sixteen_bit).unwrap();
        assert_relative_eq!(sixteen_bit.max_value(), 1.0, epsilon = 1e-12);

        let mut already = NormalizedImage::from_vec(2, 1, 1, vec![0.2, 0.9]).unwrap();
        normalize_in_place(&mut already).unwrap();
        assert_eq!(already.data(), &[0.2, 0.9]);

        let mut broken = NormalizedImage::from_vec(1, 1, 1, vec![f64::INFINITY]).unwrap();
        assert!(matches!(
            normalize_in_place(&mut broken),
            Err(ImageIoError::InvalidSamples)
        ));
    }

    #[test]
    fn test_convert_channel_counts() {
        for (channels, expected) in [
            (1, image::ColorType::L8),
            (2, image::ColorType::La8),
            (3, image::ColorType::Rgb8),
            (4, image::ColorType::Rgba8),
        ] {
            let img = convert_to_dynamic_image(&gradient_bytes(3, 2, channels).into()).unwrap();
            assert_eq!(img.color(), expected);
            assert_eq!((img.width(), img.height()), (3, 2));
        }
        assert!(matches!(
            convert_to_dynamic_image(&gradient_bytes(3, 2, 5).into()),
            Err(ImageIoError::ChannelCount(5))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_convert_rejects_oversized_width() {
        let wide = u32::MAX as usize + 1;
        let empty = ImageArray::<u8>::from_vec(wide, 0, 1, Vec::new()).unwrap();
        match convert_to_dynamic_image(&empty.into()) {
            Err(ImageIoError::TooLarge(width)) => assert_eq!(width, wide),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_save_load_png_raw_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test_image.png");
        let original = gradient_bytes(16, 8, 3);
        save_image(&path, &ImageData::RawByte(original.clone())).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.shape(), (8, 16, 3));
        assert!(loaded.max_value() <= 1.0);
        assert_eq!(loaded.to_bytes(), original);
    }

    #[test]
    fn test_save_load_png_normalized() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gray.png");
        let data: Vec<f64> = (0..50u32).map(|i| f64::from(i) / 49.0).collect();
        let original = NormalizedImage::from_vec(10, 5, 1, data).unwrap();
        save_image(&path, &original.clone().into()).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.shape(), (5, 10, 1));
        for (a, b) in loaded.data().iter().zip(original.data()) {
            assert!((a - b).abs() <= 0.5 / BYTE_MAX + 1e-12);
        }
    }

    #[test]
    fn test_save_load_jpeg_stays_normalized() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test_image.jpg");
        save_image(&path, &gradient_bytes(50, 50, 3).into()).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.shape(), (50, 50, 3));
        assert!(loaded.max_value() <= 1.0);
    }

    #[test]
    fn test_missing_paths() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_image(tmp.path().join("nope.png")),
            Err(ImageIoError::MissingFile(_))
        ));

        let path = tmp.path().join("missing").join("out.png");
        assert!(matches!(
            save_image(&path, &gradient_bytes(2, 2, 1).into()),
            Err(ImageIoError::MissingDirectory(_))
        ));
        assert!(!path.exists());
    }
}
