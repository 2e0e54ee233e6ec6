//! Image file I/O at the boundary of the painting core.
//!
//! Decodes PNG/JPG files into [`Mat`] buffers and encodes them back.
//! Color images can be converted to linear RGB on read (and from linear
//! RGB on write); grayscale reads normalize to [0, 1].

use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageReader, Luma, Rgb};
use impasto_core::color::ColorConverter;
use impasto_core::mat::Mat;
use impasto_core::vec::Vec3;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid image format: {0}")]
    InvalidFormat(String),

    #[error("write failed: {0}")]
    WriteFailed(String),
}

fn open(path: &Path) -> Result<DynamicImage, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.display().to_string()));
    }
    ImageReader::open(path)
        .map_err(|e| IoError::NotFound(format!("{}: {e}", path.display())))?
        .decode()
        .map_err(|e| IoError::InvalidFormat(format!("{}: {e}", path.display())))
}

/// Read a color image. With `to_linear` the sRGB values are gamma
/// expanded to linear RGB.
pub fn read_image_rgb(path: impl AsRef<Path>, to_linear: bool) -> Result<Mat<Vec3>, IoError> {
    let path = path.as_ref();
    let img = open(path)?.to_rgb32f();
    let (w, h) = (img.width() as usize, img.height() as usize);
    debug!(path = %path.display(), w, h, to_linear, "read color image");

    let con = ColorConverter::default();
    Ok(Mat::from_fn(h, w, |r, c| {
        let p = img.get_pixel(c as u32, r as u32);
        let srgb = Vec3::new(p.0[0] as f64, p.0[1] as f64, p.0[2] as f64);
        if to_linear { con.srgb_to_rgb(srgb) } else { srgb }
    }))
}

/// Read a grayscale image normalized to [0, 1].
pub fn read_image_gray(path: impl AsRef<Path>) -> Result<Mat<f64>, IoError> {
    let path = path.as_ref();
    let img = open(path)?.to_luma16();
    let (w, h) = (img.width() as usize, img.height() as usize);
    debug!(path = %path.display(), w, h, "read grayscale image");

    Ok(Mat::from_fn(h, w, |r, c| {
        img.get_pixel(c as u32, r as u32).0[0] as f64 / u16::MAX as f64
    }))
}

/// Write a color image as 16-bit PNG (or 8-bit for other extensions).
/// With `from_linear` the values are gamma compressed to sRGB first.
pub fn write_image_rgb(
    path: impl AsRef<Path>,
    mat: &Mat<Vec3>,
    from_linear: bool,
) -> Result<(), IoError> {
    let path = path.as_ref();
    let con = ColorConverter::default();
    let (rows, cols) = (mat.rows(), mat.cols());

    let srgb = |r: usize, c: usize| -> Vec3 {
        let v = mat[(r, c)];
        let v = if from_linear { con.rgb_to_srgb(v) } else { v };
        v.clamp(Vec3::ZERO, Vec3::ONE)
    };

    let is_png = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false);
    debug!(path = %path.display(), rows, cols, is_png, "write color image");

    if is_png {
        let mut buf: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::new(cols as u32, rows as u32);
        for (x, y, p) in buf.enumerate_pixels_mut() {
            let v = srgb(y as usize, x as usize) * u16::MAX as f64;
            *p = Rgb([v.x.round() as u16, v.y.round() as u16, v.z.round() as u16]);
        }
        buf.save(path)
            .map_err(|e| IoError::WriteFailed(format!("{}: {e}", path.display())))
    } else {
        let mut buf: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(cols as u32, rows as u32);
        for (x, y, p) in buf.enumerate_pixels_mut() {
            let v = srgb(y as usize, x as usize) * u8::MAX as f64;
            *p = Rgb([v.x.round() as u8, v.y.round() as u8, v.z.round() as u8]);
        }
        buf.save(path)
            .map_err(|e| IoError::WriteFailed(format!("{}: {e}", path.display())))
    }
}

/// Write a scalar field in [0, 1] as a grayscale image.
pub fn write_image_gray(path: impl AsRef<Path>, mat: &Mat<f64>) -> Result<(), IoError> {
    let path = path.as_ref();
    let (rows, cols) = (mat.rows(), mat.cols());
    debug!(path = %path.display(), rows, cols, "write grayscale image");

    let mut buf: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(cols as u32, rows as u32);
    for (x, y, p) in buf.enumerate_pixels_mut() {
        let v = mat[(y as usize, x as usize)].clamp(0.0, 1.0) * u16::MAX as f64;
        *p = Luma([v.round() as u16]);
    }
    buf.save(path)
        .map_err(|e| IoError::WriteFailed(format!("{}: {e}", path.display())))
}
