// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGB24
//!
//! Every backend hands frames to the capture loop as RGB24. Devices that
//! deliver a different layout are converted here.

use crate::errors::{CaptureError, CaptureResult};

/// Device pixel layouts the backends know how to convert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// 24-bit RGB, possibly with padded rows
    Rgb24,
    /// 24-bit BGR, possibly with padded rows
    Bgr24,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    Yuyv,
    /// Motion JPEG, one JPEG image per frame
    Mjpeg,
}

impl SourceFormat {
    /// Map a V4L2 FourCC code to a convertible layout
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(SourceFormat::Rgb24),
            b"BGR3" => Some(SourceFormat::Bgr24),
            b"YUYV" => Some(SourceFormat::Yuyv),
            b"MJPG" => Some(SourceFormat::Mjpeg),
            _ => None,
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            SourceFormat::Rgb24 => *b"RGB3",
            SourceFormat::Bgr24 => *b"BGR3",
            SourceFormat::Yuyv => *b"YUYV",
            SourceFormat::Mjpeg => *b"MJPG",
        }
    }

    /// Preference when a resolution is offered in several layouts
    ///
    /// Lower is better: RGB needs no conversion, MJPEG needs a full decode.
    pub fn preference(&self) -> u8 {
        match self {
            SourceFormat::Rgb24 => 0,
            SourceFormat::Bgr24 => 1,
            SourceFormat::Yuyv => 2,
            SourceFormat::Mjpeg => 3,
        }
    }
}

/// Convert one raw frame to RGB24
///
/// Returns `(data, stride)`; strided RGB input is passed through unchanged.
pub fn to_rgb24(
    format: SourceFormat,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
) -> CaptureResult<(Vec<u8>, u32)> {
    let packed_stride = width * 3;
    match format {
        SourceFormat::Rgb24 => {
            let stride = stride.max(packed_stride);
            check_len(data, stride as usize * height as usize, "RGB24")?;
            Ok((data.to_vec(), stride))
        }
        SourceFormat::Bgr24 => {
            let stride = stride.max(packed_stride);
            check_len(data, stride as usize * height as usize, "BGR24")?;
            Ok((bgr_to_rgb(data, width, height, stride), packed_stride))
        }
        SourceFormat::Yuyv => {
            let stride = stride.max(width * 2);
            check_len(data, stride as usize * height as usize, "YUYV")?;
            Ok((yuyv_to_rgb(data, width, height, stride), packed_stride))
        }
        SourceFormat::Mjpeg => {
            let rgb = mjpeg_to_rgb(data)?;
            if rgb.width() != width || rgb.height() != height {
                return Err(CaptureError::BackendRuntimeError(format!(
                    "MJPEG frame is {}x{}, expected {}x{}",
                    rgb.width(),
                    rgb.height(),
                    width,
                    height
                )));
            }
            Ok((rgb.into_raw(), packed_stride))
        }
    }
}

fn check_len(data: &[u8], expected: usize, what: &str) -> CaptureResult<()> {
    if data.len() < expected {
        return Err(CaptureError::BackendRuntimeError(format!(
            "short {} frame: {} bytes, expected {}",
            what,
            data.len(),
            expected
        )));
    }
    Ok(())
}

/// Convert YUYV (YUV 4:2:2) to packed RGB24
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = stride as usize;
    let mut rgb = Vec::with_capacity(w * h * 3);

    for row in 0..h {
        let start = row * stride;
        let line = &data[start..start + w * 2];

        for chunk in line.chunks_exact(4) {
            let y0 = chunk[0] as f32;
            let u = chunk[1] as f32 - 128.0;
            let y1 = chunk[2] as f32;
            let v = chunk[3] as f32 - 128.0;

            for y in [y0, y1] {
                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
                rgb.extend_from_slice(&[r, g, b]);
            }
        }

        // Odd widths leave one trailing Y sample without chroma
        if w % 2 == 1 {
            let y = line[(w - 1) * 2];
            rgb.extend_from_slice(&[y, y, y]);
        }
    }

    rgb
}

/// Convert strided BGR24 to packed RGB24
pub fn bgr_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let row = width as usize * 3;
    let stride = stride as usize;
    let mut rgb = Vec::with_capacity(row * height as usize);

    for y in 0..height as usize {
        let start = y * stride;
        for px in data[start..start + row].chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }

    rgb
}

/// Decode one MJPEG frame
pub fn mjpeg_to_rgb(data: &[u8]) -> CaptureResult<image::RgbImage> {
    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .map_err(|e| CaptureError::BackendRuntimeError(format!("MJPEG decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_white() {
        // Pure white in YUV (Y=255, U=128, V=128)
        let yuyv = vec![255u8, 128, 255, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1, 4);

        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| c > 250));
    }

    #[test]
    fn test_yuyv_respects_stride() {
        // 2x2 with 4 bytes of padding per row; padding must be ignored
        let yuyv = vec![
            0u8, 128, 0, 128, 0xAA, 0xAA, 0xAA, 0xAA, //
            255, 128, 255, 128, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        let rgb = yuyv_to_rgb(&yuyv, 2, 2, 8);

        assert_eq!(rgb.len(), 12);
        assert!(rgb[..6].iter().all(|&c| c < 5));
        assert!(rgb[6..].iter().all(|&c| c > 250));
    }

    #[test]
    fn test_bgr_to_rgb() {
        let bgr = vec![1, 2, 3, 4, 5, 6, 0, 0];
        assert_eq!(bgr_to_rgb(&bgr, 2, 1, 8), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_rgb_passthrough_keeps_stride() {
        let data = vec![9u8; 16];
        let (rgb, stride) = to_rgb24(SourceFormat::Rgb24, &data, 2, 2, 8).unwrap();
        assert_eq!(stride, 8);
        assert_eq!(rgb.len(), 16);
    }

    #[test]
    fn test_short_frame_is_runtime_error() {
        let err = to_rgb24(SourceFormat::Yuyv, &[0u8; 3], 2, 2, 0).unwrap_err();
        assert!(matches!(err, CaptureError::BackendRuntimeError(_)));
    }

    #[test]
    fn test_mjpeg_roundtrip_decode() {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let (rgb, stride) = to_rgb24(SourceFormat::Mjpeg, &jpeg, 4, 2, 0).unwrap();
        assert_eq!(stride, 12);
        assert_eq!(rgb.len(), 24);
        assert!(rgb[0] > 150);
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(SourceFormat::from_fourcc(b"YUYV"), Some(SourceFormat::Yuyv));
        assert_eq!(SourceFormat::from_fourcc(b"H264"), None);
        assert_eq!(&SourceFormat::Mjpeg.fourcc(), b"MJPG");
    }
}
