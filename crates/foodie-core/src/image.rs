//! # Grayscale Frames & Preprocessing
//!
//! Every decoder works on 8-bit luma frames. Camera backends and image
//! uploads are converted to [`LumaImage`] at the edge, then optionally
//! enhanced before decoding.
//!
//! ## Preprocessing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Preprocessing Steps (in order)                       │
//! │                                                                         │
//! │  RGBA ──► grayscale (0.299 R + 0.587 G + 0.114 B)   from_rgba()         │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  contrast    v' = (v - 128) × factor + 128                              │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  brightness  v' = v + offset                                            │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  sharpen     3×3 kernel [0 -1 0 / -1 5 -1 / 0 -1 0], interior only     │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  binarize    v' = v > threshold ? 255 : 0                               │
//! │                                                                         │
//! │  Every step clamps to 0..=255.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Presets
//! | Preset   | contrast | brightness | sharpen | binarize |
//! |----------|----------|------------|---------|----------|
//! | None     | 1.0      | 0          | no      | no       |
//! | Basic    | 1.5      | 10         | no      | no       |
//! | Standard | 1.8      | 15         | yes     | no       |
//! | Strong   | 2.0      | 20         | yes     | 127      |

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Luma Image
// =============================================================================

/// An 8-bit grayscale image stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaImage {
    /// Wraps a luma buffer, checking it matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> CoreResult<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::EmptyImage);
        }

        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CoreError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(LumaImage {
            width,
            height,
            data,
        })
    }

    /// Creates an image of a single gray level.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        LumaImage {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Converts interleaved RGBA pixels using Rec. 601 luma weights.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> CoreResult<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(CoreError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }

        let data = rgba
            .chunks_exact(4)
            .map(|px| {
                let gray = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1])
                    + 0.114 * f32::from(px[2]);
                clamp(gray)
            })
            .collect();

        LumaImage::new(width, height, data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Returns one row of pixels.
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Nearest-neighbour downscale so the width is at most `max_width`.
    ///
    /// Aspect ratio is preserved; images already small enough are cloned.
    pub fn downscale_to_width(&self, max_width: u32) -> LumaImage {
        if max_width == 0 || self.width <= max_width {
            return self.clone();
        }

        let new_width = max_width;
        let new_height = ((u64::from(self.height) * u64::from(new_width)) / u64::from(self.width))
            .max(1) as u32;

        let mut data = Vec::with_capacity(new_width as usize * new_height as usize);
        for y in 0..new_height {
            let src_y = (u64::from(y) * u64::from(self.height) / u64::from(new_height)) as u32;
            let src_row = self.row(src_y);
            for x in 0..new_width {
                let src_x = (u64::from(x) * u64::from(self.width) / u64::from(new_width)) as usize;
                data.push(src_row[src_x]);
            }
        }

        LumaImage {
            width: new_width,
            height: new_height,
            data,
        }
    }

    /// Photographic negative, for light-on-dark symbols.
    pub fn inverted(&self) -> LumaImage {
        LumaImage {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| 255 - v).collect(),
        }
    }

    /// Mean brightness and contrast (standard deviation) of the image.
    pub fn stats(&self) -> ImageStats {
        let n = self.data.len() as f64;
        let brightness = self.data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let variance = self
            .data
            .iter()
            .map(|&v| {
                let d = f64::from(v) - brightness;
                d * d
            })
            .sum::<f64>()
            / n;

        ImageStats {
            brightness,
            contrast: variance.sqrt(),
        }
    }

    /// Applies the preprocessing steps in pipeline order.
    pub fn preprocess(&self, options: &PreprocessOptions) -> LumaImage {
        let mut out = self.clone();

        if (options.contrast - 1.0).abs() > f32::EPSILON {
            for v in out.data.iter_mut() {
                *v = clamp((f32::from(*v) - 128.0) * options.contrast + 128.0);
            }
        }

        if options.brightness != 0 {
            for v in out.data.iter_mut() {
                *v = clamp(f32::from(*v) + f32::from(options.brightness));
            }
        }

        if options.sharpen {
            out.sharpen();
        }

        if let Some(threshold) = options.binarize_threshold {
            for v in out.data.iter_mut() {
                *v = if *v > threshold { 255 } else { 0 };
            }
        }

        out
    }

    fn sharpen(&mut self) {
        let (w, h) = (self.width as usize, self.height as usize);
        if w < 3 || h < 3 {
            return;
        }

        let src = self.data.clone();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let at = |dx: isize, dy: isize| -> f32 {
                    let xx = (x as isize + dx) as usize;
                    let yy = (y as isize + dy) as usize;
                    f32::from(src[yy * w + xx])
                };
                let sum = 5.0 * at(0, 0) - at(0, -1) - at(-1, 0) - at(1, 0) - at(0, 1);
                self.data[y * w + x] = clamp(sum);
            }
        }
    }
}

#[inline]
fn clamp(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

// =============================================================================
// Preprocessing Options
// =============================================================================

/// Enhancement parameters applied before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub contrast: f32,
    pub brightness: i16,
    pub sharpen: bool,
    pub binarize_threshold: Option<u8>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessPreset::None.options()
    }
}

/// Named preprocessing strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessPreset {
    None,
    Basic,
    Standard,
    Strong,
}

impl PreprocessPreset {
    pub fn options(&self) -> PreprocessOptions {
        match self {
            PreprocessPreset::None => PreprocessOptions {
                contrast: 1.0,
                brightness: 0,
                sharpen: false,
                binarize_threshold: None,
            },
            PreprocessPreset::Basic => PreprocessOptions {
                contrast: 1.5,
                brightness: 10,
                sharpen: false,
                binarize_threshold: None,
            },
            PreprocessPreset::Standard => PreprocessOptions {
                contrast: 1.8,
                brightness: 15,
                sharpen: true,
                binarize_threshold: None,
            },
            PreprocessPreset::Strong => PreprocessOptions {
                contrast: 2.0,
                brightness: 20,
                sharpen: true,
                binarize_threshold: Some(127),
            },
        }
    }

    /// The next stronger preset, if any.
    ///
    /// `None` and `Strong` do not escalate.
    pub fn escalate(&self) -> Option<PreprocessPreset> {
        match self {
            PreprocessPreset::Basic => Some(PreprocessPreset::Standard),
            PreprocessPreset::Standard => Some(PreprocessPreset::Strong),
            PreprocessPreset::None | PreprocessPreset::Strong => None,
        }
    }
}

// =============================================================================
// Quality Analysis
// =============================================================================

/// Brightness/contrast measurements of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub brightness: f64,
    pub contrast: f64,
}

/// Coarse image quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageQuality {
    High,
    Medium,
    Low,
}

impl ImageStats {
    /// Classifies the frame.
    ///
    /// ## Rules
    /// - High: contrast > 60 and brightness in (100, 180)
    /// - Low: contrast < 30, or brightness < 80, or brightness > 200
    /// - Medium: everything else
    pub fn quality(&self) -> ImageQuality {
        if self.contrast > 60.0 && self.brightness > 100.0 && self.brightness < 180.0 {
            ImageQuality::High
        } else if self.contrast < 30.0 || self.brightness < 80.0 || self.brightness > 200.0 {
            ImageQuality::Low
        } else {
            ImageQuality::Medium
        }
    }
}

impl ImageQuality {
    /// The preset that suits this quality class.
    pub fn preset(&self) -> PreprocessPreset {
        match self {
            ImageQuality::High => PreprocessPreset::Basic,
            ImageQuality::Medium => PreprocessPreset::Standard,
            ImageQuality::Low => PreprocessPreset::Strong,
        }
    }
}

/// Builds the ordered list of presets to try for a static image.
///
/// The untouched image comes first, then the preset matching the measured
/// quality, then its escalations. At most `max_passes` entries are returned.
pub fn preprocess_plan(image: &LumaImage, max_passes: usize) -> Vec<PreprocessPreset> {
    let mut plan = vec![PreprocessPreset::None];

    let mut next = Some(image.stats().quality().preset());
    while let Some(preset) = next {
        plan.push(preset);
        next = preset.escalate();
    }

    plan.truncate(max_passes.max(1));
    plan
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_buffer_size() {
        assert!(LumaImage::new(4, 2, vec![0; 8]).is_ok());
        assert!(matches!(
            LumaImage::new(4, 2, vec![0; 7]),
            Err(CoreError::BufferSizeMismatch { actual: 7, .. })
        ));
        assert_eq!(LumaImage::new(0, 2, vec![]), Err(CoreError::EmptyImage));
    }

    #[test]
    fn test_from_rgba_weights() {
        let rgba = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
        let image = LumaImage::from_rgba(4, 1, &rgba).unwrap();
        assert_eq!(image.data(), &[76, 150, 29, 255]);
    }

    #[test]
    fn test_contrast_and_brightness() {
        let image = LumaImage::new(3, 1, vec![28, 128, 228]).unwrap();
        let options = PreprocessOptions {
            contrast: 2.0,
            brightness: 10,
            sharpen: false,
            binarize_threshold: None,
        };
        let out = image.preprocess(&options);
        // (28-128)*2+128 = -72 → 0 → +10 = 10
        assert_eq!(out.data(), &[10, 138, 255]);
    }

    #[test]
    fn test_sharpen_touches_interior_only() {
        let mut data = vec![100; 9];
        data[4] = 120;
        let image = LumaImage::new(3, 3, data).unwrap();
        let out = image.preprocess(&PreprocessOptions {
            sharpen: true,
            ..PreprocessOptions::default()
        });
        // 5*120 - 4*100 = 200
        assert_eq!(out.data()[4], 200);
        assert_eq!(out.data()[0], 100);
        assert_eq!(out.data()[8], 100);
    }

    #[test]
    fn test_binarize() {
        let image = LumaImage::new(3, 1, vec![10, 127, 128]).unwrap();
        let out = image.preprocess(&PreprocessOptions {
            binarize_threshold: Some(127),
            ..PreprocessOptions::default()
        });
        assert_eq!(out.data(), &[0, 0, 255]);
    }

    #[test]
    fn test_quality_classes() {
        let high = ImageStats {
            brightness: 140.0,
            contrast: 70.0,
        };
        let low = ImageStats {
            brightness: 60.0,
            contrast: 70.0,
        };
        let medium = ImageStats {
            brightness: 140.0,
            contrast: 45.0,
        };
        assert_eq!(high.quality(), ImageQuality::High);
        assert_eq!(low.quality(), ImageQuality::Low);
        assert_eq!(medium.quality(), ImageQuality::Medium);
    }

    #[test]
    fn test_preset_escalation() {
        assert_eq!(
            PreprocessPreset::Basic.escalate(),
            Some(PreprocessPreset::Standard)
        );
        assert_eq!(
            PreprocessPreset::Standard.escalate(),
            Some(PreprocessPreset::Strong)
        );
        assert_eq!(PreprocessPreset::Strong.escalate(), None);
    }

    #[test]
    fn test_preprocess_plan_for_flat_image() {
        // A flat image has zero contrast, so it is "low" quality
        let image = LumaImage::filled(10, 10, 128);
        assert_eq!(
            preprocess_plan(&image, 4),
            vec![PreprocessPreset::None, PreprocessPreset::Strong]
        );
        assert_eq!(preprocess_plan(&image, 1), vec![PreprocessPreset::None]);
    }

    #[test]
    fn test_inverted() {
        let image = LumaImage::new(3, 1, vec![0, 100, 255]).unwrap();
        assert_eq!(image.inverted().data(), &[255, 155, 0]);
        assert_eq!(image.inverted().inverted(), image);
    }

    #[test]
    fn test_downscale_preserves_aspect() {
        let image = LumaImage::filled(400, 100, 9);
        let small = image.downscale_to_width(200);
        assert_eq!((small.width(), small.height()), (200, 50));
        assert!(small.data().iter().all(|&v| v == 9));

        let same = image.downscale_to_width(800);
        assert_eq!(same.width(), 400);
    }
}
