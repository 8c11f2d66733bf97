//! Body color classification.
//!
//! The image is resized to a fixed frame, one pixel is read from the center of
//! each of two body regions, and the per-channel average of those two pixels
//! is matched against an ordered table of channel ranges.

use image::{ DynamicImage, RgbImage, imageops::{ self, FilterType } };
use log::debug;
use serde::{ Deserialize, Serialize };

use std::fmt;

use crate::config::ColorConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorBucket {
    White,
    /// dark gray-brown
    Smoke,
    Gray,
    Navy,
    Red,
    Black,
    Other,
}

impl ColorBucket {

    pub fn name(&self) -> &'static str {
        match self {
            ColorBucket::White => "White",
            ColorBucket::Smoke => "Smoke",
            ColorBucket::Gray => "Gray",
            ColorBucket::Navy => "Navy",
            ColorBucket::Red => "Red",
            ColorBucket::Black => "Black",
            ColorBucket::Other => "Other",
        }
    }
}

impl fmt::Display for ColorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub bucket: ColorBucket,
    pub rgb: AverageColor,
    pub confidence: f32,
}

pub struct ColorClassifier {
    config: ColorConfig,
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(ColorConfig::default())
    }
}

impl ColorClassifier {

    pub fn new(config: ColorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ColorConfig {
        &self.config
    }

    /// Bucket only
    pub fn detect(&self, img: &DynamicImage) -> ColorBucket {
        let rgb = self.average_rgb(&img.to_rgb8());
        self.classify_rgb(rgb)
    }

    /// Bucket, sampled color and confidence
    pub fn classify(&self, img: &DynamicImage) -> ColorInfo {
        let rgb = self.average_rgb(&img.to_rgb8());
        let bucket = self.classify_rgb(rgb);
        let confidence = self.confidence(rgb, bucket);
        debug!("color sample {:?} -> {} ({:.2})", rgb, bucket, confidence);
        ColorInfo { bucket, rgb, confidence }
    }

    /// Average of the two region-center pixels in the resized frame. One pixel
    /// per region, not an area mean.
    pub fn average_rgb(&self, img: &RgbImage) -> AverageColor {
        let frame = self.resize(img);
        let (width, height) = frame.dimensions();
        let [first, second] = self.config.regions.map(|region| {
            let (x, y) = region.center();
            frame.get_pixel(x.min(width - 1), y.min(height - 1)).0
        });
        let avg = |c: usize| ((first[c] as u16 + second[c] as u16) / 2) as u8;
        AverageColor { r: avg(0), g: avg(1), b: avg(2) }
    }

    /// First matching rule wins; no match is `Other`.
    pub fn classify_rgb(&self, rgb: AverageColor) -> ColorBucket {
        self.config.table.rules.iter()
            .find(|rule| rule.matches(rgb.r, rgb.g, rgb.b))
            .map(|rule| rule.bucket)
            .unwrap_or(ColorBucket::Other)
    }

    /// Mean closeness of each channel to the middle of the bucket's range,
    /// rounded to two decimals. `Other` has no range and scores 0.5.
    pub fn confidence(&self, rgb: AverageColor, bucket: ColorBucket) -> f32 {
        if bucket == ColorBucket::Other {
            return 0.5;
        }
        let rule = match self.config.table.rule_for(bucket) {
            Some(rule) => rule,
            None => return 0.0,
        };
        let score = (rule.r.score(rgb.r) + rule.g.score(rgb.g) + rule.b.score(rgb.b)) / 3.0;
        (score * 100.0).round() / 100.0
    }

    fn resize(&self, img: &RgbImage) -> RgbImage {
        let width = self.config.target_width.max(1);
        let height = self.config.target_height.max(1);
        if img.dimensions() == (width, height) {
            return img.clone();
        }
        imageops::resize(img, width, height, FilterType::Triangle)
    }
}
