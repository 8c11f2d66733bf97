//! Tunable thresholds for every stage of recognition.
//!
//! A JSON file can override any subset of the fields; everything missing
//! falls back to the defaults below.

use serde::{ Deserialize, Serialize };
use log::info;

use std::fs;
use std::path::Path;

use crate::color::ColorBucket;
use crate::error::VrError;
use crate::ocr::PageSegMode;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub locator: LocatorParams,
    pub color: ColorConfig,
    pub plate: PlateGrammar,
    pub classifier: ClassifierConfig,
    pub ocr: OcrConfig,
}

impl RecognitionConfig {

    pub fn load(path: impl AsRef<Path>) -> Result<Self, VrError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }
}

/// Plate localisation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// only this many of the largest contours are considered
    pub max_candidates: usize,
    /// polygon approximation tolerance as a fraction of the perimeter
    pub epsilon_factor: f64,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            bilateral_diameter: 11,
            sigma_color: 17.0,
            sigma_space: 17.0,
            canny_low: 30.0,
            canny_high: 200.0,
            max_candidates: 10,
            epsilon_factor: 0.02,
        }
    }
}

/// Rows `[top, bottom)` and columns `[left, right)` of the resized frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleRegion {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl SampleRegion {

    /// (x, y) of the center pixel, integer division as in array indexing
    pub fn center(&self) -> (u32, u32) {
        let height = self.bottom.saturating_sub(self.top);
        let width = self.right.saturating_sub(self.left);
        (self.left + width / 2, self.top + height / 2)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub regions: [SampleRegion; 2],
    pub table: ColorTable,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            target_width: 600,
            target_height: 450,
            regions: [
                SampleRegion { top: 100, bottom: 250, left: 100, right: 350 },
                SampleRegion { top: 100, bottom: 250, left: 350, right: 600 },
            ],
            table: ColorTable::default(),
        }
    }
}

/// Bounds for one channel. `min`/`max` double as the scoring range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: u8,
    pub max: u8,
    #[serde(default)]
    pub min_inclusive: bool,
    #[serde(default)]
    pub max_inclusive: bool,
}

impl ChannelRange {

    /// (min, max)
    pub const fn open(min: u8, max: u8) -> Self {
        Self { min, max, min_inclusive: false, max_inclusive: false }
    }

    /// [min, max)
    pub const fn half_open(min: u8, max: u8) -> Self {
        Self { min, max, min_inclusive: true, max_inclusive: false }
    }

    /// [min, max]
    pub const fn closed(min: u8, max: u8) -> Self {
        Self { min, max, min_inclusive: true, max_inclusive: true }
    }

    pub fn contains(&self, value: u8) -> bool {
        let above = if self.min_inclusive { value >= self.min } else { value > self.min };
        let below = if self.max_inclusive { value <= self.max } else { value < self.max };
        above && below
    }

    /// 1.0 at the midpoint falling to 0.0 at either end of the range
    pub fn score(&self, value: u8) -> f32 {
        let width = self.max as f32 - self.min as f32;
        if width <= 0.0 {
            return 1.0;
        }
        let mid = (self.min as f32 + self.max as f32) / 2.0;
        let distance = (value as f32 - mid).abs() / (width / 2.0);
        1.0 - distance.min(1.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketRule {
    pub bucket: ColorBucket,
    pub r: ChannelRange,
    pub g: ChannelRange,
    pub b: ChannelRange,
}

impl BucketRule {

    pub fn matches(&self, r: u8, g: u8, b: u8) -> bool {
        self.b.contains(b) && self.g.contains(g) && self.r.contains(r)
    }
}

/// Ordered rules; the first match wins, so order is significant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorTable {
    pub rules: Vec<BucketRule>,
}

impl ColorTable {

    pub fn rule_for(&self, bucket: ColorBucket) -> Option<&BucketRule> {
        self.rules.iter().find(|rule| rule.bucket == bucket)
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        let rules = vec![
            BucketRule {
                bucket: ColorBucket::White,
                r: ChannelRange::half_open(170, 255),
                g: ChannelRange::half_open(180, 255),
                b: ChannelRange::half_open(180, 255),
            },
            BucketRule {
                bucket: ColorBucket::Smoke,
                r: ChannelRange::open(110, 150),
                g: ChannelRange::open(110, 150),
                b: ChannelRange::open(110, 150),
            },
            BucketRule {
                bucket: ColorBucket::Gray,
                r: ChannelRange::open(150, 170),
                g: ChannelRange::open(150, 180),
                b: ChannelRange::open(150, 180),
            },
            BucketRule {
                bucket: ColorBucket::Navy,
                r: ChannelRange::open(0, 150),
                g: ChannelRange::open(25, 150),
                b: ChannelRange::open(130, 255),
            },
            BucketRule {
                bucket: ColorBucket::Red,
                r: ChannelRange::open(100, 255),
                g: ChannelRange::open(0, 150),
                b: ChannelRange::open(0, 150),
            },
            // blue is the only channel allowed to sit on 110
            BucketRule {
                bucket: ColorBucket::Black,
                r: ChannelRange::half_open(0, 110),
                g: ChannelRange::half_open(0, 110),
                b: ChannelRange::closed(0, 110),
            },
        ];
        Self { rules }
    }
}

/// Structure of a Turkish plate and the weights of the confidence heuristic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateGrammar {
    /// characters dropped before the alphanumeric filter
    pub noise_chars: String,
    pub leading_digits: usize,
    pub min_letters: usize,
    pub max_letters: usize,
    pub min_trailing_digits: usize,
    pub max_trailing_digits: usize,
    pub length_band: (usize, usize),
    pub letter_band: (usize, usize),
    pub digit_band: (usize, usize),
    pub length_weight: f32,
    pub format_weight: f32,
    pub balance_weight: f32,
}

impl PlateGrammar {

    pub fn pattern(&self) -> String {
        format!(
            "^[0-9]{{{}}}[A-Z]{{{},{}}}[0-9]{{{},{}}}$",
            self.leading_digits,
            self.min_letters,
            self.max_letters,
            self.min_trailing_digits,
            self.max_trailing_digits
        )
    }
}

impl Default for PlateGrammar {
    fn default() -> Self {
        Self {
            noise_chars: " ?.!/\\;:'()-{}][&,|»¢*§°".to_string(),
            leading_digits: 2,
            min_letters: 1,
            max_letters: 3,
            min_trailing_digits: 1,
            max_trailing_digits: 4,
            length_band: (7, 10),
            letter_band: (1, 3),
            digit_band: (3, 6),
            length_weight: 0.3,
            format_weight: 0.5,
            balance_weight: 0.2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// keras target_size is (height, width) = (600, 450)
    pub input_width: u32,
    pub input_height: u32,
    pub input_op: String,
    pub output_op: String,
    pub labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_width: 450,
            input_height: 600,
            input_op: "input_1".to_string(),
            output_op: "dense_2/Softmax".to_string(),
            labels: vec![
                "2012_2014_Ford Focus Ön".to_string(),
                "2012_2014_Ford Focus Arka".to_string(),
                "2016_2019_Honda Civic Ön".to_string(),
                "2016_2019_Honda Civic Arka".to_string(),
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub executable: String,
    pub language: String,
    pub mode: PageSegMode,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            executable: "tesseract".to_string(),
            language: "eng".to_string(),
            mode: PageSegMode::SparseText,
        }
    }
}
