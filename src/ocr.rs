use image::GrayImage;
use log::debug;
use serde::{ Deserialize, Serialize };

use std::process::Command;

use crate::config::OcrConfig;
use crate::error::VrError;

/// Tesseract page segmentation modes used for plates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSegMode {
    Auto,
    SingleBlock,
    SingleLine,
    SingleWord,
    /// as much text as possible in no particular order
    SparseText,
}

impl PageSegMode {

    pub fn as_arg(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::SparseText => "11",
        }
    }
}

pub trait TextRecognizer {
    fn recognize_text(&self, img: &GrayImage, mode: PageSegMode) -> Result<String, VrError>;
}

/// Runs the `tesseract` executable on a temporary PNG
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {

    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn mode(&self) -> PageSegMode {
        self.config.mode
    }

    /// first line of `tesseract --version`, fails when the executable is missing
    pub fn version(&self) -> Result<String, VrError> {
        let output = Command::new(&self.config.executable)
            .arg("--version")
            .output()
            .map_err(|e| VrError::ocr(format!("cannot run {}: {}", self.config.executable, e)))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }
}

impl TextRecognizer for TesseractOcr {

    fn recognize_text(&self, img: &GrayImage, mode: PageSegMode) -> Result<String, VrError> {
        let input = tempfile::Builder::new().suffix(".png").tempfile()?;
        img.save(input.path())?;

        let output = Command::new(&self.config.executable)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(mode.as_arg())
            .output()
            .map_err(|e| VrError::ocr(format!("cannot run {}: {}", self.config.executable, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VrError::ocr(format!("tesseract failed: {}", stderr.trim())));
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract read {:?}", text);
        Ok(text)
    }
}
