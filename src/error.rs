#[cfg(feature = "tf-classifier")]
use tensorflow::Status;
use image::ImageError;

use std::error::Error;
use std::fmt;
use std::io::Error as IOError;

#[derive(Debug)]
pub struct VrError(VrErrorKind);

#[derive(Debug)]
pub enum VrErrorKind {
    IOError(IOError),
    /// The image is missing, undecodable or empty. Never used for "no plate".
    InputError(String),
    ImageError(ImageError),
    DatabaseError(rusqlite::Error),
    OcrError(String),
    ModelError(String),
    ConfigError(serde_json::Error),
    RegexError(regex::Error),
    #[cfg(feature = "tf-classifier")]
    TensorflowError(Status),
}

impl VrError {

    pub fn kind(&self) -> &VrErrorKind {
        &self.0
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self(VrErrorKind::InputError(msg.into()))
    }

    pub fn ocr(msg: impl Into<String>) -> Self {
        Self(VrErrorKind::OcrError(msg.into()))
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self(VrErrorKind::ModelError(msg.into()))
    }

    /// true when the image itself could not be used
    pub fn is_input_error(&self) -> bool {
        matches!(self.kind(), VrErrorKind::InputError(_) | VrErrorKind::ImageError(_))
    }
}

impl<T> From<T> for VrError
where T: Into<VrErrorKind>
{
    fn from(e: T) -> Self {
        Self(e.into())
    }
}

impl fmt::Display for VrError {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            VrErrorKind::IOError(e) => e.fmt(f),
            VrErrorKind::InputError(msg) => write!(f, "unusable image: {}", msg),
            VrErrorKind::ImageError(e) => write!(f, "unusable image: {}", e),
            VrErrorKind::DatabaseError(e) => write!(f, "database error: {}", e),
            VrErrorKind::OcrError(msg) => write!(f, "ocr error: {}", msg),
            VrErrorKind::ModelError(msg) => write!(f, "model error: {}", msg),
            VrErrorKind::ConfigError(e) => write!(f, "invalid config: {}", e),
            VrErrorKind::RegexError(e) => e.fmt(f),
            #[cfg(feature = "tf-classifier")]
            VrErrorKind::TensorflowError(e) => e.fmt(f),
        }
    }
}

impl Error for VrError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.kind() {
            VrErrorKind::IOError(e) => Some(e),
            VrErrorKind::ImageError(e) => Some(e),
            VrErrorKind::DatabaseError(e) => Some(e),
            VrErrorKind::ConfigError(e) => Some(e),
            VrErrorKind::RegexError(e) => Some(e),
            #[cfg(feature = "tf-classifier")]
            VrErrorKind::TensorflowError(e) => Some(e),
            VrErrorKind::InputError(_) | VrErrorKind::OcrError(_) | VrErrorKind::ModelError(_) => None,
        }
    }
}

impl From<IOError> for VrErrorKind {
    fn from(e: IOError) -> Self {
        Self::IOError(e)
    }
}

impl From<ImageError> for VrErrorKind {
    fn from(e: ImageError) -> Self {
        Self::ImageError(e)
    }
}

impl From<rusqlite::Error> for VrErrorKind {
    fn from(e: rusqlite::Error) -> Self {
        Self::DatabaseError(e)
    }
}

impl From<serde_json::Error> for VrErrorKind {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigError(e)
    }
}

impl From<regex::Error> for VrErrorKind {
    fn from(e: regex::Error) -> Self {
        Self::RegexError(e)
    }
}

#[cfg(feature = "tf-classifier")]
impl From<Status> for VrErrorKind {
    fn from(e: Status) -> Self {
        Self::TensorflowError(e)
    }
}
