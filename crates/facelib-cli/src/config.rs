use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use facelib_core::{AesGcmCipher, Codec, PlainBase64, RecognitionOptions, DEFAULT_MATCH_THRESHOLD};
use facelib_models::ModelOptions;
use serde::Deserialize;

/// How the vector field of gallery records is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherKind {
    /// Base64 only; compatible with existing gallery files, no confidentiality.
    #[default]
    Plain,
    /// AES-256-GCM, keyed from `passphrase`.
    AesGcm,
}

impl std::str::FromStr for CipherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "aes-gcm" => Ok(Self::AesGcm),
            other => bail!("unknown cipher {other:?} (expected \"plain\" or \"aes-gcm\")"),
        }
    }
}

/// CLI configuration: an optional TOML file (`FACELIB_CONFIG`) overlaid by
/// `FACELIB_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Gallery file (default: `$XDG_DATA_HOME/facelib/faces.gallery`).
    pub gallery_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub encoder_model: String,
    /// Euclidean distance below which a face matches.
    pub match_threshold: f64,
    /// Minimum detector score for a face.
    pub detection_confidence: f32,
    pub chip_size: u32,
    pub chip_margin: f32,
    /// Larger images are shrunk to this before detection.
    pub max_image_dimension: u32,
    /// Bounding square for `preview` output.
    pub preview_size: u32,
    pub cipher: CipherKind,
    /// Required when `cipher` is `aes-gcm`.
    pub passphrase: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let models = ModelOptions::default();
        let recognition = RecognitionOptions::default();
        Self {
            gallery_path: facelib_models::data_dir().join("faces.gallery"),
            model_dir: facelib_models::default_model_dir(),
            detector_model: models.detector_model,
            encoder_model: models.encoder_model,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            detection_confidence: models.detection_confidence,
            chip_size: models.chip_size,
            chip_margin: models.chip_margin,
            max_image_dimension: recognition.max_image_dimension,
            preview_size: recognition.preview_size,
            cipher: CipherKind::Plain,
            passphrase: None,
        }
    }
}

impl Config {
    /// Load the TOML file named by `FACELIB_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("FACELIB_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()?.validate()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()
    }

    /// Reject values that would silently turn every lookup into "no match".
    fn validate(self) -> Result<Self> {
        if !self.match_threshold.is_finite() || self.match_threshold <= 0.0 {
            bail!("match_threshold must be a positive number, got {}", self.match_threshold);
        }
        Ok(self)
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var("FACELIB_GALLERY_PATH") {
            self.gallery_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACELIB_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACELIB_DETECTOR_MODEL") {
            self.detector_model = v;
        }
        if let Ok(v) = std::env::var("FACELIB_ENCODER_MODEL") {
            self.encoder_model = v;
        }
        self.match_threshold = env_or("FACELIB_MATCH_THRESHOLD", self.match_threshold);
        self.detection_confidence = env_or("FACELIB_DETECTION_CONFIDENCE", self.detection_confidence);
        self.chip_size = env_or("FACELIB_CHIP_SIZE", self.chip_size);
        self.chip_margin = env_or("FACELIB_CHIP_MARGIN", self.chip_margin);
        self.max_image_dimension = env_or("FACELIB_MAX_IMAGE_DIMENSION", self.max_image_dimension);
        self.preview_size = env_or("FACELIB_PREVIEW_SIZE", self.preview_size);
        if let Ok(v) = std::env::var("FACELIB_CIPHER") {
            self.cipher = v.parse()?;
        }
        if let Ok(v) = std::env::var("FACELIB_PASSPHRASE") {
            self.passphrase = Some(v);
        }
        Ok(self)
    }

    /// Gallery codec for the configured cipher.
    pub fn codec(&self) -> Result<Codec> {
        match (self.cipher, self.passphrase.as_deref()) {
            (CipherKind::Plain, _) => Ok(Codec::new(PlainBase64)),
            (CipherKind::AesGcm, Some(passphrase)) if !passphrase.is_empty() => {
                Ok(Codec::new(AesGcmCipher::from_passphrase(passphrase)))
            }
            (CipherKind::AesGcm, _) => bail!("cipher \"aes-gcm\" requires a passphrase (FACELIB_PASSPHRASE)"),
        }
    }

    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions {
            match_threshold: self.match_threshold,
            max_image_dimension: self.max_image_dimension,
            preview_size: self.preview_size,
        }
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            detector_model: self.detector_model.clone(),
            encoder_model: self.encoder_model.clone(),
            detection_confidence: self.detection_confidence,
            chip_size: self.chip_size,
            chip_margin: self.chip_margin,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
