//! OCR text extraction
//!
//! Best-effort by contract: a failing or missing engine degrades to an empty
//! extraction, never a hard failure. Barcode candidates are digit runs of
//! retail-barcode length found in the recognized text.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::types::{OcrEngine, OcrError};

/// 8-13 consecutive digits bounded by non-digits
static BARCODE_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{8,13}\b").expect("barcode candidate pattern is valid"));

/// Text recognized in a packaging photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrExtraction {
    /// Raw engine output, possibly empty
    pub raw_text: String,
}

impl OcrExtraction {
    /// Barcode-shaped digit runs, in reading order
    ///
    /// A run longer than 13 digits matches nothing: its boundaries are not
    /// barcode boundaries.
    pub fn barcode_candidates(&self) -> impl Iterator<Item = &str> {
        BARCODE_CANDIDATE
            .find_iter(&self.raw_text)
            .map(|m| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// Failure-absorbing front of an `OcrEngine`
pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Recognize text in an image
    ///
    /// Engine failure (including a missing binary) yields an empty
    /// extraction and the resolution continues without an OCR signal.
    pub async fn extract(&self, image: &[u8]) -> OcrExtraction {
        match self.engine.recognize(image).await {
            Ok(raw_text) => {
                tracing::debug!(chars = raw_text.len(), "OCR text extracted");
                OcrExtraction { raw_text }
            }
            Err(err) => {
                tracing::warn!(error = %err, "OCR failed, continuing without text");
                OcrExtraction::default()
            }
        }
    }
}

/// Tesseract invoked as a subprocess (`tesseract <image> stdout`)
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        // The engine reads from a file; the temp file is dropped (and
        // deleted) on every exit path from this function.
        let image_owned = image.to_vec();
        let temp = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut temp = tempfile::Builder::new()
                .prefix("foodlens-scan-")
                .tempfile()?;
            std::io::Write::write_all(&mut temp, &image_owned)?;
            std::io::Write::flush(&mut temp)?;
            Ok(temp)
        })
        .await
        .map_err(|e| OcrError::Failed(format!("Temp file task failed: {}", e)))?
        .map_err(|e| OcrError::Failed(format!("Failed to stage image: {}", e)))?;

        let output = Command::new(&self.command)
            .arg(temp.path())
            .arg("stdout")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    OcrError::Unavailable(format!("{} not found on PATH", self.command))
                }
                _ => OcrError::Failed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ============================================================================
// Tests
// ============================================================================
