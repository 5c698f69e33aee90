use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use smartcalc_core::{OcrConfig, OcrEngine};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

/// Build the backend selected by `[ocr] engine`.
pub fn from_config(config: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match config.engine {
        OcrEngine::Command => Ok(Box::new(CommandRecognizer::new(
            &config.command,
            &config.lang,
            config.data_path.clone(),
        ))),
        OcrEngine::Fixed => Ok(Box::new(MockRecognizer::new(config.fixed_text.clone()))),
        #[cfg(feature = "tesseract")]
        OcrEngine::Tesseract => Ok(Box::new(tesseract_backend::TesseractRecognizer::new(
            config.data_path.as_ref().map(|p| p.display().to_string()),
            &config.lang,
        ))),
        #[cfg(not(feature = "tesseract"))]
        OcrEngine::Tesseract => Err(OcrError::NotAvailable(
            "build with the `tesseract` feature".to_string(),
        )),
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string. Backs the `fixed` engine and the pipeline tests.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Command backend (tesseract executable) ───────────────────────────────────

/// Pipes the image into `<program> stdin stdout` and reads the text back.
pub struct CommandRecognizer {
    program: String,
    lang: String,
    data_path: Option<PathBuf>,
}

impl CommandRecognizer {
    pub fn new(program: &str, lang: &str, data_path: Option<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            lang: lang.to_string(),
            data_path,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("stdin").arg("stdout").arg("-l").arg(&self.lang);
        if let Some(dir) = &self.data_path {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl OcrBackend for CommandRecognizer {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let mut child = self.command().spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::NotAvailable(format!("'{}' not found on PATH", self.program))
            } else {
                OcrError::Engine(e.to_string())
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image_bytes)
                .map_err(|e| OcrError::Engine(format!("failed to write image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| OcrError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("12 + 7\n");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "12 + 7\n");
    }

    #[test]
    fn boxed_backend_delegates() {
        let r: Box<dyn OcrBackend> = Box::new(MockRecognizer::new("9/3"));
        assert_eq!(r.recognize(b"").unwrap(), "9/3");
    }

    #[test]
    fn fixed_engine_from_config() {
        let cfg = OcrConfig {
            engine: OcrEngine::Fixed,
            fixed_text: "4 x 4".into(),
            ..OcrConfig::default()
        };
        let r = from_config(&cfg).unwrap();
        assert_eq!(r.recognize(b"anything").unwrap(), "4 x 4");
    }

    #[test]
    fn missing_command_is_not_available() {
        let r = CommandRecognizer::new("smartcalc-no-such-ocr-binary", "eng", None);
        assert!(matches!(r.recognize(b"png"), Err(OcrError::NotAvailable(_))));
    }

    #[test]
    fn command_args_include_tessdata_dir() {
        let r = CommandRecognizer::new("tesseract", "eng", Some(PathBuf::from("/opt/tessdata")));
        let cmd = r.command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["stdin", "stdout", "-l", "eng", "--tessdata-dir", "/opt/tessdata"]
        );
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn tesseract_engine_requires_feature() {
        let cfg = OcrConfig { engine: OcrEngine::Tesseract, ..OcrConfig::default() };
        assert!(matches!(from_config(&cfg), Err(OcrError::NotAvailable(_))));
    }
}
