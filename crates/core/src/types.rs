use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::expression::{evaluate, normalize};

/// The outcome of running one acquired image (or one raw text) through the
/// normalizer and evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Calculation {
    /// Image the text was recognized from. `None` for text-only runs.
    pub source: Option<PathBuf>,
    /// SHA-256 hex digest of the image bytes.
    pub image_digest: Option<String>,
    pub acquired_at: DateTime<Utc>,
    /// Raw OCR output.
    pub recognized_text: String,
    pub expression: String,
    pub result: i64,
}

impl Calculation {
    /// Normalize and evaluate `recognized_text`.
    pub fn from_text(recognized_text: impl Into<String>, acquired_at: DateTime<Utc>) -> Self {
        let recognized_text = recognized_text.into();
        let expression = normalize(&recognized_text);
        let result = evaluate(&expression);
        Self {
            source: None,
            image_digest: None,
            acquired_at,
            recognized_text,
            expression,
            result,
        }
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.image_digest = Some(digest);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn from_text_runs_normalizer_and_evaluator() {
        let calc = Calculation::from_text("A+B", at());
        assert_eq!(calc.recognized_text, "A+B");
        assert_eq!(calc.expression, "ab");
        assert_eq!(calc.result, 0);
        assert!(calc.source.is_none());
    }

    #[test]
    fn builders_attach_origin() {
        let calc = Calculation::from_text("", at())
            .with_source(PathBuf::from("/tmp/shot.png"))
            .with_digest("ab".repeat(32));
        assert_eq!(calc.source.as_deref(), Some(std::path::Path::new("/tmp/shot.png")));
        assert_eq!(calc.image_digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn serializes_to_json() {
        let calc = Calculation::from_text("xyz", at());
        let json = serde_json::to_value(&calc).unwrap();
        assert_eq!(json["expression"], "yz");
        assert_eq!(json["result"], 0);
        assert_eq!(json["acquired_at"], "2024-01-15T09:30:00Z");
    }
}
