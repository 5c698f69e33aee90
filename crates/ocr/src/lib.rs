pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod source;

pub use hash::image_digest;
pub use pipeline::{calculate_text, CalculatorPipeline, PipelineError};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use recognizer::{from_config, CommandRecognizer, MockRecognizer, OcrBackend, OcrError};
pub use source::{AcquiredImage, CaptureFolder, FilePicker, ImageSource, SourceError};
