pub mod config;
pub mod expression;
pub mod session;
pub mod types;

pub use config::{AppConfig, ConfigError, InputMode, OcrConfig, OcrEngine, PreprocessConfig};
pub use expression::{evaluate, normalize, Operator};
pub use session::{DisplayText, Event, Screen, Session, TransitionError};
pub use types::Calculation;
