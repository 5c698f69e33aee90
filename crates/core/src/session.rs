use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::Calculation;

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Idle,
    Capturing,
    Recognizing,
    ShowingResult { calculation: Calculation },
    ShowingError { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CaptureStarted,
    ImageAcquired,
    RecognitionSucceeded(Calculation),
    Failed(String),
    Back,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::CaptureStarted => "capture_started",
            Event::ImageAcquired => "image_acquired",
            Event::RecognitionSucceeded(_) => "recognition_succeeded",
            Event::Failed(_) => "failed",
            Event::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Event '{event}' is not valid in state '{state}'")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Idle => "idle",
            Screen::Capturing => "capturing",
            Screen::Recognizing => "recognizing",
            Screen::ShowingResult { .. } => "showing_result",
            Screen::ShowingError { .. } => "showing_error",
        }
    }

    /// Compute the next state. Invalid pairs are rejected and leave the
    /// caller's state untouched.
    pub fn next(&self, event: Event) -> Result<Screen, TransitionError> {
        let next = match (self, event) {
            (Screen::Idle, Event::CaptureStarted) => Screen::Capturing,
            (Screen::Capturing, Event::ImageAcquired) => Screen::Recognizing,
            (Screen::Recognizing, Event::RecognitionSucceeded(calculation)) => {
                Screen::ShowingResult { calculation }
            }
            (Screen::Idle | Screen::Capturing | Screen::Recognizing, Event::Failed(message)) => {
                Screen::ShowingError { message }
            }
            (
                Screen::Capturing | Screen::ShowingResult { .. } | Screen::ShowingError { .. },
                Event::Back,
            ) => Screen::Idle,
            (state, event) => {
                return Err(TransitionError { state: state.name(), event: event.name() })
            }
        };
        Ok(next)
    }

    /// What the display boundary shows for this state, if anything.
    pub fn display(&self) -> Option<DisplayText> {
        match self {
            Screen::ShowingResult { calculation } => Some(DisplayText::from(calculation)),
            Screen::ShowingError { message } => Some(DisplayText::Error(message.clone())),
            _ => None,
        }
    }
}

/// Holds the current [`Screen`] and applies events to it.
#[derive(Debug, Default)]
pub struct Session {
    screen: Screen,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn apply(&mut self, event: Event) -> Result<&Screen, TransitionError> {
        self.screen = self.screen.next(event)?;
        Ok(&self.screen)
    }
}

/// Strings handed to the display boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayText {
    Result { calculation: String, result: String },
    Error(String),
}

impl From<&Calculation> for DisplayText {
    fn from(c: &Calculation) -> Self {
        DisplayText::Result {
            calculation: c.expression.clone(),
            result: c.result.to_string(),
        }
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayText::Result { calculation, result } => write!(
                f,
                "Calculation: {}\nResult: {}",
                or_dash(calculation),
                or_dash(result)
            ),
            DisplayText::Error(message) => write!(f, "Error: {message}"),
        }
    }
}
