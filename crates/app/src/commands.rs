use smartcalc_core::{Event, Screen, Session};
use smartcalc_ocr::{calculate_text, CalculatorPipeline, ImageSource, OcrBackend, SourceError};
use std::io::Write;

/// Drives one screen session: pulls images from a source, runs them through
/// a pipeline and renders the resulting screen.
pub struct Calculator<W: Write> {
    session: Session,
    out: W,
    json: bool,
    skip_repeats: bool,
    last_digest: Option<String>,
    errors: usize,
}

impl<W: Write> Calculator<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            session: Session::new(),
            out,
            json,
            skip_repeats: false,
            last_digest: None,
            errors: 0,
        }
    }

    /// Number of error screens shown so far.
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Skip repeated identical frames, as camera pipelines tend to emit.
    pub fn skip_repeats(mut self, skip: bool) -> Self {
        self.skip_repeats = skip;
        self
    }

    /// Show the result for raw text typed in place of a recognized image.
    pub fn eval_text(&mut self, raw: &str) -> anyhow::Result<()> {
        let calculation = calculate_text(raw);
        self.session.apply(Event::CaptureStarted)?;
        self.session.apply(Event::ImageAcquired)?;
        self.session.apply(Event::RecognitionSucceeded(calculation))?;
        self.render()?;
        self.session.apply(Event::Back)?;
        Ok(())
    }

    /// Process images until the source runs dry.
    pub async fn run_source<R: OcrBackend + 'static>(
        &mut self,
        pipeline: &CalculatorPipeline<R>,
        source: &mut ImageSource,
    ) -> anyhow::Result<()> {
        while self.capture_once(pipeline, source).await? {}
        Ok(())
    }

    /// One capture → recognize → show → back cycle. Returns `false` once the
    /// source is closed.
    pub async fn capture_once<R: OcrBackend + 'static>(
        &mut self,
        pipeline: &CalculatorPipeline<R>,
        source: &mut ImageSource,
    ) -> anyhow::Result<bool> {
        self.session.apply(Event::CaptureStarted)?;

        let image = loop {
            match source.next_image().await {
                Ok(image) => {
                    if self.skip_repeats && self.last_digest.as_ref() == Some(&image.digest) {
                        tracing::debug!("Skipping repeated frame {}", image.digest);
                        continue;
                    }
                    self.last_digest = Some(image.digest.clone());
                    break Ok(image);
                }
                Err(SourceError::Closed) => {
                    self.session.apply(Event::Back)?;
                    return Ok(false);
                }
                Err(e) => break Err(e),
            }
        };

        let event = match image {
            Ok(image) => {
                self.session.apply(Event::ImageAcquired)?;
                match pipeline.process_image(image).await {
                    Ok(calculation) => Event::RecognitionSucceeded(calculation),
                    Err(e) => failed(e),
                }
            }
            Err(e) => failed(e),
        };
        self.session.apply(event)?;
        self.render()?;
        self.session.apply(Event::Back)?;
        Ok(true)
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let screen = self.session.screen();
        if matches!(screen, Screen::ShowingError { .. }) {
            self.errors += 1;
        }
        if self.json {
            writeln!(self.out, "{}", serde_json::to_string(screen)?)?;
        } else if let Some(display) = screen.display() {
            writeln!(self.out, "{display}")?;
        }
        Ok(())
    }
}

fn failed(e: impl std::error::Error) -> Event {
    tracing::warn!("Calculation failed: {e}");
    Event::Failed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use smartcalc_ocr::{FilePicker, MockRecognizer};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn png(shade: u8) -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([shade]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pipeline(text: &str) -> CalculatorPipeline<MockRecognizer> {
        CalculatorPipeline::new(MockRecognizer::new(text))
    }

    fn write_png(dir: &std::path::Path, name: &str, shade: u8) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, png(shade)).unwrap();
        path
    }

    #[test]
    fn eval_renders_calculation_and_result() {
        let mut calc = Calculator::new(Vec::new(), false);
        calc.eval_text("Hey You").unwrap();
        assert_eq!(String::from_utf8(calc.out.clone()).unwrap(), "Calculation: hey yu\nResult: 0\n");
        assert_eq!(calc.session.screen(), &Screen::Idle);
    }

    #[tokio::test]
    async fn picked_image_is_shown() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 200);
        let mut source = ImageSource::Picker(FilePicker::new([path]));

        let mut calc = Calculator::new(Vec::new(), false);
        calc.run_source(&pipeline("A+B"), &mut source).await.unwrap();

        assert_eq!(String::from_utf8(calc.out.clone()).unwrap(), "Calculation: ab\nResult: 0\n");
        assert_eq!(calc.errors(), 0);
        assert_eq!(calc.session.screen(), &Screen::Idle);
    }

    #[tokio::test]
    async fn missing_pick_shows_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSource::Picker(FilePicker::new([dir.path().join("gone.png")]));

        let mut calc = Calculator::new(Vec::new(), false);
        calc.run_source(&pipeline("+"), &mut source).await.unwrap();

        let out = String::from_utf8(calc.out.clone()).unwrap();
        assert!(out.starts_with("Error: Failed to read"), "{out}");
        assert_eq!(calc.errors(), 1);
    }

    #[tokio::test]
    async fn repeated_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 10);
        let b = write_png(dir.path(), "b.png", 10);
        let c = write_png(dir.path(), "c.png", 90);
        let mut source = ImageSource::Picker(FilePicker::new([a, b, c]));

        let mut calc = Calculator::new(Vec::new(), true).skip_repeats(true);
        calc.run_source(&pipeline("x"), &mut source).await.unwrap();

        let out = String::from_utf8(calc.out.clone()).unwrap();
        let screens: Vec<serde_json::Value> =
            out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(screens.len(), 2);
        assert_eq!(screens[0]["state"], "showing_result");
        assert!(screens[0]["calculation"]["source"].as_str().unwrap().ends_with("a.png"));
        assert!(screens[1]["calculation"]["source"].as_str().unwrap().ends_with("c.png"));
    }
}
