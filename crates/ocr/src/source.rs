use chrono::{DateTime, Utc};
use smartcalc_core::InputMode;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::hash;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Image source closed")]
    Closed,
    #[error("Capture watcher error: {0}")]
    Watcher(#[from] notify::Error),
}

impl SourceError {
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            SourceError::PermissionDenied(path.to_path_buf())
        } else {
            SourceError::Io { path: path.to_path_buf(), source }
        }
    }
}

/// One image handed to the pipeline.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub path: Option<PathBuf>,
    pub bytes: Vec<u8>,
    /// SHA-256 hex of `bytes`.
    pub digest: String,
    pub acquired_at: DateTime<Utc>,
}

impl AcquiredImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            path: None,
            digest: hash::image_digest(&bytes),
            bytes,
            acquired_at: Utc::now(),
        }
    }

    pub async fn read(path: &Path) -> Result<Self, SourceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::from_io(path, e))?;
        Ok(Self { path: Some(path.to_path_buf()), ..Self::from_bytes(bytes) })
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ── Filesystem picker ─────────────────────────────────────────────────────────

/// Yields the files the user picked, one per call.
#[derive(Debug, Default)]
pub struct FilePicker {
    picks: VecDeque<PathBuf>,
}

impl FilePicker {
    pub fn new(picks: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { picks: picks.into_iter().collect() }
    }

    pub async fn next_image(&mut self) -> Result<AcquiredImage, SourceError> {
        let path = self.picks.pop_front().ok_or(SourceError::Closed)?;
        AcquiredImage::read(&path).await
    }
}

// ── Capture folder (camera mode) ─────────────────────────────────────────────

/// Watches a directory that a camera pipeline writes frames into and yields
/// each new image file.
pub struct CaptureFolder {
    dir: PathBuf,
    rx: mpsc::Receiver<PathBuf>,
    // Dropping the watcher stops the stream.
    _watcher: notify::RecommendedWatcher,
}

impl CaptureFolder {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        std::fs::create_dir_all(dir).map_err(|e| SourceError::from_io(dir, e))?;
        let (tx, rx) = mpsc::channel(64);
        let watcher = spawn_capture_watcher(dir, tx)?;
        tracing::info!("Watching capture folder: {}", dir.display());
        Ok(Self { dir: dir.to_path_buf(), rx, _watcher: watcher })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wait for the next complete, non-empty image file to land in the folder.
    pub async fn next_image(&mut self) -> Result<AcquiredImage, SourceError> {
        loop {
            let path = self.rx.recv().await.ok_or(SourceError::Closed)?;
            if !is_image_path(&path) {
                tracing::debug!("Ignoring non-image file: {}", path.display());
                continue;
            }
            if !wait_until_written(&path).await? {
                continue;
            }
            let image = AcquiredImage::read(&path).await?;
            if image.bytes.is_empty() {
                continue;
            }
            return Ok(image);
        }
    }
}

/// inotify reports close-after-write, so a forwarded path is already complete.
#[cfg(target_os = "linux")]
async fn wait_until_written(_path: &Path) -> Result<bool, SourceError> {
    Ok(true)
}

/// Without close events, wait until the file size stops changing. `false`
/// if the file vanished meanwhile.
#[cfg(not(target_os = "linux"))]
async fn wait_until_written(path: &Path) -> Result<bool, SourceError> {
    const SETTLE: std::time::Duration = std::time::Duration::from_millis(500);

    let len = |path: &Path| {
        let path = path.to_path_buf();
        async move {
            match tokio::fs::metadata(&path).await {
                Ok(meta) => Ok(Some(meta.len())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(SourceError::from_io(&path, e)),
            }
        }
    };

    let Some(mut last) = len(path).await? else {
        return Ok(false);
    };
    loop {
        tokio::time::sleep(SETTLE).await;
        match len(path).await? {
            None => return Ok(false),
            Some(now) if now == last && now > 0 => return Ok(true),
            Some(now) => last = now,
        }
    }
}

/// Whether an event means a frame may now be complete.
#[cfg(target_os = "linux")]
fn is_frame_ready(kind: &notify::EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

#[cfg(not(target_os = "linux"))]
fn is_frame_ready(kind: &notify::EventKind) -> bool {
    use notify::event::{ModifyKind, RenameMode};
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Spawn a notify watcher on `dir` that sends the paths of frames that are
/// (or may be) fully written to `tx`. The returned watcher must be kept alive.
pub fn spawn_capture_watcher(
    dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) => {
                if is_frame_ready(&ev.kind) {
                    for path in ev.paths {
                        if tx.try_send(path).is_err() {
                            tracing::warn!("Capture queue full, dropping frame");
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("Capture watcher error: {e}"),
        }
    })?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Runtime selection ─────────────────────────────────────────────────────────

/// The image source chosen by [`InputMode`] at startup.
pub enum ImageSource {
    Picker(FilePicker),
    Camera(CaptureFolder),
}

impl ImageSource {
    pub fn mode(&self) -> InputMode {
        match self {
            ImageSource::Picker(_) => InputMode::Filesystem,
            ImageSource::Camera(_) => InputMode::Camera,
        }
    }

    pub async fn next_image(&mut self) -> Result<AcquiredImage, SourceError> {
        match self {
            ImageSource::Picker(p) => p.next_image().await,
            ImageSource::Camera(c) => c.next_image().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_path(Path::new("/c/2024-01-15-09-30-00-000.JPG")));
        assert!(is_image_path(Path::new("shot.png")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("shot.png.part")));
        assert!(!is_image_path(Path::new("no_extension")));
    }

    #[test]
    fn io_permission_error_maps_to_permission_denied() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let e = SourceError::from_io(Path::new("/root/secret.png"), err);
        assert!(matches!(e, SourceError::PermissionDenied(_)));
        assert_eq!(e.to_string(), "Permission denied: /root/secret.png");

        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let e = SourceError::from_io(Path::new("gone.png"), err);
        assert!(matches!(e, SourceError::Io { .. }));
    }

    #[tokio::test]
    async fn picker_yields_each_pick_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        std::fs::write(&a, b"first").unwrap();

        let mut picker = FilePicker::new([a.clone()]);
        let image = picker.next_image().await.unwrap();
        assert_eq!(image.path.as_deref(), Some(a.as_path()));
        assert_eq!(image.bytes, b"first");
        assert!(matches!(picker.next_image().await, Err(SourceError::Closed)));
    }

    #[tokio::test]
    async fn picker_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSource::Picker(FilePicker::new([dir.path().join("missing.jpg")]));
        assert_eq!(source.mode(), InputMode::Filesystem);
        assert!(matches!(source.next_image().await, Err(SourceError::Io { .. })));
    }

    #[test]
    fn acquired_image_carries_digest() {
        let image = AcquiredImage::from_bytes(b"frame".to_vec());
        assert_eq!(image.digest, hash::image_digest(b"frame"));
        assert!(image.path.is_none());
    }

    async fn next_within(folder: &mut CaptureFolder) -> AcquiredImage {
        tokio::time::timeout(Duration::from_secs(10), folder.next_image())
            .await
            .expect("no frame within 10s")
            .unwrap()
    }

    #[tokio::test]
    async fn capture_folder_yields_new_image_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut folder = CaptureFolder::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("notes.txt"), b"not a frame").unwrap();
        std::fs::write(dir.path().join("a.png"), b"frame bytes").unwrap();

        let image = next_within(&mut folder).await;
        assert_eq!(image.path.as_deref(), Some(dir.path().join("a.png").as_path()));
        assert_eq!(image.bytes, b"frame bytes");
    }

    #[tokio::test]
    async fn capture_folder_waits_for_frame_written_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut folder = CaptureFolder::open(dir.path()).unwrap();
        let frame: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        let path = dir.path().join("shot.jpg");
        let expected = frame.clone();
        let writer = std::thread::spawn(move || {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(&frame[..100]).unwrap();
            f.flush().unwrap();
            std::thread::sleep(Duration::from_millis(300));
            f.write_all(&frame[100..]).unwrap();
        });

        let image = next_within(&mut folder).await;
        writer.join().unwrap();
        assert_eq!(image.bytes.len(), 4096);
        assert_eq!(image.bytes, expected);
    }

    #[tokio::test]
    async fn capture_folder_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let captures = dir.path().join("captures");
        let folder = CaptureFolder::open(&captures).unwrap();
        assert!(captures.is_dir());
        assert_eq!(folder.dir(), captures.as_path());
        assert_eq!(ImageSource::Camera(folder).mode(), InputMode::Camera);
    }
}
